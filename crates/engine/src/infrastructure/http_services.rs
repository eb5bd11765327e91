//! HTTP clients for the hero, save, level-design and item services.
//!
//! Plain JSON REST. A 404 on a lookup is an absent entity, not an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use delve_domain::{Dungeon, GameSession, Hero, Item, UserId};

use crate::infrastructure::ports::{
    HeroServicePort, ItemServicePort, LevelDesignPort, SaveServicePort, ServiceError,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn build_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// `base_url` with `segments` appended, each percent-encoded so ids coming
/// from clients cannot change the route.
fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, String> {
    let mut url = Url::parse(base_url).map_err(|e| format!("invalid base url {base_url}: {e}"))?;
    url.path_segments_mut()
        .map_err(|_| format!("base url {base_url} cannot take a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn ensure_success(response: Response, service: &'static str) -> Result<Response, ServiceError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ServiceError::request(service, format!("{status}: {error_text}")))
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
    service: &'static str,
) -> Result<T, ServiceError> {
    response
        .json()
        .await
        .map_err(|e| ServiceError::invalid_response(service, e))
}

/// A single JSON HTTP collaborator.
#[derive(Clone)]
struct JsonService {
    client: Client,
    base_url: String,
    name: &'static str,
}

impl JsonService {
    fn new(base_url: &str, name: &'static str) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.to_string(),
            name,
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        endpoint(&self.base_url, segments).map_err(|e| ServiceError::request(self.name, e))
    }

    /// `None` on 404.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<Option<T>, ServiceError> {
        let response = self
            .client
            .get(self.url(segments)?)
            .send()
            .await
            .map_err(|e| ServiceError::request(self.name, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response, self.name).await?;
        read_json(response, self.name).await.map(Some)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ServiceError> {
        let response = self
            .client
            .get(self.url(segments)?)
            .send()
            .await
            .map_err(|e| ServiceError::request(self.name, e))?;
        let response = ensure_success(response, self.name).await?;
        read_json(response, self.name).await
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<Response, ServiceError> {
        let mut request = self.client.request(method, self.url(segments)?);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::request(self.name, e))?;
        ensure_success(response, self.name).await
    }
}

#[derive(Clone)]
pub struct HttpHeroService {
    http: JsonService,
}

impl HttpHeroService {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: JsonService::new(base_url, "hero service"),
        }
    }
}

#[async_trait]
impl HeroServicePort for HttpHeroService {
    async fn get_hero(&self, user_id: &UserId) -> Result<Option<Hero>, ServiceError> {
        self.http.get_optional(&[user_id.as_str()]).await
    }
}

#[derive(Clone)]
pub struct HttpSaveService {
    http: JsonService,
}

impl HttpSaveService {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: JsonService::new(base_url, "save service"),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressUpdate {
    current_room_index: usize,
}

#[async_trait]
impl SaveServicePort for HttpSaveService {
    async fn get(&self, user_id: &UserId) -> Result<Option<GameSession>, ServiceError> {
        self.http.get_optional(&[user_id.as_str()]).await
    }

    async fn create(&self, session: &GameSession) -> Result<(), ServiceError> {
        self.http
            .send(reqwest::Method::POST, &[], Some(session))
            .await
            .map(|_| ())
    }

    async fn update_room_index(
        &self,
        user_id: &UserId,
        current_room_index: usize,
    ) -> Result<(), ServiceError> {
        self.http
            .send(
                reqwest::Method::PUT,
                &[user_id.as_str()],
                Some(&ProgressUpdate { current_room_index }),
            )
            .await
            .map(|_| ())
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), ServiceError> {
        self.http
            .send::<()>(reqwest::Method::DELETE, &[user_id.as_str()], None)
            .await
            .map(|_| ())
    }
}

#[derive(Clone)]
pub struct HttpLevelDesignService {
    http: JsonService,
}

impl HttpLevelDesignService {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: JsonService::new(base_url, "level design service"),
        }
    }
}

#[async_trait]
impl LevelDesignPort for HttpLevelDesignService {
    async fn generate_dungeon(&self) -> Result<Dungeon, ServiceError> {
        let response = self
            .http
            .send::<()>(reqwest::Method::POST, &["generate"], None)
            .await?;
        read_json(response, self.http.name).await
    }
}

#[derive(Clone)]
pub struct HttpItemService {
    http: JsonService,
}

impl HttpItemService {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: JsonService::new(base_url, "item service"),
        }
    }
}

#[async_trait]
impl ItemServicePort for HttpItemService {
    async fn random_items(&self, count: usize) -> Result<Vec<Item>, ServiceError> {
        let count = count.to_string();
        self.http.get(&["alea", count.as_str()]).await
    }
}

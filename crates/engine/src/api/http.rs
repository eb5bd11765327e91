//! HTTP routes of the game and combat services.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use delve_domain::{BattleOutcome, Item, UserId};
use delve_shared::{
    ClaimRewardRequest, ClaimRewardResponse, ClassSelectedResponse, ErrorResponse, FightRequest,
    NextStepRequest, SelectClassRequest, StartGameRequest, StartGameResponse, StepResponse,
};

use crate::app::App;
use crate::use_cases::combat::{ManualFight, ManualFightError};
use crate::use_cases::game::{session_from_snapshot, GameError};

/// Routes of the game orchestrator.
pub fn game_routes() -> Router<Arc<App>> {
    Router::new()
        .route("/game", get(game_health))
        .route("/api/health", get(health))
        .route("/game/next-step", post(next_step))
        .route("/game/select-class", post(select_class))
        .route("/game/start", post(start_game))
        .route("/game/rewards", get(rewards))
        .route("/game/rewards/claim", post(claim_reward))
}

/// Routes of the combat service. The engine needs no state.
pub fn combat_routes() -> Router {
    Router::new()
        .route("/combat", get(combat_health))
        .route("/combat/", get(combat_health))
        .route("/combat/fight-manual", post(fight_manual))
        .route("/api/health", get(health))
}

async fn health() -> &'static str {
    "OK"
}

async fn game_health() -> &'static str {
    "Game service is running"
}

async fn combat_health() -> &'static str {
    "Combat service is running"
}

// =============================================================================
// Game
// =============================================================================

/// With `hero` and `dungeon` in the body the step is stateless; with only
/// `userId` it runs on the saved session.
async fn next_step(
    State(app): State<Arc<App>>,
    Json(request): Json<NextStepRequest>,
) -> Result<Json<StepResponse>, ApiError> {
    let user_id = UserId::new(request.user_id).map_err(GameError::from)?;
    let next_step = &app.use_cases.game.next_step;

    let response = match (request.hero, request.dungeon) {
        (Some(hero), Some(dungeon)) => {
            let session = session_from_snapshot(
                user_id,
                dungeon,
                request.current_room_index,
                request.status,
            );
            next_step.execute(&hero, session).await?
        }
        _ => next_step.execute_saved(&user_id).await?,
    };
    Ok(Json(response))
}

async fn select_class(
    State(app): State<Arc<App>>,
    Json(request): Json<SelectClassRequest>,
) -> Result<Json<ClassSelectedResponse>, ApiError> {
    let user_id = UserId::new(request.user_id).map_err(GameError::from)?;
    let response = app
        .use_cases
        .game
        .select_class
        .execute(&user_id, &request.class_name)?;
    Ok(Json(response))
}

async fn start_game(
    State(app): State<Arc<App>>,
    Json(request): Json<StartGameRequest>,
) -> Result<Json<StartGameResponse>, ApiError> {
    let user_id = UserId::new(request.user_id).map_err(GameError::from)?;
    let response = app
        .use_cases
        .game
        .start
        .execute(user_id, &request.name, request.class_name.as_deref())
        .await?;
    Ok(Json(response))
}

async fn rewards(State(app): State<Arc<App>>) -> Result<Json<Vec<Item>>, ApiError> {
    let items = app.use_cases.game.rewards.execute().await?;
    Ok(Json(items))
}

async fn claim_reward(
    State(app): State<Arc<App>>,
    Json(request): Json<ClaimRewardRequest>,
) -> Result<Json<ClaimRewardResponse>, ApiError> {
    let user_id = UserId::new(request.user_id).map_err(GameError::from)?;
    let response = app
        .use_cases
        .game
        .claim_reward
        .execute(&user_id, request.item)
        .await?;
    Ok(Json(response))
}

// =============================================================================
// Combat
// =============================================================================

async fn fight_manual(Json(request): Json<FightRequest>) -> Result<Json<BattleOutcome>, ApiError> {
    let outcome = ManualFight::new().execute(request).await?;
    Ok(Json(outcome))
}

// =============================================================================
// Errors
// =============================================================================

/// API error type. The body only ever carries a code or a validation
/// message, never the underlying cause.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::NotFound(code) => (StatusCode::NOT_FOUND, code),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(code) => (StatusCode::INTERNAL_SERVER_ERROR, code),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<GameError> for ApiError {
    fn from(e: GameError) -> Self {
        let code = e.code().to_string();
        match e {
            GameError::InvalidClass(_) => ApiError::BadRequest(code),
            GameError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            GameError::HeroNotFound(_) | GameError::SessionNotFound(_) => {
                ApiError::NotFound(code)
            }
            GameError::Progression
            | GameError::InitializationFailed
            | GameError::RewardsUnavailable
            | GameError::RewardClaimFailed => ApiError::Internal(code),
        }
    }
}

impl From<ManualFightError> for ApiError {
    fn from(e: ManualFightError) -> Self {
        match e {
            ManualFightError::MissingCombatant(_) => ApiError::BadRequest(e.to_string()),
            ManualFightError::Aborted => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{
        MockCombatPort, MockHeroActionPort, MockHeroServicePort, MockItemServicePort,
        MockLevelDesignPort, MockSaveServicePort,
    };
    use crate::use_cases::game::GameUseCases;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(saves: MockSaveServicePort) -> Arc<App> {
        let mut combat = MockCombatPort::new();
        combat.expect_request_combat().times(0);
        let mut actions = MockHeroActionPort::new();
        actions.expect_dispatch().times(0);

        Arc::new(App::new(GameUseCases::new(
            Arc::new(combat),
            Arc::new(actions),
            Arc::new(MockHeroServicePort::new()),
            Arc::new(saves),
            Arc::new(MockLevelDesignPort::new()),
            Arc::new(MockItemServicePort::new()),
        )))
    }

    fn game_router(saves: MockSaveServicePort) -> Router {
        game_routes().with_state(app(saves))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let response = game_router(MockSaveServicePort::new())
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stateless_step_on_dead_hero_is_a_no_op() {
        let response = game_router(MockSaveServicePort::new())
            .oneshot(post_json(
                "/game/next-step",
                serde_json::json!({
                    "userId": "user-1",
                    "hero": {"name": "Aria", "hp": 0},
                    "dungeon": {"id": "dungeon-1", "rooms": [{"monster": null}]},
                    "currentRoomIndex": 0,
                    "status": "GAME_OVER"
                }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "GAME_OVER");
        assert_eq!(body["dungeonId"], "dungeon-1");
    }

    #[tokio::test]
    async fn step_without_save_is_not_found() {
        let mut saves = MockSaveServicePort::new();
        saves.expect_get().returning(|_| Ok(None));

        let response = game_router(saves)
            .oneshot(post_json(
                "/game/next-step",
                serde_json::json!({ "userId": "user-1" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn unknown_class_is_a_bad_request() {
        let response = game_router(MockSaveServicePort::new())
            .oneshot(post_json(
                "/game/select-class",
                serde_json::json!({ "userId": "user-1", "className": "MAGE" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "INVALID_CLASS");
    }

    #[tokio::test]
    async fn blank_user_id_is_a_bad_request() {
        let response = game_router(MockSaveServicePort::new())
            .oneshot(post_json(
                "/game/select-class",
                serde_json::json!({ "userId": "", "className": "TANK" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn manual_fight_runs_the_engine() {
        let response = combat_routes()
            .oneshot(post_json(
                "/combat/fight-manual",
                serde_json::json!({
                    "hero": {"hp": 100, "atk": 50, "res": 10, "vit": 20},
                    "monster": {"hp": 20, "atk": 5, "gold": 10, "vit": 10}
                }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["winner"], "hero");
        assert_eq!(body["goldLooted"], 10);
        assert!(body["battleLog"].as_array().is_some_and(|log| !log.is_empty()));
    }

    #[tokio::test]
    async fn manual_fight_without_monster_is_a_bad_request() {
        let response = combat_routes()
            .oneshot(post_json(
                "/combat/fight-manual",
                serde_json::json!({ "hero": {"hp": 10, "atk": 1} }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Missing monster stats");
    }
}

//! Delve Engine - Main entry point.
//!
//! Runs the game orchestrator, the combat service, or both, depending on
//! `SERVICE_ROLE`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use delve_engine::api::http;
use delve_engine::app::{App, GamePorts};
use delve_engine::infrastructure::{
    amqp::AmqpBroker,
    clock::SystemClock,
    combat_client::CombatRpcClient,
    config::{AppConfig, BrokerBackend},
    hero_dispatcher::ActionDispatcher,
    http_services::{HttpHeroService, HttpItemService, HttpLevelDesignService, HttpSaveService},
    memory_broker::InMemoryBroker,
    ports::BrokerPort,
    transport::SharedConnection,
};
use delve_engine::use_cases::combat::{CombatWorker, CombatWorkerConfig};

const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Spawns a task that cancels `cancel_token` on SIGTERM/SIGINT.
fn setup_shutdown_signal(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }

        cancel_token.cancel();
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "delve_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Delve engine");

    let cancel_token = CancellationToken::new();
    setup_shutdown_signal(cancel_token.clone());

    let config = AppConfig::from_env().context("loading configuration")?;
    tracing::info!(
        role = ?config.role,
        backend = ?config.broker.backend,
        "Configuration loaded"
    );

    // One broker per process; with the memory backend both roles must share it.
    let broker: Arc<dyn BrokerPort> = match config.broker.backend {
        BrokerBackend::Amqp => Arc::new(AmqpBroker::new(config.broker.url.clone())),
        BrokerBackend::Memory => Arc::new(InMemoryBroker::new()),
    };
    let shared_connection = Arc::new(
        SharedConnection::new(broker.clone())
            .with_connect_timeout(config.broker.connect_timeout),
    );

    let mut servers = Vec::new();
    let mut worker_task = None;

    if config.role.runs_combat() {
        let worker = Arc::new(CombatWorker::new(
            broker.clone(),
            CombatWorkerConfig {
                queue: config.combat.queue.clone(),
                dead_letter_queue: config.combat.dead_letter_queue.clone(),
                prefetch: config.combat.worker_prefetch,
                reconnect_delay: config.broker.reconnect_delay,
            },
        ));
        let cancel = cancel_token.clone();
        worker_task = Some(tokio::spawn(async move { worker.run(cancel).await }));

        servers.push(
            spawn_server(
                "combat",
                config.combat_addr()?,
                http::combat_routes(),
                cancel_token.clone(),
            )
            .await?,
        );
    }

    if config.role.runs_game() {
        let app = Arc::new(App::from_ports(GamePorts {
            combat: Arc::new(CombatRpcClient::new(
                shared_connection.clone(),
                config.combat.queue.clone(),
                config.combat.rpc_timeout,
                config.broker.close_grace,
            )),
            actions: Arc::new(ActionDispatcher::new(
                shared_connection.clone(),
                config.broker.hero_queue.clone(),
                Arc::new(SystemClock),
                config.broker.close_grace,
            )),
            heroes: Arc::new(HttpHeroService::new(&config.services.hero)),
            saves: Arc::new(HttpSaveService::new(&config.services.save)),
            level_design: Arc::new(HttpLevelDesignService::new(&config.services.level_design)),
            items: Arc::new(HttpItemService::new(&config.services.item)),
        }));

        servers.push(
            spawn_server(
                "game",
                config.game_addr()?,
                http::game_routes().with_state(app),
                cancel_token.clone(),
            )
            .await?,
        );
    }

    for server in servers {
        if let Err(e) = server.await {
            tracing::error!(error = %e, "Server task failed");
        }
    }

    if let Some(worker_task) = worker_task {
        tracing::info!("Waiting for combat worker to complete...");
        if tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, worker_task)
            .await
            .is_err()
        {
            tracing::warn!("Combat worker did not stop in time");
        }
    }

    shared_connection.close().await;
    tracing::info!("Delve engine shutdown complete");
    Ok(())
}

async fn spawn_server(
    service: &'static str,
    addr: SocketAddr,
    router: Router,
    cancel_token: CancellationToken,
) -> anyhow::Result<JoinHandle<()>> {
    let mut router = router.layer(TraceLayer::new_for_http());
    if let Some(cors) = build_cors_layer_from_env() {
        router = router.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {service} server to {addr}"))?;
    tracing::info!(service, %addr, "Listening");

    Ok(tokio::spawn(async move {
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
            tracing::info!(service, "HTTP server received shutdown signal");
        });
        if let Err(e) = server.await {
            tracing::error!(service, error = %e, "Server error");
        }
    }))
}

fn build_cors_layer_from_env() -> Option<CorsLayer> {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    if allowed_origins == "*" {
        return Some(cors.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();
    if origins.is_empty() {
        return None;
    }
    Some(cors.allow_origin(origins))
}

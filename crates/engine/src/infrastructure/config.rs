//! Application configuration

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Which services this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    Game,
    Combat,
    /// Both services in one process.
    All,
}

impl ServiceRole {
    pub fn runs_game(self) -> bool {
        matches!(self, ServiceRole::Game | ServiceRole::All)
    }

    pub fn runs_combat(self) -> bool {
        matches!(self, ServiceRole::Combat | ServiceRole::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerBackend {
    /// RabbitMQ
    Amqp,
    /// In-process broker, only reachable from this process
    Memory,
}

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub role: ServiceRole,
    pub server_host: String,
    /// Orchestrator HTTP port
    pub game_port: u16,
    /// Combat service HTTP port
    pub combat_port: u16,

    pub broker: BrokerConfig,
    pub combat: CombatConfig,
    pub services: ServiceUrls,
}

/// Broker connection configuration
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub backend: BrokerBackend,
    pub url: String,
    /// Fixed interval between connection attempts
    pub reconnect_delay: Duration,
    /// Bound on one connection attempt by the shared connection
    pub connect_timeout: Duration,
    /// Delay before a per-call channel is closed after use
    pub close_grace: Duration,
    /// Durable queue receiving hero actions
    pub hero_queue: String,
}

/// Combat RPC and worker configuration
#[derive(Debug, Clone)]
pub struct CombatConfig {
    pub queue: String,
    pub dead_letter_queue: String,
    pub rpc_timeout: Duration,
    /// Max battles the worker resolves concurrently
    pub worker_prefetch: u16,
}

/// Base URLs of the HTTP collaborators
#[derive(Debug, Clone)]
pub struct ServiceUrls {
    pub hero: String,
    pub level_design: String,
    pub save: String,
    pub item: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let millis = |key: &str, default: u64| {
            Duration::from_millis(lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default))
        };

        let role = match var("SERVICE_ROLE", "all").to_ascii_lowercase().as_str() {
            "game" => ServiceRole::Game,
            "combat" => ServiceRole::Combat,
            "all" => ServiceRole::All,
            other => bail!("SERVICE_ROLE must be game, combat or all (got {other})"),
        };

        let backend = match var("BROKER_BACKEND", "amqp").to_ascii_lowercase().as_str() {
            "amqp" => BrokerBackend::Amqp,
            "memory" => BrokerBackend::Memory,
            other => bail!("BROKER_BACKEND must be amqp or memory (got {other})"),
        };

        Ok(Self {
            role,
            server_host: var("SERVER_HOST", "0.0.0.0"),
            game_port: lookup("GAME_PORT")
                .or_else(|| lookup("PORT"))
                .unwrap_or_else(|| "3003".to_string())
                .parse()
                .context("GAME_PORT must be a valid port number")?,
            combat_port: var("COMBAT_PORT", "3004")
                .parse()
                .context("COMBAT_PORT must be a valid port number")?,

            broker: BrokerConfig {
                backend,
                url: lookup("RABBITMQ_URL")
                    .or_else(|| lookup("RABBIT_URL"))
                    .unwrap_or_else(|| "amqp://localhost:5672/%2f".to_string()),
                reconnect_delay: millis("BROKER_RECONNECT_DELAY_MS", 5000),
                connect_timeout: millis("BROKER_CONNECT_TIMEOUT_MS", 5000),
                close_grace: millis("BROKER_CLOSE_GRACE_MS", 500),
                hero_queue: var("HERO_QUEUE", delve_shared::HERO_QUEUE),
            },

            combat: CombatConfig {
                queue: var("COMBAT_QUEUE", delve_shared::COMBAT_QUEUE),
                dead_letter_queue: var("COMBAT_DEAD_LETTER_QUEUE", "CombatQ.dead-letter"),
                rpc_timeout: millis("COMBAT_RPC_TIMEOUT_MS", 5000),
                worker_prefetch: lookup("COMBAT_WORKER_PREFETCH")
                    .and_then(|v| v.parse().ok())
                    .filter(|n: &u16| *n > 0)
                    .unwrap_or(8),
            },

            services: ServiceUrls {
                hero: var("HERO_SERVICE_URL", "http://localhost:3005/hero"),
                level_design: var("LEVEL_SERVICE_URL", "http://localhost:3007/levelDesign"),
                save: var("SAVE_SERVICE_URL", "http://localhost:3009/save"),
                item: var("ITEM_SERVICE_URL", "http://localhost:3006/items"),
            },
        })
    }

    pub fn game_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.server_host, self.game_port)
    }

    pub fn combat_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.server_host, self.combat_port)
    }
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))
}

//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod amqp;
pub mod clock;
pub mod combat_client;
pub mod config;
pub mod correlation;
pub mod hero_dispatcher;
pub mod http_services;
pub mod memory_broker;
pub mod ports;
pub mod transport;

//! API layer - HTTP entry points of the game and combat services.

pub mod http;

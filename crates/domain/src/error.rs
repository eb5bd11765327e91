//! Unified error type for the domain layer

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Hero class outside the playable roster
    #[error("Invalid hero class: {0}")]
    InvalidClass(String),

    /// State transition not allowed
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Dungeon snapshot is inconsistent with the session pointing into it
    #[error("Malformed dungeon: {0}")]
    MalformedDungeon(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }

    pub fn malformed_dungeon(msg: impl Into<String>) -> Self {
        Self::MalformedDungeon(msg.into())
    }
}

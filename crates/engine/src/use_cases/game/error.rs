//! Game orchestration errors.
//!
//! Callers only ever see the variant and its code; the collaborator failure
//! behind an opaque variant is logged where it happens.

use delve_domain::DomainError;

use crate::infrastructure::ports::{CombatClientError, DispatchError, ServiceError};

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Invalid hero class: {0}")]
    InvalidClass(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Hero not found for user {0}")]
    HeroNotFound(String),
    #[error("No saved game for user {0}")]
    SessionNotFound(String),
    #[error("Game progression failed")]
    Progression,
    #[error("Game initialization failed")]
    InitializationFailed,
    #[error("Rewards are unavailable")]
    RewardsUnavailable,
    #[error("Reward could not be claimed")]
    RewardClaimFailed,
}

impl GameError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::InvalidClass(_) => "INVALID_CLASS",
            GameError::InvalidRequest(_) => "INVALID_REQUEST",
            GameError::HeroNotFound(_) => "HERO_NOT_FOUND",
            GameError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            GameError::Progression => "PROGRESSION_ERROR",
            GameError::InitializationFailed => "INITIALIZATION_FAILED",
            GameError::RewardsUnavailable => "REWARDS_UNAVAILABLE",
            GameError::RewardClaimFailed => "REWARD_CLAIM_FAILED",
        }
    }
}

impl From<DomainError> for GameError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidClass(class) => GameError::InvalidClass(class),
            other => GameError::InvalidRequest(other.to_string()),
        }
    }
}

/// Anything a collaborator can fail with while a use case runs.
#[derive(Debug, thiserror::Error)]
pub(super) enum CollaboratorError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Combat(#[from] CombatClientError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_class_keeps_its_code() {
        let err = GameError::from(DomainError::InvalidClass("MAGE".into()));
        assert_eq!(err.code(), "INVALID_CLASS");
        assert_eq!(err.to_string(), "Invalid hero class: MAGE");
    }

    #[test]
    fn opaque_errors_do_not_leak_causes() {
        assert_eq!(GameError::Progression.to_string(), "Game progression failed");
        assert_eq!(GameError::Progression.code(), "PROGRESSION_ERROR");
    }
}

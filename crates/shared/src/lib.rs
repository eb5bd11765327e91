//! Delve Shared - contracts between the Delve services and their clients
//!
//! - Broker message bodies for `CombatQ` and `HeroQ`
//! - HTTP request and response bodies of the game and combat services
//!
//! Pure data types and serialization; no business logic.

pub mod messages;
pub mod requests;
pub mod responses;

pub use messages::{
    CombatRequest, CombatRequestError, CombatantPayload, HeroAction, HeroActionEnvelope,
    COMBAT_QUEUE, HERO_QUEUE,
};
pub use requests::{
    ClaimRewardRequest, DungeonSnapshot, FightRequest, NextStepRequest, SelectClassRequest,
    StartGameRequest,
};
pub use responses::{
    ClaimRewardResponse, ClaimStatus, ClassSelectedResponse, ErrorResponse, StartGameResponse,
    StepResponse,
};

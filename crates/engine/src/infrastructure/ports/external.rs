//! External service port traits (combat RPC, hero actions, HTTP collaborators).

use async_trait::async_trait;
use delve_domain::{BattleOutcome, Dungeon, GameSession, Hero, Item, MessageId, UserId};
use delve_shared::{CombatRequest, HeroAction};

use super::error::{CombatClientError, DispatchError, ServiceError};

// =============================================================================
// Messaging
// =============================================================================

/// Resolve a battle on the remote combat worker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CombatPort: Send + Sync {
    async fn request_combat(
        &self,
        request: CombatRequest,
    ) -> Result<BattleOutcome, CombatClientError>;
}

/// Fire-and-forget hero state mutations.
///
/// `Ok` means the broker confirmed the message, not that the hero service
/// applied it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HeroActionPort: Send + Sync {
    async fn dispatch(&self, action: HeroAction) -> Result<MessageId, DispatchError>;
}

// =============================================================================
// HTTP collaborators
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HeroServicePort: Send + Sync {
    async fn get_hero(&self, user_id: &UserId) -> Result<Option<Hero>, ServiceError>;
}

/// Saved sessions, one per user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SaveServicePort: Send + Sync {
    async fn get(&self, user_id: &UserId) -> Result<Option<GameSession>, ServiceError>;
    async fn create(&self, session: &GameSession) -> Result<(), ServiceError>;
    async fn update_room_index(
        &self,
        user_id: &UserId,
        current_room_index: usize,
    ) -> Result<(), ServiceError>;
    async fn delete(&self, user_id: &UserId) -> Result<(), ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LevelDesignPort: Send + Sync {
    async fn generate_dungeon(&self) -> Result<Dungeon, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemServicePort: Send + Sync {
    async fn random_items(&self, count: usize) -> Result<Vec<Item>, ServiceError>;
}

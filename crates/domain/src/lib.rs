//! Delve domain: the combat engine and the game vocabulary shared by the
//! orchestrator and the combat worker.

pub mod aggregates;
pub mod entities;
pub mod error;
pub mod game_systems;
pub mod ids;

pub use aggregates::{Advance, GameSession, SessionStatus};
pub use entities::{
    Dungeon, Hero, HeroClass, InventoryEntry, Item, Monster, Room, MAX_INVENTORY_SLOTS,
};
pub use error::DomainError;
pub use game_systems::{
    resolve, simulate, BattleOutcome, BattleReport, BattleRequest, Combatant, Side, Turn,
    MAX_TURNS,
};
pub use ids::{DungeonId, MessageId, UserId};

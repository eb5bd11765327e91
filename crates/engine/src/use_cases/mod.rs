//! Use cases - User story orchestration.
//!
//! - `combat` - the queue worker and synchronous fights
//! - `game` - room-by-room progression, game start, class selection, rewards

pub mod combat;
pub mod game;

pub use game::GameUseCases;

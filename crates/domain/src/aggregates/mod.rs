//! Aggregate roots - domain objects that own their related data
//!
//! Each aggregate owns its constituent parts, exposes behavior through
//! methods rather than public fields, and refuses invalid transitions.

pub mod game_session;

pub use game_session::{Advance, GameSession, SessionStatus};

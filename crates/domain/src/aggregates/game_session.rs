//! Game session aggregate - a hero's progress through one dungeon
//!
//! Persistence belongs to the save service; the orchestrator rebuilds a
//! session from a snapshot on every step and never caches it.
//!
//! # Invariants
//!
//! - `GameOver` and `DungeonCleared` are terminal: once reached, the room
//!   index never moves again.
//! - While exploring, `current_room_index` points inside `rooms` (checked on
//!   access, since snapshots come from outside).

use serde::{Deserialize, Serialize};

use crate::entities::{Dungeon, Room};
use crate::error::DomainError;
use crate::ids::{DungeonId, UserId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Saves created by older builds say `ACTIVE`.
    #[default]
    #[serde(alias = "ACTIVE")]
    Exploring,
    GameOver,
    DungeonCleared,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::GameOver | SessionStatus::DungeonCleared)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Exploring => "EXPLORING",
            SessionStatus::GameOver => "GAME_OVER",
            SessionStatus::DungeonCleared => "DUNGEON_CLEARED",
        }
    }
}

/// Where the hero ended up after leaving a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Entered the room at this index.
    Entered(usize),
    /// Walked out past the last room.
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dungeon_id: Option<DungeonId>,
    #[serde(default)]
    rooms: Vec<Room>,
    #[serde(default)]
    current_room_index: usize,
    #[serde(default)]
    status: SessionStatus,
}

impl GameSession {
    /// Start exploring a freshly generated dungeon at its first room.
    pub fn start(user_id: UserId, dungeon: Dungeon) -> Self {
        Self {
            user_id,
            dungeon_id: Some(dungeon.id),
            rooms: dungeon.rooms,
            current_room_index: 0,
            status: SessionStatus::Exploring,
        }
    }

    /// Rebuild a session from a caller-supplied snapshot.
    pub fn restore(
        user_id: UserId,
        dungeon_id: Option<DungeonId>,
        rooms: Vec<Room>,
        current_room_index: usize,
        status: SessionStatus,
    ) -> Self {
        Self {
            user_id,
            dungeon_id,
            rooms,
            current_room_index,
            status,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn dungeon_id(&self) -> Option<&DungeonId> {
        self.dungeon_id.as_ref()
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn current_room_index(&self) -> usize {
        self.current_room_index
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn current_room(&self) -> Result<&Room, DomainError> {
        self.rooms.get(self.current_room_index).ok_or_else(|| {
            DomainError::malformed_dungeon(format!(
                "room index {} out of {} rooms",
                self.current_room_index,
                self.rooms.len()
            ))
        })
    }

    /// Leave the current room.
    pub fn advance(&mut self) -> Result<Advance, DomainError> {
        self.ensure_active("advance")?;
        let next = self.current_room_index + 1;
        if next >= self.rooms.len() {
            self.status = SessionStatus::DungeonCleared;
            return Ok(Advance::Cleared);
        }
        self.current_room_index = next;
        Ok(Advance::Entered(next))
    }

    /// The hero died in the current room.
    pub fn end_in_defeat(&mut self) -> Result<(), DomainError> {
        self.ensure_active("end")?;
        self.status = SessionStatus::GameOver;
        Ok(())
    }

    fn ensure_active(&self, action: &str) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "cannot {action} a session in status {}",
                self.status.as_str()
            )));
        }
        Ok(())
    }
}

//! Dungeon snapshot produced by the level-design service.
//!
//! Generation is a linear chain of rooms; the core only reads it.

use serde::{Deserialize, Serialize};

use crate::game_systems::Combatant;
use crate::ids::DungeonId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dungeon {
    pub id: DungeonId,
    #[serde(default)]
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Room {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<String>,
    pub monster: Option<Monster>,
    pub next_room_ids: Vec<String>,
}

impl Room {
    pub fn with_monster(monster: Monster) -> Self {
        Self {
            monster: Some(monster),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Monster {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub stats: Combatant,
}

impl Monster {
    pub fn new(name: impl Into<String>, stats: Combatant) -> Self {
        Self {
            id: None,
            name: name.into(),
            stats,
        }
    }
}

//! Hero as served by the hero service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::item::InventoryEntry;
use crate::error::DomainError;
use crate::game_systems::Combatant;
use crate::ids::UserId;

/// Heroes carry at most this many items.
pub const MAX_INVENTORY_SLOTS: usize = 3;

/// Classes a new adventure can be started with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeroClass {
    #[default]
    Warrior,
    Tank,
    Assassin,
}

impl HeroClass {
    pub const ALL: [HeroClass; 3] = [HeroClass::Warrior, HeroClass::Tank, HeroClass::Assassin];

    pub fn as_str(self) -> &'static str {
        match self {
            HeroClass::Warrior => "WARRIOR",
            HeroClass::Tank => "TANK",
            HeroClass::Assassin => "ASSASSIN",
        }
    }
}

impl fmt::Display for HeroClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeroClass {
    type Err = DomainError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        HeroClass::ALL
            .into_iter()
            .find(|class| class.as_str() == upper)
            .ok_or_else(|| DomainError::InvalidClass(s.to_string()))
    }
}

/// Snapshot of a hero's persistent state.
///
/// `class` stays a free-form string: the hero service knows classes that
/// cannot be picked for a new game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Hero {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub hp: i64,
    pub atk: i64,
    pub res: i64,
    pub speed: i64,
    pub gold: i64,
    pub inventory: Vec<InventoryEntry>,
}

impl Hero {
    pub fn combatant(&self) -> Combatant {
        Combatant::new(self.hp, self.atk, self.res, self.speed)
    }

    pub fn inventory_full(&self) -> bool {
        self.inventory.len() >= MAX_INVENTORY_SLOTS
    }

    /// Gold held after pocketing `looted`. Both amounts come from callers,
    /// so the sum is checked.
    pub fn gold_after_loot(&self, looted: i64) -> Result<i64, DomainError> {
        self.gold
            .checked_add(looted)
            .ok_or_else(|| DomainError::validation("hero gold out of range"))
    }
}

//! HTTP response bodies of the game service.

use serde::{Deserialize, Serialize};

use delve_domain::{BattleOutcome, DungeonId, HeroClass, InventoryEntry, Item, Room, SessionStatus};

/// Result of one room step.
///
/// `heroHp` is the raw engine value; clients clamp it at zero for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponse {
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dungeon_id: Option<DungeonId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_hp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_gold: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_room_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_room: Option<Room>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battle: Option<BattleOutcome>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSelectedResponse {
    pub class_name: HeroClass,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameResponse {
    /// Always `STARTING`.
    pub status: String,
    pub user_id: String,
    pub dungeon_id: DungeonId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_room: Option<Room>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    RewardClaimed,
    InventoryFull,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRewardResponse {
    pub status: ClaimStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Vec<InventoryEntry>>,
}

/// Error body; `error` is a stable machine code such as `PROGRESSION_ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

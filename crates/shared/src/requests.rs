//! HTTP request bodies accepted by the game and combat services.

use serde::{Deserialize, Serialize};

use delve_domain::{Combatant, DungeonId, Hero, Item, Room, SessionStatus};

/// `POST /game/next-step`.
///
/// With `hero` and `dungeon` present the step runs on the supplied snapshot;
/// with only `userId` the session and hero are loaded from their services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStepRequest {
    pub user_id: String,
    #[serde(default)]
    pub hero: Option<Hero>,
    #[serde(default)]
    pub dungeon: Option<DungeonSnapshot>,
    #[serde(default)]
    pub current_room_index: Option<usize>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
}

/// Dungeon as held by the client; `rooms` may be missing in corrupted input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DungeonSnapshot {
    #[serde(default)]
    pub id: Option<DungeonId>,
    #[serde(default)]
    pub rooms: Option<Vec<Room>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectClassRequest {
    pub user_id: String,
    pub class_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest {
    pub user_id: String,
    pub name: String,
    /// Defaults to `WARRIOR`.
    #[serde(default)]
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRewardRequest {
    pub user_id: String,
    pub item: Item,
}

/// `POST /combat/fight-manual`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FightRequest {
    #[serde(default)]
    pub hero: Option<Combatant>,
    #[serde(default)]
    pub monster: Option<Combatant>,
}

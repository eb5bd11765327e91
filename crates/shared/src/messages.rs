//! Message bodies exchanged over the broker.
//!
//! ## Queues
//!
//! - `CombatQ` (non-durable): a JSON [`CombatRequest`]; the worker answers
//!   with a JSON `BattleOutcome` on the `replyTo` queue, tagged with the
//!   request's correlation id.
//! - `HeroQ` (durable, persistent): a JSON [`HeroActionEnvelope`].
//!
//! Field names are part of the contract with services outside this
//! workspace and must not change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use delve_domain::{BattleRequest, Combatant, HeroClass, Item, MessageId, UserId};

pub const COMBAT_QUEUE: &str = "CombatQ";
pub const HERO_QUEUE: &str = "HeroQ";

// =============================================================================
// Combat requests
// =============================================================================

/// A combatant on the wire: battle stats plus optional labels for logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub stats: Combatant,
}

impl CombatantPayload {
    pub fn new(stats: Combatant) -> Self {
        Self {
            id: None,
            name: None,
            stats,
        }
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Best label for logs.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("unknown")
    }
}

/// Body of a `CombatQ` message. Either side may be absent in malformed input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatRequest {
    #[serde(default)]
    pub hero: Option<CombatantPayload>,
    #[serde(default)]
    pub monster: Option<CombatantPayload>,
}

/// Why a `CombatQ` body could not become a battle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CombatRequestError {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("body does not have the combat request shape: {0}")]
    InvalidShape(String),
    #[error("combat request is missing `{0}`")]
    MissingCombatant(&'static str),
}

impl CombatRequestError {
    /// Poison bodies are kept for inspection; a request that simply lacks a
    /// side is dropped.
    pub fn is_poison(&self) -> bool {
        !matches!(self, CombatRequestError::MissingCombatant(_))
    }
}

impl CombatRequest {
    pub fn new(hero: CombatantPayload, monster: CombatantPayload) -> Self {
        Self {
            hero: Some(hero),
            monster: Some(monster),
        }
    }

    pub fn decode(body: &[u8]) -> Result<Self, CombatRequestError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| CombatRequestError::InvalidJson(e.to_string()))?;
        if !value.is_object() {
            return Err(CombatRequestError::InvalidShape(
                "expected a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| CombatRequestError::InvalidShape(e.to_string()))
    }

    pub fn to_battle(&self) -> Result<BattleRequest, CombatRequestError> {
        let hero = self
            .hero
            .as_ref()
            .ok_or(CombatRequestError::MissingCombatant("hero"))?;
        let monster = self
            .monster
            .as_ref()
            .ok_or(CombatRequestError::MissingCombatant("monster"))?;
        Ok(BattleRequest::new(hero.stats, monster.stats))
    }
}

// =============================================================================
// Hero actions
// =============================================================================

/// State mutation requested from the hero service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum HeroAction {
    UpdateHero {
        user_id: UserId,
        new_hp: i64,
        new_gold: i64,
    },
    HeroDied {
        user_id: UserId,
    },
    CreateHero {
        user_id: UserId,
        name: String,
        hero_class: HeroClass,
    },
    AddItem {
        user_id: UserId,
        item: Item,
    },
}

impl HeroAction {
    pub fn name(&self) -> &'static str {
        match self {
            HeroAction::UpdateHero { .. } => "UPDATE_HERO",
            HeroAction::HeroDied { .. } => "HERO_DIED",
            HeroAction::CreateHero { .. } => "CREATE_HERO",
            HeroAction::AddItem { .. } => "ADD_ITEM",
        }
    }

    pub fn user_id(&self) -> &UserId {
        match self {
            HeroAction::UpdateHero { user_id, .. }
            | HeroAction::HeroDied { user_id }
            | HeroAction::CreateHero { user_id, .. }
            | HeroAction::AddItem { user_id, .. } => user_id,
        }
    }
}

/// `HeroQ` body. Consumers apply each `messageId` at most once, which makes
/// broker redelivery harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroActionEnvelope {
    #[serde(flatten)]
    pub action: HeroAction,
    pub timestamp: DateTime<Utc>,
    pub message_id: MessageId,
}

impl HeroActionEnvelope {
    pub fn new(action: HeroAction, timestamp: DateTime<Utc>) -> Self {
        Self {
            action,
            timestamp,
            message_id: MessageId::new(),
        }
    }
}

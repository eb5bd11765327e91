//! Play next step use case.
//!
//! Advances a session by one room. A monster in the current room is fought
//! through the combat service; the hero's new state is published as a hero
//! action before the session moves on.
//!
//! Terminal sessions are left untouched: stepping a `GAME_OVER` or
//! `DUNGEON_CLEARED` session makes no remote call at all.

use std::sync::Arc;

use delve_domain::{
    Advance, BattleOutcome, DungeonId, GameSession, Hero, Room, SessionStatus, UserId,
};
use delve_shared::{CombatRequest, CombatantPayload, DungeonSnapshot, HeroAction, StepResponse};

use crate::infrastructure::ports::{
    CombatPort, HeroActionPort, HeroServicePort, SaveServicePort,
};

use super::error::{CollaboratorError, GameError};

/// Rebuild a session from the snapshot a client sends with a stateless step.
///
/// A snapshot without rooms yields a session whose current room cannot be
/// found, which the step reports as a progression error.
pub fn session_from_snapshot(
    user_id: UserId,
    dungeon: DungeonSnapshot,
    current_room_index: Option<usize>,
    status: Option<SessionStatus>,
) -> GameSession {
    GameSession::restore(
        user_id,
        dungeon.id,
        dungeon.rooms.unwrap_or_default(),
        current_room_index.unwrap_or(0),
        status.unwrap_or_default(),
    )
}

pub struct PlayNextStep {
    combat: Arc<dyn CombatPort>,
    actions: Arc<dyn HeroActionPort>,
    heroes: Arc<dyn HeroServicePort>,
    saves: Arc<dyn SaveServicePort>,
}

impl PlayNextStep {
    pub fn new(
        combat: Arc<dyn CombatPort>,
        actions: Arc<dyn HeroActionPort>,
        heroes: Arc<dyn HeroServicePort>,
        saves: Arc<dyn SaveServicePort>,
    ) -> Self {
        Self {
            combat,
            actions,
            heroes,
            saves,
        }
    }

    /// Step a session supplied by the caller. Nothing is persisted besides
    /// the hero actions.
    pub async fn execute(
        &self,
        hero: &Hero,
        mut session: GameSession,
    ) -> Result<StepResponse, GameError> {
        self.step(hero, &mut session).await
    }

    /// Step the user's saved session, then store the new position. A session
    /// that ends in this step is deleted.
    pub async fn execute_saved(&self, user_id: &UserId) -> Result<StepResponse, GameError> {
        let mut session = self
            .saves
            .get(user_id)
            .await
            .map_err(|e| progression_failed(user_id, e.into()))?
            .ok_or_else(|| GameError::SessionNotFound(user_id.to_string()))?;
        if session.is_terminal() {
            return Ok(terminal_response(&session));
        }

        let hero = self
            .heroes
            .get_hero(user_id)
            .await
            .map_err(|e| progression_failed(user_id, e.into()))?
            .ok_or_else(|| GameError::HeroNotFound(user_id.to_string()))?;

        let response = self.step(&hero, &mut session).await?;

        let persisted = if session.is_terminal() {
            self.saves.delete(user_id).await
        } else {
            self.saves
                .update_room_index(user_id, session.current_room_index())
                .await
        };
        persisted.map_err(|e| progression_failed(user_id, e.into()))?;

        Ok(response)
    }

    async fn step(&self, hero: &Hero, session: &mut GameSession) -> Result<StepResponse, GameError> {
        if session.is_terminal() {
            tracing::debug!(
                user_id = %session.user_id(),
                status = session.status().as_str(),
                "Step on finished session ignored"
            );
            return Ok(terminal_response(session));
        }

        self.play(hero, session)
            .await
            .map_err(|e| progression_failed(session.user_id(), e))
    }

    async fn play(
        &self,
        hero: &Hero,
        session: &mut GameSession,
    ) -> Result<StepResponse, CollaboratorError> {
        let room = session.current_room()?.clone();
        let user_id = session.user_id().clone();
        let dungeon_id = session.dungeon_id().cloned();

        let mut hero_hp = hero.hp;
        let mut hero_gold = hero.gold;
        let mut battle = None;

        if let Some(monster) = &room.monster {
            let request = CombatRequest::new(
                CombatantPayload::new(hero.combatant()).with_id(hero.id.clone()),
                CombatantPayload::new(monster.stats)
                    .with_id(monster.id.clone())
                    .with_name(monster.name.clone()),
            );
            let outcome = self.combat.request_combat(request).await?;

            if !outcome.hero_won() {
                self.actions
                    .dispatch(HeroAction::HeroDied {
                        user_id: user_id.clone(),
                    })
                    .await?;
                session.end_in_defeat()?;
                tracing::info!(
                    user_id = %user_id,
                    monster = %monster.name,
                    room = session.current_room_index(),
                    "Hero died"
                );
                return Ok(defeat_response(session, dungeon_id, &monster.name, outcome));
            }

            hero_hp = outcome.final_hero_hit_points;
            hero_gold = hero.gold_after_loot(outcome.gold_looted)?;
            self.actions
                .dispatch(HeroAction::UpdateHero {
                    user_id: user_id.clone(),
                    new_hp: hero_hp,
                    new_gold: hero_gold,
                })
                .await?;
            battle = Some(outcome);
        }

        let response = match session.advance()? {
            Advance::Cleared => {
                tracing::info!(user_id = %user_id, "Dungeon cleared");
                StepResponse {
                    status: SessionStatus::DungeonCleared,
                    dungeon_id,
                    hero_hp: None,
                    hero_gold: Some(hero_gold),
                    current_room_index: None,
                    current_room: None,
                    battle,
                    message: "Dungeon cleared!".to_string(),
                }
            }
            Advance::Entered(index) => {
                let next_room = session.rooms().get(index).cloned();
                StepResponse {
                    status: SessionStatus::Exploring,
                    dungeon_id,
                    hero_hp: Some(hero_hp),
                    hero_gold: Some(hero_gold),
                    current_room_index: Some(index),
                    message: entered_message(next_room.as_ref(), index),
                    current_room: next_room,
                    battle,
                }
            }
        };
        Ok(response)
    }
}

fn progression_failed(user_id: &UserId, err: CollaboratorError) -> GameError {
    tracing::error!(user_id = %user_id, error = %err, "Game progression failed");
    GameError::Progression
}

fn terminal_response(session: &GameSession) -> StepResponse {
    let message = match session.status() {
        SessionStatus::GameOver => "The hero has fallen. The adventure is over.",
        _ => "This dungeon has already been cleared.",
    };
    StepResponse {
        status: session.status(),
        dungeon_id: session.dungeon_id().cloned(),
        hero_hp: None,
        hero_gold: None,
        current_room_index: None,
        current_room: None,
        battle: None,
        message: message.to_string(),
    }
}

fn defeat_response(
    session: &GameSession,
    dungeon_id: Option<DungeonId>,
    monster: &str,
    outcome: BattleOutcome,
) -> StepResponse {
    StepResponse {
        status: SessionStatus::GameOver,
        dungeon_id,
        hero_hp: Some(outcome.final_hero_hit_points.max(0)),
        hero_gold: None,
        current_room_index: Some(session.current_room_index()),
        current_room: None,
        battle: Some(outcome),
        message: format!("The hero was slain by {monster}."),
    }
}

fn entered_message(room: Option<&Room>, index: usize) -> String {
    match room.and_then(|r| r.monster.as_ref()) {
        Some(monster) => format!("Room {}: a {} blocks the way.", index + 1, monster.name),
        None => format!("Room {} is quiet.", index + 1),
    }
}

//! Synchronous fight resolution for the combat HTTP surface.

use delve_domain::{BattleOutcome, BattleRequest};
use delve_shared::FightRequest;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ManualFightError {
    #[error("Missing {0} stats")]
    MissingCombatant(&'static str),
    #[error("Battle resolution aborted")]
    Aborted,
}

/// Runs the combat engine in-process, bypassing the queue.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualFight;

impl ManualFight {
    pub fn new() -> Self {
        Self
    }

    /// The fight runs on the blocking pool so long battles never stall the
    /// runtime.
    pub async fn execute(&self, request: FightRequest) -> Result<BattleOutcome, ManualFightError> {
        let hero = request
            .hero
            .ok_or(ManualFightError::MissingCombatant("hero"))?;
        let monster = request
            .monster
            .ok_or(ManualFightError::MissingCombatant("monster"))?;

        let battle = BattleRequest::new(hero, monster);
        let outcome = tokio::task::spawn_blocking(move || battle.resolve())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Manual fight aborted");
                ManualFightError::Aborted
            })?;
        tracing::debug!(winner = %outcome.winner, "Manual fight resolved");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_domain::{Combatant, Side, MAX_TURNS};

    #[tokio::test]
    async fn faster_monster_wins_scenario_b() {
        let outcome = ManualFight::new()
            .execute(FightRequest {
                hero: Some(Combatant::new(10, 10, 0, 10)),
                monster: Some(Combatant::new(10, 10, 0, 11).with_loot(10)),
            })
            .await
            .expect("both sides present");

        assert_eq!(outcome.winner, Side::Monster);
        assert_eq!(outcome.final_hero_hit_points, 0);
        assert_eq!(outcome.gold_looted, 0);
    }

    #[tokio::test]
    async fn missing_monster_is_rejected() {
        let result = ManualFight::new()
            .execute(FightRequest {
                hero: Some(Combatant::new(10, 10, 0, 10)),
                monster: None,
            })
            .await;
        assert_eq!(result, Err(ManualFightError::MissingCombatant("monster")));
    }

    #[tokio::test]
    async fn huge_health_pools_stop_at_the_turn_limit() {
        let outcome = ManualFight::new()
            .execute(FightRequest {
                hero: Some(Combatant::new(1_000_000_000_000, 1, 0, 1)),
                monster: Some(Combatant::new(1_000_000_000_000, 1, 0, 0)),
            })
            .await
            .expect("both sides present");

        assert_eq!(outcome.log.len(), MAX_TURNS as usize + 2);
    }
}

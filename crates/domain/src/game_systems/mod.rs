//! Game rule systems.

pub mod combat;

pub use combat::{
    first_attacker, hero_damage, monster_damage, resolve, simulate, BattleOutcome, BattleReport,
    BattleRequest, Combatant, Side, Turn, MAX_TURNS,
};

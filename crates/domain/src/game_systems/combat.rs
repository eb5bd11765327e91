//! Turn-based combat resolution.
//!
//! A fight is a pure function of the two combatants: the faster side strikes
//! first (the hero on a tie), blows alternate, and the fight stops as soon as
//! one side drops to zero hit points or below. Nothing here performs I/O, so
//! independent battles can be resolved concurrently.
//!
//! A fight lasts at most [`MAX_TURNS`] blows. Hit points come from the
//! requester, so without the cap the work and the log would grow with them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Blows after which a fight is stopped.
pub const MAX_TURNS: u32 = 10_000;

/// One side's battle-relevant stats for a single fight.
///
/// Field names follow the combat wire format. Missing fields decode as zero,
/// which yields a degenerate but well-defined fight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Combatant {
    #[serde(rename = "hp")]
    pub hit_points: i64,
    #[serde(rename = "atk")]
    pub attack: i64,
    #[serde(rename = "res")]
    pub resistance: i64,
    #[serde(rename = "vit", alias = "speed")]
    pub initiative: i64,
    /// Only meaningful on the monster side.
    #[serde(rename = "gold", alias = "or")]
    pub loot_gold: i64,
}

impl Combatant {
    pub fn new(hit_points: i64, attack: i64, resistance: i64, initiative: i64) -> Self {
        Self {
            hit_points,
            attack,
            resistance,
            initiative,
            loot_gold: 0,
        }
    }

    pub fn with_loot(mut self, gold: i64) -> Self {
        self.loot_gold = gold;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Hero,
    Monster,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::Hero => Side::Monster,
            Side::Monster => Side::Hero,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Hero => "hero",
            Side::Monster => "monster",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable input of a fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRequest {
    pub hero: Combatant,
    pub monster: Combatant,
}

impl BattleRequest {
    pub fn new(hero: Combatant, monster: Combatant) -> Self {
        Self { hero, monster }
    }

    pub fn resolve(&self) -> BattleOutcome {
        resolve(&self.hero, &self.monster)
    }
}

/// Result of a fight as sent back to the requester.
///
/// `final_hero_hit_points` is the raw engine value and may be negative when
/// the killing blow overshoots; callers clamp for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleOutcome {
    pub winner: Side,
    #[serde(rename = "finalHeroHp", default)]
    pub final_hero_hit_points: i64,
    #[serde(default)]
    pub gold_looted: i64,
    #[serde(rename = "battleLog", default)]
    pub log: Vec<String>,
}

impl BattleOutcome {
    pub fn hero_won(&self) -> bool {
        self.winner == Side::Hero
    }
}

/// A single blow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    pub number: u32,
    pub attacker: Side,
    pub damage: i64,
    /// Defender health after the blow landed.
    pub defender_hit_points: i64,
}

/// Full trace of a fight: the outcome plus the structured turns it was
/// rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleReport {
    pub first_attacker: Side,
    pub turns: Vec<Turn>,
    /// Neither side could deal damage, so the fight was stopped.
    pub stalemate: bool,
    /// The fight hit [`MAX_TURNS`] with both sides standing.
    pub turn_limit_reached: bool,
    pub outcome: BattleOutcome,
}

/// Strictly greater initiative acts first; ties go to the hero.
pub fn first_attacker(hero: &Combatant, monster: &Combatant) -> Side {
    if monster.initiative > hero.initiative {
        Side::Monster
    } else {
        Side::Hero
    }
}

/// Monster defense is not modeled. Negative attack never heals.
pub fn hero_damage(hero: &Combatant) -> i64 {
    hero.attack.max(0)
}

/// Hero resistance mitigates the monster's attack, floored at zero.
pub fn monster_damage(hero: &Combatant, monster: &Combatant) -> i64 {
    monster.attack.saturating_sub(hero.resistance).max(0)
}

pub fn resolve(hero: &Combatant, monster: &Combatant) -> BattleOutcome {
    simulate(hero, monster).outcome
}

pub fn simulate(hero: &Combatant, monster: &Combatant) -> BattleReport {
    let first = first_attacker(hero, monster);
    let hero_blow = hero_damage(hero);
    let monster_blow = monster_damage(hero, monster);

    let mut hero_hp = hero.hit_points;
    let mut monster_hp = monster.hit_points;
    let mut log = vec![format!("Combat begins! Initiative: {first}")];
    let mut turns = Vec::new();
    let mut stalemate = false;
    let mut turn_limit_reached = false;
    let mut attacker = first;

    while hero_hp > 0 && monster_hp > 0 {
        // Without this the loop would never terminate.
        if hero_blow == 0 && monster_blow == 0 {
            stalemate = true;
            log.push("Stalemate: neither side can deal damage".to_string());
            break;
        }
        if turns.len() as u32 >= MAX_TURNS {
            turn_limit_reached = true;
            log.push(format!("Turn limit of {MAX_TURNS} reached: combat stopped"));
            break;
        }

        let number = turns.len() as u32 + 1;
        let turn = match attacker {
            Side::Hero => {
                monster_hp = monster_hp.saturating_sub(hero_blow);
                log.push(format!(
                    "Turn {number}: Hero deals {hero_blow} damage. Monster HP: {monster_hp}"
                ));
                Turn {
                    number,
                    attacker,
                    damage: hero_blow,
                    defender_hit_points: monster_hp,
                }
            }
            Side::Monster => {
                hero_hp = hero_hp.saturating_sub(monster_blow);
                log.push(format!(
                    "Turn {number}: Monster deals {monster_blow} damage (RES: {}). Hero HP: {hero_hp}",
                    hero.resistance
                ));
                Turn {
                    number,
                    attacker,
                    damage: monster_blow,
                    defender_hit_points: hero_hp,
                }
            }
        };
        turns.push(turn);
        attacker = attacker.opponent();
    }

    let winner = if hero_hp > 0 { Side::Hero } else { Side::Monster };
    let gold_looted = match winner {
        Side::Hero => monster.loot_gold,
        Side::Monster => 0,
    };

    BattleReport {
        first_attacker: first,
        turns,
        stalemate,
        turn_limit_reached,
        outcome: BattleOutcome {
            winner,
            final_hero_hit_points: hero_hp,
            gold_looted,
            log,
        },
    }
}

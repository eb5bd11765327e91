//! Game orchestration use cases.

mod error;
mod next_step;
mod rewards;
mod select_class;
mod start;

use std::sync::Arc;

pub use error::GameError;
pub use next_step::{session_from_snapshot, PlayNextStep};
pub use rewards::{ClaimReward, GetRewards, REWARD_CHOICES};
pub use select_class::SelectHeroClass;
pub use start::InitializeGame;

use crate::infrastructure::ports::{
    CombatPort, HeroActionPort, HeroServicePort, ItemServicePort, LevelDesignPort,
    SaveServicePort,
};

/// Container for game use cases.
pub struct GameUseCases {
    pub next_step: Arc<PlayNextStep>,
    pub start: Arc<InitializeGame>,
    pub select_class: SelectHeroClass,
    pub rewards: Arc<GetRewards>,
    pub claim_reward: Arc<ClaimReward>,
}

impl GameUseCases {
    pub fn new(
        combat: Arc<dyn CombatPort>,
        actions: Arc<dyn HeroActionPort>,
        heroes: Arc<dyn HeroServicePort>,
        saves: Arc<dyn SaveServicePort>,
        level_design: Arc<dyn LevelDesignPort>,
        items: Arc<dyn ItemServicePort>,
    ) -> Self {
        Self {
            next_step: Arc::new(PlayNextStep::new(
                combat,
                actions.clone(),
                heroes.clone(),
                saves.clone(),
            )),
            start: Arc::new(InitializeGame::new(actions.clone(), level_design, saves)),
            select_class: SelectHeroClass::new(),
            rewards: Arc::new(GetRewards::new(items)),
            claim_reward: Arc::new(ClaimReward::new(heroes, actions)),
        }
    }
}

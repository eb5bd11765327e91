//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::ports::{
    CombatPort, HeroActionPort, HeroServicePort, ItemServicePort, LevelDesignPort,
    SaveServicePort,
};
use crate::use_cases;

/// Main application state of the game service.
///
/// Passed to HTTP handlers via Axum state.
pub struct App {
    pub use_cases: UseCases,
}

/// Container for all use cases.
pub struct UseCases {
    pub game: use_cases::GameUseCases,
}

/// Collaborators the game service is wired to.
pub struct GamePorts {
    pub combat: Arc<dyn CombatPort>,
    pub actions: Arc<dyn HeroActionPort>,
    pub heroes: Arc<dyn HeroServicePort>,
    pub saves: Arc<dyn SaveServicePort>,
    pub level_design: Arc<dyn LevelDesignPort>,
    pub items: Arc<dyn ItemServicePort>,
}

impl App {
    pub fn new(game: use_cases::GameUseCases) -> Self {
        Self {
            use_cases: UseCases { game },
        }
    }

    pub fn from_ports(ports: GamePorts) -> Self {
        Self::new(use_cases::GameUseCases::new(
            ports.combat,
            ports.actions,
            ports.heroes,
            ports.saves,
            ports.level_design,
            ports.items,
        ))
    }
}

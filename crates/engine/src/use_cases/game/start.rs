//! Start game use case.
//!
//! Creates the hero, asks level design for a fresh dungeon and saves a new
//! session positioned on its first room.

use std::sync::Arc;

use delve_domain::{GameSession, HeroClass, UserId};
use delve_shared::{HeroAction, StartGameResponse};

use crate::infrastructure::ports::{HeroActionPort, LevelDesignPort, SaveServicePort};

use super::error::{CollaboratorError, GameError};

pub struct InitializeGame {
    actions: Arc<dyn HeroActionPort>,
    level_design: Arc<dyn LevelDesignPort>,
    saves: Arc<dyn SaveServicePort>,
}

impl InitializeGame {
    pub fn new(
        actions: Arc<dyn HeroActionPort>,
        level_design: Arc<dyn LevelDesignPort>,
        saves: Arc<dyn SaveServicePort>,
    ) -> Self {
        Self {
            actions,
            level_design,
            saves,
        }
    }

    /// `class_name` defaults to `WARRIOR` when absent.
    pub async fn execute(
        &self,
        user_id: UserId,
        name: &str,
        class_name: Option<&str>,
    ) -> Result<StartGameResponse, GameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::InvalidRequest("hero name is required".to_string()));
        }
        let class = match class_name {
            Some(class_name) => class_name.parse::<HeroClass>()?,
            None => HeroClass::default(),
        };

        let session = self
            .initialize(&user_id, name, class)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Game initialization failed");
                GameError::InitializationFailed
            })?;

        let Some(dungeon_id) = session.dungeon_id().cloned() else {
            return Err(GameError::InitializationFailed);
        };
        tracing::info!(
            user_id = %user_id,
            dungeon_id = %dungeon_id,
            rooms = session.rooms().len(),
            "Game started"
        );

        Ok(StartGameResponse {
            status: "STARTING".to_string(),
            user_id: user_id.to_string(),
            dungeon_id,
            current_room: session.rooms().first().cloned(),
            message: format!("Adventure started for {name} the {class}!"),
        })
    }

    async fn initialize(
        &self,
        user_id: &UserId,
        name: &str,
        class: HeroClass,
    ) -> Result<GameSession, CollaboratorError> {
        self.actions
            .dispatch(HeroAction::CreateHero {
                user_id: user_id.clone(),
                name: name.to_string(),
                hero_class: class,
            })
            .await?;

        let dungeon = self.level_design.generate_dungeon().await?;
        let session = GameSession::start(user_id.clone(), dungeon);
        self.saves.create(&session).await?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{
        MockHeroActionPort, MockLevelDesignPort, MockSaveServicePort, ServiceError,
    };
    use delve_domain::{Dungeon, DungeonId, MessageId, Room, SessionStatus};

    fn user() -> UserId {
        UserId::new("user-1").expect("valid user id")
    }

    fn dungeon() -> Dungeon {
        Dungeon {
            id: DungeonId::new("dungeon-9").expect("valid dungeon id"),
            rooms: vec![Room::empty(), Room::empty()],
        }
    }

    #[tokio::test]
    async fn creates_hero_dungeon_and_save() {
        let mut actions = MockHeroActionPort::new();
        actions
            .expect_dispatch()
            .withf(|action| {
                matches!(
                    action,
                    HeroAction::CreateHero { name, hero_class: HeroClass::Assassin, .. }
                        if name == "Aria"
                )
            })
            .times(1)
            .returning(|_| Ok(MessageId::new()));

        let mut level_design = MockLevelDesignPort::new();
        level_design
            .expect_generate_dungeon()
            .times(1)
            .returning(|| Ok(dungeon()));

        let mut saves = MockSaveServicePort::new();
        saves
            .expect_create()
            .withf(|session| {
                session.current_room_index() == 0
                    && session.status() == SessionStatus::Exploring
                    && session.rooms().len() == 2
            })
            .times(1)
            .returning(|_| Ok(()));

        let response = InitializeGame::new(
            Arc::new(actions),
            Arc::new(level_design),
            Arc::new(saves),
        )
        .execute(user(), "Aria", Some("assassin"))
        .await
        .expect("game started");

        assert_eq!(response.status, "STARTING");
        assert_eq!(response.dungeon_id.as_str(), "dungeon-9");
        assert_eq!(response.current_room, Some(Room::empty()));
        assert_eq!(response.message, "Adventure started for Aria the ASSASSIN!");
    }

    #[tokio::test]
    async fn invalid_class_stops_before_any_call() {
        let mut actions = MockHeroActionPort::new();
        actions.expect_dispatch().times(0);

        let result = InitializeGame::new(
            Arc::new(actions),
            Arc::new(MockLevelDesignPort::new()),
            Arc::new(MockSaveServicePort::new()),
        )
        .execute(user(), "Aria", Some("bard"))
        .await;

        assert!(matches!(result, Err(GameError::InvalidClass(_))));
    }

    #[tokio::test]
    async fn level_design_failure_is_an_initialization_error() {
        let mut actions = MockHeroActionPort::new();
        actions.expect_dispatch().returning(|_| Ok(MessageId::new()));

        let mut level_design = MockLevelDesignPort::new();
        level_design
            .expect_generate_dungeon()
            .returning(|| Err(ServiceError::request("level design service", "503")));

        let mut saves = MockSaveServicePort::new();
        saves.expect_create().times(0);

        let result = InitializeGame::new(
            Arc::new(actions),
            Arc::new(level_design),
            Arc::new(saves),
        )
        .execute(user(), "Aria", None)
        .await;

        assert!(matches!(result, Err(GameError::InitializationFailed)));
    }
}

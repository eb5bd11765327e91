//! Reward offers and claims after a cleared dungeon.

use std::sync::Arc;

use delve_domain::{Item, UserId, MAX_INVENTORY_SLOTS};
use delve_shared::{ClaimRewardResponse, ClaimStatus, HeroAction};

use crate::infrastructure::ports::{HeroActionPort, HeroServicePort, ItemServicePort};

use super::error::GameError;

/// Items offered per reward screen.
pub const REWARD_CHOICES: usize = 5;

pub struct GetRewards {
    items: Arc<dyn ItemServicePort>,
}

impl GetRewards {
    pub fn new(items: Arc<dyn ItemServicePort>) -> Self {
        Self { items }
    }

    pub async fn execute(&self) -> Result<Vec<Item>, GameError> {
        self.items
            .random_items(REWARD_CHOICES)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to fetch reward items");
                GameError::RewardsUnavailable
            })
    }
}

pub struct ClaimReward {
    heroes: Arc<dyn HeroServicePort>,
    actions: Arc<dyn HeroActionPort>,
}

impl ClaimReward {
    pub fn new(heroes: Arc<dyn HeroServicePort>, actions: Arc<dyn HeroActionPort>) -> Self {
        Self { heroes, actions }
    }

    /// A full inventory is a normal answer, not an error.
    pub async fn execute(
        &self,
        user_id: &UserId,
        item: Item,
    ) -> Result<ClaimRewardResponse, GameError> {
        let hero = self
            .heroes
            .get_hero(user_id)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to load hero");
                GameError::RewardClaimFailed
            })?
            .ok_or_else(|| GameError::HeroNotFound(user_id.to_string()))?;

        if hero.inventory_full() {
            return Ok(ClaimRewardResponse {
                status: ClaimStatus::InventoryFull,
                message: format!("Inventory full ({MAX_INVENTORY_SLOTS} items maximum)."),
                item: None,
                inventory: Some(hero.inventory),
            });
        }

        self.actions
            .dispatch(HeroAction::AddItem {
                user_id: user_id.clone(),
                item: item.clone(),
            })
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to dispatch reward");
                GameError::RewardClaimFailed
            })?;

        tracing::info!(user_id = %user_id, item = %item.name, "Reward claimed");
        Ok(ClaimRewardResponse {
            status: ClaimStatus::RewardClaimed,
            message: format!("{} added to the inventory.", item.name),
            item: Some(item),
            inventory: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{
        MockHeroActionPort, MockHeroServicePort, MockItemServicePort, ServiceError,
    };
    use delve_domain::{Hero, InventoryEntry, MessageId};

    fn user() -> UserId {
        UserId::new("user-1").expect("valid user id")
    }

    fn sword() -> Item {
        Item {
            name: "Sword".into(),
            atk: 5,
            ..Item::default()
        }
    }

    fn hero_with_items(count: usize) -> Hero {
        Hero {
            name: "Aria".into(),
            inventory: (0..count)
                .map(|i| InventoryEntry::Id(format!("item-{i}")))
                .collect(),
            ..Hero::default()
        }
    }

    #[tokio::test]
    async fn offers_five_items() {
        let mut items = MockItemServicePort::new();
        items
            .expect_random_items()
            .withf(|count| *count == 5)
            .returning(|count| Ok(vec![sword(); count]));

        let offered = GetRewards::new(Arc::new(items))
            .execute()
            .await
            .expect("items");
        assert_eq!(offered.len(), 5);
    }

    #[tokio::test]
    async fn item_service_failure_is_reported() {
        let mut items = MockItemServicePort::new();
        items
            .expect_random_items()
            .returning(|_| Err(ServiceError::request("item service", "timeout")));

        let result = GetRewards::new(Arc::new(items)).execute().await;
        assert!(matches!(result, Err(GameError::RewardsUnavailable)));
    }

    #[tokio::test]
    async fn full_inventory_refuses_without_dispatching() {
        let mut heroes = MockHeroServicePort::new();
        heroes
            .expect_get_hero()
            .returning(|_| Ok(Some(hero_with_items(3))));
        let mut actions = MockHeroActionPort::new();
        actions.expect_dispatch().times(0);

        let response = ClaimReward::new(Arc::new(heroes), Arc::new(actions))
            .execute(&user(), sword())
            .await
            .expect("answer");

        assert_eq!(response.status, ClaimStatus::InventoryFull);
        assert_eq!(response.inventory.map(|i| i.len()), Some(3));
    }

    #[tokio::test]
    async fn claim_dispatches_add_item() {
        let mut heroes = MockHeroServicePort::new();
        heroes
            .expect_get_hero()
            .returning(|_| Ok(Some(hero_with_items(1))));
        let mut actions = MockHeroActionPort::new();
        actions
            .expect_dispatch()
            .withf(|action| matches!(action, HeroAction::AddItem { item, .. } if item.name == "Sword"))
            .times(1)
            .returning(|_| Ok(MessageId::new()));

        let response = ClaimReward::new(Arc::new(heroes), Arc::new(actions))
            .execute(&user(), sword())
            .await
            .expect("claimed");

        assert_eq!(response.status, ClaimStatus::RewardClaimed);
        assert_eq!(response.item, Some(sword()));
    }

    #[tokio::test]
    async fn unknown_hero_cannot_claim() {
        let mut heroes = MockHeroServicePort::new();
        heroes.expect_get_hero().returning(|_| Ok(None));

        let result = ClaimReward::new(Arc::new(heroes), Arc::new(MockHeroActionPort::new()))
            .execute(&user(), sword())
            .await;
        assert!(matches!(result, Err(GameError::HeroNotFound(_))));
    }
}

//! Hero class selection.

use delve_domain::{HeroClass, UserId};
use delve_shared::ClassSelectedResponse;

use super::error::GameError;

/// Validates a class choice. Matching ignores case.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectHeroClass;

impl SelectHeroClass {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(
        &self,
        user_id: &UserId,
        class_name: &str,
    ) -> Result<ClassSelectedResponse, GameError> {
        let class: HeroClass = class_name.parse()?;
        tracing::info!(user_id = %user_id, class = %class, "Hero class selected");
        Ok(ClassSelectedResponse {
            class_name: class,
            message: format!("Class {class} selected."),
        })
    }
}

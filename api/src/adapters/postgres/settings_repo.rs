//! PostgreSQL adapter for SettingsRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};

use crate::domain::ports::SettingsRepository;
use crate::entity::system_settings;
use crate::error::DomainError;

/// PostgreSQL implementation of SettingsRepository
pub struct PostgresSettingsRepository {
    db: DatabaseConnection,
}

impl PostgresSettingsRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsRepository for PostgresSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, DomainError> {
        let result = system_settings::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?;
        Ok(result.map(|m| m.value))
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), DomainError> {
        let model = system_settings::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.clone()),
            updated_at: Set(Utc::now().fixed_offset()),
        };

        system_settings::Entity::insert(model)
            .on_conflict(
                OnConflict::column(system_settings::Column::Key)
                    .update_columns([
                        system_settings::Column::Value,
                        system_settings::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

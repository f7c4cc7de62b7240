//! PostgreSQL adapter for ContactRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::{parse_or, utc};
use crate::domain::entities::{
    ArtistId, BranchId, Contact, ContactId, ContactStatus, NewContact,
};
use crate::domain::ports::ContactRepository;
use crate::entity::contacts;
use crate::error::DomainError;

/// PostgreSQL implementation of ContactRepository
pub struct PostgresContactRepository {
    db: DatabaseConnection,
}

impl PostgresContactRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContactRepository for PostgresContactRepository {
    async fn create(&self, contact: &NewContact) -> Result<Contact, DomainError> {
        let now = Utc::now().fixed_offset();
        let model = contacts::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(contact.name.clone()),
            phone: Set(contact.phone.clone()),
            email: Set(contact.email.clone()),
            message: Set(contact.message.clone()),
            branch_id: Set(contact.branch_id.map(|b| b.0)),
            artist_id: Set(contact.artist_id.map(|a| a.0)),
            status: Set(ContactStatus::New.to_string()),
            admin_note: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model.insert(&self.db).await?;
        Ok(result.into())
    }

    async fn find_by_id(&self, id: &ContactId) -> Result<Option<Contact>, DomainError> {
        let result = contacts::Entity::find_by_id(id.0).one(&self.db).await?;
        Ok(result.map(|m| m.into()))
    }

    async fn list(
        &self,
        status: Option<ContactStatus>,
        branch_id: Option<&BranchId>,
    ) -> Result<Vec<Contact>, DomainError> {
        let mut query = contacts::Entity::find().order_by_desc(contacts::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(contacts::Column::Status.eq(status.to_string()));
        }
        if let Some(branch_id) = branch_id {
            query = query.filter(
                Condition::any()
                    .add(contacts::Column::BranchId.eq(branch_id.0))
                    .add(contacts::Column::BranchId.is_null()),
            );
        }

        let results = query.all(&self.db).await?;
        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn update_status(
        &self,
        id: &ContactId,
        status: ContactStatus,
        admin_note: Option<String>,
    ) -> Result<Contact, DomainError> {
        let mut model = contacts::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Contact {} not found", id)))?
            .into_active_model();

        model.status = Set(status.to_string());
        if admin_note.is_some() {
            model.admin_note = Set(admin_note);
        }
        model.updated_at = Set(Utc::now().fixed_offset());

        let result = model.update(&self.db).await?;
        Ok(result.into())
    }
}

impl From<contacts::Model> for Contact {
    fn from(model: contacts::Model) -> Self {
        Contact {
            id: ContactId(model.id),
            name: model.name,
            phone: model.phone,
            email: model.email,
            message: model.message,
            branch_id: model.branch_id.map(BranchId),
            artist_id: model.artist_id.map(ArtistId),
            status: parse_or(&model.status, ContactStatus::New),
            admin_note: model.admin_note,
            created_at: utc(model.created_at),
            updated_at: utc(model.updated_at),
        }
    }
}

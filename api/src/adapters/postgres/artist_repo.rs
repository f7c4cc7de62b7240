//! PostgreSQL adapter for ArtistRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::{string_list, utc};
use crate::domain::entities::{
    Artist, ArtistChanges, ArtistId, BranchId, NewArtist, NewPortfolioItem, PortfolioChanges,
    PortfolioItem, PortfolioItemId, UserId,
};
use crate::domain::ports::ArtistRepository;
use crate::entity::{artists, portfolio_items};
use crate::error::DomainError;

/// PostgreSQL implementation of ArtistRepository
pub struct PostgresArtistRepository {
    db: DatabaseConnection,
}

impl PostgresArtistRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ArtistRepository for PostgresArtistRepository {
    async fn find_by_id(&self, id: &ArtistId) -> Result<Option<Artist>, DomainError> {
        let result = artists::Entity::find_by_id(id.0).one(&self.db).await?;
        Ok(result.map(|m| m.into()))
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Artist>, DomainError> {
        let result = artists::Entity::find()
            .filter(artists::Column::UserId.eq(user_id.0))
            .one(&self.db)
            .await?;
        Ok(result.map(|m| m.into()))
    }

    async fn list(
        &self,
        branch_id: Option<&BranchId>,
        include_inactive: bool,
    ) -> Result<Vec<Artist>, DomainError> {
        let mut query = artists::Entity::find().order_by_asc(artists::Column::DisplayName);
        if let Some(branch_id) = branch_id {
            query = query.filter(artists::Column::BranchId.eq(branch_id.0));
        }
        if !include_inactive {
            query = query.filter(artists::Column::IsActive.eq(true));
        }

        let results = query.all(&self.db).await?;
        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn create(&self, artist: &NewArtist) -> Result<Artist, DomainError> {
        let model = artists::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(artist.user_id.0),
            branch_id: Set(artist.branch_id.0),
            display_name: Set(artist.display_name.clone()),
            bio: Set(artist.bio.clone()),
            specialties: Set(serde_json::json!(artist.specialties)),
            avatar_url: Set(artist.avatar_url.clone()),
            is_active: Set(true),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = model.insert(&self.db).await?;
        Ok(result.into())
    }

    async fn update(
        &self,
        id: &ArtistId,
        changes: &ArtistChanges,
    ) -> Result<Artist, DomainError> {
        let mut model = artists::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Artist {} not found", id)))?
            .into_active_model();

        if let Some(branch_id) = changes.branch_id {
            model.branch_id = Set(branch_id.0);
        }
        if let Some(display_name) = &changes.display_name {
            model.display_name = Set(display_name.clone());
        }
        if let Some(bio) = &changes.bio {
            model.bio = Set(bio.clone());
        }
        if let Some(specialties) = &changes.specialties {
            model.specialties = Set(serde_json::json!(specialties));
        }
        if let Some(avatar_url) = &changes.avatar_url {
            model.avatar_url = Set(avatar_url.clone());
        }
        if let Some(is_active) = changes.is_active {
            model.is_active = Set(is_active);
        }

        let result = model.update(&self.db).await?;
        Ok(result.into())
    }

    async fn list_portfolio(
        &self,
        artist_id: &ArtistId,
        include_private: bool,
    ) -> Result<Vec<PortfolioItem>, DomainError> {
        let mut query = portfolio_items::Entity::find()
            .filter(portfolio_items::Column::ArtistId.eq(artist_id.0))
            .order_by_desc(portfolio_items::Column::CreatedAt);
        if !include_private {
            query = query.filter(portfolio_items::Column::IsPublic.eq(true));
        }

        let results = query.all(&self.db).await?;
        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn find_portfolio_item(
        &self,
        id: &PortfolioItemId,
    ) -> Result<Option<PortfolioItem>, DomainError> {
        let result = portfolio_items::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?;
        Ok(result.map(|m| m.into()))
    }

    async fn create_portfolio_item(
        &self,
        item: &NewPortfolioItem,
    ) -> Result<PortfolioItem, DomainError> {
        let model = portfolio_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            artist_id: Set(item.artist_id.0),
            title: Set(item.title.clone()),
            description: Set(item.description.clone()),
            image_url: Set(item.image_url.clone()),
            tags: Set(serde_json::json!(item.tags)),
            is_public: Set(item.is_public),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = model.insert(&self.db).await?;
        Ok(result.into())
    }

    async fn update_portfolio_item(
        &self,
        id: &PortfolioItemId,
        changes: &PortfolioChanges,
    ) -> Result<PortfolioItem, DomainError> {
        let mut model = portfolio_items::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Portfolio item {} not found", id)))?
            .into_active_model();

        if let Some(title) = &changes.title {
            model.title = Set(title.clone());
        }
        if let Some(description) = &changes.description {
            model.description = Set(description.clone());
        }
        if let Some(image_url) = &changes.image_url {
            model.image_url = Set(image_url.clone());
        }
        if let Some(tags) = &changes.tags {
            model.tags = Set(serde_json::json!(tags));
        }
        if let Some(is_public) = changes.is_public {
            model.is_public = Set(is_public);
        }

        let result = model.update(&self.db).await?;
        Ok(result.into())
    }

    async fn delete_portfolio_item(&self, id: &PortfolioItemId) -> Result<(), DomainError> {
        portfolio_items::Entity::delete_by_id(id.0)
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

impl From<artists::Model> for Artist {
    fn from(model: artists::Model) -> Self {
        Artist {
            id: ArtistId(model.id),
            user_id: UserId(model.user_id),
            branch_id: BranchId(model.branch_id),
            display_name: model.display_name,
            bio: model.bio,
            specialties: string_list(model.specialties),
            avatar_url: model.avatar_url,
            is_active: model.is_active,
            created_at: utc(model.created_at),
        }
    }
}

impl From<portfolio_items::Model> for PortfolioItem {
    fn from(model: portfolio_items::Model) -> Self {
        PortfolioItem {
            id: PortfolioItemId(model.id),
            artist_id: ArtistId(model.artist_id),
            title: model.title,
            description: model.description,
            image_url: model.image_url,
            tags: string_list(model.tags),
            is_public: model.is_public,
            created_at: utc(model.created_at),
        }
    }
}

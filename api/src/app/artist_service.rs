//! Artist profiles and portfolios

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::audit_service::AuditService;
use crate::app::serde_helpers::double_option;
use crate::app::validation::{optional_text, required_text};
use crate::auth::{require_branch_access, require_role};
use crate::domain::entities::{
    Artist, ArtistChanges, ArtistId, BranchId, NewArtist, NewPortfolioItem, PortfolioChanges,
    PortfolioItem, PortfolioItemId, Role, User, UserChanges, UserId,
};
use crate::domain::ports::{
    ArtistRepository, AuditLogRepository, BranchRepository, UserRepository,
};
use crate::error::{AppError, DomainError};

const MAX_TAGS: usize = 20;

/// Artist with the portfolio visible to the caller
#[derive(Debug, Clone, Serialize)]
pub struct ArtistProfile {
    #[serde(flatten)]
    pub artist: Artist,
    pub portfolio: Vec<PortfolioItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistInput {
    pub user_id: UserId,
    pub branch_id: BranchId,
    pub display_name: String,
    pub bio: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistUpdate {
    pub branch_id: Option<BranchId>,
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
    pub specialties: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar_url: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioInput {
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortfolioUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

/// Trim, drop empties and cap a free-form tag list
fn clean_tags(tags: Vec<String>) -> Result<Vec<String>, AppError> {
    let tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.len() > MAX_TAGS {
        return Err(AppError::BadRequest(format!("At most {} tags allowed", MAX_TAGS)));
    }
    Ok(tags)
}

pub struct ArtistService<AR, UR, BR, AL>
where
    AR: ArtistRepository,
    UR: UserRepository,
    BR: BranchRepository,
    AL: AuditLogRepository,
{
    artists: Arc<AR>,
    users: Arc<UR>,
    branches: Arc<BR>,
    audit: Arc<AuditService<AL>>,
}

impl<AR, UR, BR, AL> ArtistService<AR, UR, BR, AL>
where
    AR: ArtistRepository,
    UR: UserRepository,
    BR: BranchRepository,
    AL: AuditLogRepository,
{
    pub fn new(
        artists: Arc<AR>,
        users: Arc<UR>,
        branches: Arc<BR>,
        audit: Arc<AuditService<AL>>,
    ) -> Self {
        Self {
            artists,
            users,
            branches,
            audit,
        }
    }

    /// Active artists, optionally of one branch
    pub async fn list(&self, branch_id: Option<BranchId>) -> Result<Vec<Artist>, AppError> {
        Ok(self.artists.list(branch_id.as_ref(), false).await?)
    }

    /// Artist page; private pieces are only shown to the artist and admins
    pub async fn profile(
        &self,
        viewer: Option<&User>,
        id: &ArtistId,
    ) -> Result<ArtistProfile, AppError> {
        let artist = self.get(id).await?;
        let can_edit = viewer.is_some_and(|u| self.may_edit(u, &artist));
        if !artist.is_active && !can_edit {
            return Err(DomainError::NotFound(format!("Artist {} not found", id)).into());
        }

        let portfolio = self.artists.list_portfolio(&artist.id, can_edit).await?;
        Ok(ArtistProfile { artist, portfolio })
    }

    pub async fn get(&self, id: &ArtistId) -> Result<Artist, AppError> {
        self.artists
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Artist {} not found", id)).into())
    }

    /// Create an artist profile for an existing user and promote them
    pub async fn create(&self, actor: &User, input: ArtistInput) -> Result<Artist, AppError> {
        require_role(actor, &[Role::Boss, Role::Manager])?;
        require_branch_access(actor, &input.branch_id)?;
        self.active_branch(&input.branch_id).await?;

        let user = self
            .users
            .find_by_id(&input.user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("User {} not found", input.user_id)))?;
        if matches!(user.role, Role::Boss | Role::Manager) {
            return Err(AppError::BadRequest(
                "Administrators cannot be artists".to_string(),
            ));
        }
        if self.artists.find_by_user_id(&user.id).await?.is_some() {
            return Err(DomainError::AlreadyExists(format!(
                "User {} already has an artist profile",
                user.id
            ))
            .into());
        }

        let artist = self
            .artists
            .create(&NewArtist {
                user_id: user.id,
                branch_id: input.branch_id,
                display_name: required_text("Display name", &input.display_name, 100)?,
                bio: optional_text(input.bio.as_deref()),
                specialties: clean_tags(input.specialties)?,
                avatar_url: optional_text(input.avatar_url.as_deref()),
            })
            .await?;

        self.users
            .update(
                &user.id,
                &UserChanges {
                    role: Some(Role::Artist),
                    branch_id: Some(Some(input.branch_id)),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(artist_id = %artist.id, user_id = %user.id, "Artist profile created");
        self.audit
            .record_by(
                actor,
                "artist.create",
                "artist",
                artist.id,
                json!({"user_id": user.id, "branch_id": artist.branch_id}),
            )
            .await;
        Ok(artist)
    }

    pub async fn update(
        &self,
        actor: &User,
        id: &ArtistId,
        update: ArtistUpdate,
    ) -> Result<Artist, AppError> {
        require_role(actor, &[Role::Boss, Role::Manager])?;
        let artist = self.get(id).await?;
        require_branch_access(actor, &artist.branch_id)?;

        if let Some(branch_id) = &update.branch_id {
            require_branch_access(actor, branch_id)?;
            self.active_branch(branch_id).await?;
        }

        let changes = ArtistChanges {
            branch_id: update.branch_id,
            display_name: update
                .display_name
                .as_deref()
                .map(|n| required_text("Display name", n, 100))
                .transpose()?,
            bio: update.bio.map(|b| optional_text(b.as_deref())),
            specialties: update.specialties.map(clean_tags).transpose()?,
            avatar_url: update.avatar_url.map(|a| optional_text(a.as_deref())),
            is_active: update.is_active,
        };
        let updated = self.artists.update(id, &changes).await?;

        if let Some(branch_id) = update.branch_id.filter(|b| *b != artist.branch_id) {
            self.users
                .update(
                    &artist.user_id,
                    &UserChanges {
                        branch_id: Some(Some(branch_id)),
                        ..Default::default()
                    },
                )
                .await?;
        }

        self.audit
            .record_by(
                actor,
                "artist.update",
                "artist",
                updated.id,
                json!({"branch_id": updated.branch_id, "is_active": updated.is_active}),
            )
            .await;
        Ok(updated)
    }

    pub async fn add_portfolio_item(
        &self,
        actor: &User,
        artist_id: &ArtistId,
        input: PortfolioInput,
    ) -> Result<PortfolioItem, AppError> {
        let artist = self.get(artist_id).await?;
        self.require_editor(actor, &artist)?;

        let item = self
            .artists
            .create_portfolio_item(&NewPortfolioItem {
                artist_id: artist.id,
                title: required_text("Title", &input.title, 200)?,
                description: optional_text(input.description.as_deref()),
                image_url: required_text("Image URL", &input.image_url, 2048)?,
                tags: clean_tags(input.tags)?,
                is_public: input.is_public,
            })
            .await?;

        tracing::debug!(item_id = %item.id, artist_id = %artist.id, "Portfolio item added");
        Ok(item)
    }

    pub async fn update_portfolio_item(
        &self,
        actor: &User,
        id: &PortfolioItemId,
        update: PortfolioUpdate,
    ) -> Result<PortfolioItem, AppError> {
        self.editable_item(actor, id).await?;

        let changes = PortfolioChanges {
            title: update
                .title
                .as_deref()
                .map(|t| required_text("Title", t, 200))
                .transpose()?,
            description: update.description.map(|d| optional_text(d.as_deref())),
            image_url: update
                .image_url
                .as_deref()
                .map(|u| required_text("Image URL", u, 2048))
                .transpose()?,
            tags: update.tags.map(clean_tags).transpose()?,
            is_public: update.is_public,
        };
        Ok(self.artists.update_portfolio_item(id, &changes).await?)
    }

    pub async fn delete_portfolio_item(
        &self,
        actor: &User,
        id: &PortfolioItemId,
    ) -> Result<(), AppError> {
        let item = self.editable_item(actor, id).await?;
        self.artists.delete_portfolio_item(&item.id).await?;

        self.audit
            .record_by(
                actor,
                "portfolio.delete",
                "portfolio_item",
                item.id,
                json!({"artist_id": item.artist_id}),
            )
            .await;
        Ok(())
    }

    async fn editable_item(
        &self,
        actor: &User,
        id: &PortfolioItemId,
    ) -> Result<PortfolioItem, AppError> {
        let item = self
            .artists
            .find_portfolio_item(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Portfolio item {} not found", id)))?;
        let artist = self.get(&item.artist_id).await?;
        self.require_editor(actor, &artist)?;
        Ok(item)
    }

    /// The artist themselves or an administrator of their branch
    fn may_edit(&self, user: &User, artist: &Artist) -> bool {
        artist.user_id == user.id || user.can_manage_branch(&artist.branch_id)
    }

    fn require_editor(&self, user: &User, artist: &Artist) -> Result<(), AppError> {
        if self.may_edit(user, artist) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    async fn active_branch(&self, id: &BranchId) -> Result<(), AppError> {
        match self.branches.find_by_id(id).await? {
            Some(branch) if branch.is_active => Ok(()),
            _ => Err(DomainError::Validation(format!("Branch {} is not available", id)).into()),
        }
    }
}

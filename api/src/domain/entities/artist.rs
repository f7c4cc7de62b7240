//! Artist and portfolio entities

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::branch::BranchId;
use super::macros::entity_id;
use super::user::UserId;

entity_id!(
    /// Unique identifier for an artist profile
    ArtistId
);

entity_id!(
    /// Unique identifier for a portfolio piece
    PortfolioItemId
);

/// Public profile of a tattoo artist
#[derive(Debug, Clone, Serialize)]
pub struct Artist {
    pub id: ArtistId,
    pub user_id: UserId,
    pub branch_id: BranchId,
    pub display_name: String,
    pub bio: Option<String>,
    pub specialties: Vec<String>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewArtist {
    pub user_id: UserId,
    pub branch_id: BranchId,
    pub display_name: String,
    pub bio: Option<String>,
    pub specialties: Vec<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ArtistChanges {
    pub branch_id: Option<BranchId>,
    pub display_name: Option<String>,
    pub bio: Option<Option<String>>,
    pub specialties: Option<Vec<String>>,
    pub avatar_url: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// A finished piece shown on the artist's page
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioItem {
    pub id: PortfolioItemId,
    pub artist_id: ArtistId,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPortfolioItem {
    pub artist_id: ArtistId,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub tags: Vec<String>,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PortfolioChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

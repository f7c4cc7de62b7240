//! Test fixtures
//!
//! Factory functions for creating test data with sensible defaults.
//! Each fixture function creates a valid entity that can be customized.

use chrono::{Duration, Utc};

use crate::domain::entities::{
    Appointment, AppointmentId, AppointmentStatus, Artist, ArtistId, Branch, BranchId, Member,
    MemberId, MembershipLevel, Role, Service, ServiceId, ServiceVariant, User, UserId,
    VariantId, VariantKind,
};

/// Create an active user; managers and artists get a fresh branch
pub fn test_user(role: Role) -> User {
    let branch_id = match role {
        Role::Manager | Role::Artist => Some(BranchId::new()),
        Role::Boss | Role::Member => None,
    };
    let id = UserId::new();
    User {
        id,
        email: format!("{}-{}@inkstone.test", role, id.0.simple()),
        phone: None,
        password_hash: "$argon2id$test".to_string(),
        name: format!("Test {}", role),
        role,
        branch_id,
        is_active: true,
        created_at: Utc::now(),
        last_login_at: None,
    }
}

/// Create a manager of a specific branch
pub fn test_manager(branch_id: BranchId) -> User {
    User {
        branch_id: Some(branch_id),
        ..test_user(Role::Manager)
    }
}

pub fn test_branch(name: &str) -> Branch {
    Branch {
        id: BranchId::new(),
        name: name.to_string(),
        address: format!("1 {} Street", name),
        phone: None,
        business_hours: Some("11:00-21:00".to_string()),
        is_active: true,
        created_at: Utc::now(),
    }
}

/// Create an active one-hour service
pub fn test_service(name: &str, base_price: i64) -> Service {
    Service {
        id: ServiceId::new(),
        name: name.to_string(),
        description: None,
        category: None,
        base_price,
        duration_minutes: 60,
        is_active: true,
        sort_order: 0,
        created_at: Utc::now(),
    }
}

pub fn test_variant(
    service_id: &ServiceId,
    kind: VariantKind,
    name: &str,
    price: i64,
) -> ServiceVariant {
    ServiceVariant {
        id: VariantId::new(),
        service_id: *service_id,
        kind,
        name: name.to_string(),
        price,
        is_active: true,
        sort_order: 0,
    }
}

/// Create an active artist profile for a fresh user
pub fn test_artist(branch_id: BranchId) -> Artist {
    Artist {
        id: ArtistId::new(),
        user_id: UserId::new(),
        branch_id,
        display_name: "Test Artist".to_string(),
        bio: None,
        specialties: vec!["blackwork".to_string()],
        avatar_url: None,
        is_active: true,
        created_at: Utc::now(),
    }
}

/// Create a standard-level member without points
pub fn test_member(user_id: UserId) -> Member {
    Member {
        id: MemberId::new(),
        user_id,
        name: "Test Member".to_string(),
        phone: Some("010-0000-0000".to_string()),
        birthday: None,
        level: MembershipLevel::Standard,
        points: 0,
        total_spent: 0,
        notes: None,
        created_at: Utc::now(),
    }
}

/// Create a confirmed two-hour appointment starting two days from now
pub fn test_appointment(member_id: MemberId, branch_id: BranchId) -> Appointment {
    let start_at = Utc::now() + Duration::days(2);
    Appointment {
        id: AppointmentId::new(),
        member_id,
        artist_id: ArtistId::new(),
        branch_id,
        service_id: None,
        cart_snapshot: None,
        start_at,
        end_at: start_at + Duration::hours(2),
        status: AppointmentStatus::Confirmed,
        notes: None,
        created_by: UserId::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

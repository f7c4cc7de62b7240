//! Member profiles and loyalty

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::app::audit_service::AuditService;
use crate::app::serde_helpers::double_option;
use crate::app::validation::{optional_text, required_text};
use crate::auth::require_staff;
use crate::domain::entities::{Member, MemberChanges, MemberId, MemberQuery, User};
use crate::domain::ports::{AuditLogRepository, MemberRepository};
use crate::error::{AppError, DomainError};

const DEFAULT_PAGE: u64 = 20;
const MAX_PAGE: u64 = 100;
const MAX_ADJUSTMENT: u64 = 1_000_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub birthday: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointsAdjustment {
    /// Positive to grant, negative to deduct
    pub delta: i64,
    pub reason: String,
}

pub struct MemberService<MR, AL>
where
    MR: MemberRepository,
    AL: AuditLogRepository,
{
    members: Arc<MR>,
    audit: Arc<AuditService<AL>>,
}

impl<MR, AL> MemberService<MR, AL>
where
    MR: MemberRepository,
    AL: AuditLogRepository,
{
    pub fn new(members: Arc<MR>, audit: Arc<AuditService<AL>>) -> Self {
        Self { members, audit }
    }

    /// Member profile of a signed-in member user, without staff notes
    pub async fn me(&self, user: &User) -> Result<Member, AppError> {
        let mut member = self.for_user(user).await?;
        member.notes = None;
        Ok(member)
    }

    /// Member profile of a user
    pub async fn for_user(&self, user: &User) -> Result<Member, AppError> {
        self.members
            .find_by_user_id(&user.id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound("No member profile for this account".to_string()).into()
            })
    }

    pub async fn update_me(&self, user: &User, update: ProfileUpdate) -> Result<Member, AppError> {
        let member = self.for_user(user).await?;

        let name = match &update.name {
            Some(name) => Some(required_text("Name", name, 100)?),
            None => None,
        };
        let changes = MemberChanges {
            name,
            phone: update.phone.map(|p| optional_text(p.as_deref())),
            birthday: update.birthday,
            notes: None,
        };

        let mut updated = self.members.update(&member.id, &changes).await?;
        updated.notes = None;
        Ok(updated)
    }

    pub async fn get(&self, actor: &User, id: &MemberId) -> Result<Member, AppError> {
        require_staff(actor)?;
        self.members
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Member {} not found", id)).into())
    }

    /// Staff search by name, phone or email
    pub async fn search(
        &self,
        actor: &User,
        mut query: MemberQuery,
    ) -> Result<Vec<Member>, AppError> {
        require_staff(actor)?;
        query.limit = match query.limit {
            0 => DEFAULT_PAGE,
            n => n.min(MAX_PAGE),
        };
        Ok(self.members.search(&query).await?)
    }

    pub async fn update_notes(
        &self,
        actor: &User,
        id: &MemberId,
        notes: Option<String>,
    ) -> Result<Member, AppError> {
        require_staff(actor)?;
        let changes = MemberChanges {
            notes: Some(optional_text(notes.as_deref())),
            ..Default::default()
        };
        let member = self.members.update(id, &changes).await?;

        self.audit
            .record_by(actor, "member.notes", "member", member.id, json!({}))
            .await;
        Ok(member)
    }

    /// Manual loyalty correction; the balance never goes negative
    pub async fn adjust_points(
        &self,
        actor: &User,
        id: &MemberId,
        adjustment: PointsAdjustment,
    ) -> Result<Member, AppError> {
        require_staff(actor)?;
        if adjustment.delta == 0 {
            return Err(AppError::BadRequest("Adjustment must not be zero".to_string()));
        }
        if adjustment.delta.unsigned_abs() > MAX_ADJUSTMENT {
            return Err(AppError::BadRequest(format!(
                "Adjustment must be within {} points",
                MAX_ADJUSTMENT
            )));
        }
        let reason = required_text("Reason", &adjustment.reason, 255)?;

        let member = self.members.add_loyalty(id, adjustment.delta, 0).await?;

        tracing::info!(member_id = %member.id, delta = adjustment.delta, "Loyalty points adjusted");
        self.audit
            .record_by(
                actor,
                "member.points_adjust",
                "member",
                member.id,
                json!({"delta": adjustment.delta, "reason": reason, "balance": member.points}),
            )
            .await;
        Ok(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{MembershipLevel, Role};
    use crate::test_utils::{
        test_member, test_user, InMemoryAuditLogRepository, InMemoryMemberRepository,
    };

    fn create_test_service(
        member: Member,
    ) -> (
        MemberService<InMemoryMemberRepository, InMemoryAuditLogRepository>,
        Arc<InMemoryAuditLogRepository>,
    ) {
        let logs = Arc::new(InMemoryAuditLogRepository::new());
        let service = MemberService::new(
            Arc::new(InMemoryMemberRepository::new().with_member(member)),
            Arc::new(AuditService::new(logs.clone())),
        );
        (service, logs)
    }

    #[tokio::test]
    async fn me_hides_staff_notes() {
        let user = test_user(Role::Member);
        let mut member = test_member(user.id);
        member.notes = Some("prefers mornings".to_string());
        let (service, _) = create_test_service(member);

        let me = service.me(&user).await.unwrap();
        assert!(me.notes.is_none());
    }

    #[tokio::test]
    async fn update_me_changes_profile() {
        let user = test_user(Role::Member);
        let (service, _) = create_test_service(test_member(user.id));
        let birthday = NaiveDate::from_ymd_opt(1995, 4, 12).unwrap();

        let updated = service
            .update_me(
                &user,
                ProfileUpdate {
                    name: Some("Ari".to_string()),
                    phone: Some(None),
                    birthday: Some(Some(birthday)),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ari");
        assert_eq!(updated.phone, None);
        assert_eq!(updated.birthday, Some(birthday));
    }

    #[tokio::test]
    async fn members_cannot_search() {
        let user = test_user(Role::Member);
        let (service, _) = create_test_service(test_member(user.id));
        assert!(service.search(&user, MemberQuery::default()).await.is_err());
        assert!(service
            .search(&test_user(Role::Artist), MemberQuery::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn search_matches_account_email() {
        let user = test_user(Role::Member);
        let member = test_member(user.id);
        let service = MemberService::new(
            Arc::new(
                InMemoryMemberRepository::new()
                    .with_member(member.clone())
                    .with_email(user.id, "ari.k@example.com"),
            ),
            Arc::new(AuditService::new(Arc::new(InMemoryAuditLogRepository::new()))),
        );
        let staff = test_user(Role::Manager);

        let found = service
            .search(
                &staff,
                MemberQuery {
                    search: Some("ARI.K@".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(found.iter().map(|m| m.id).collect::<Vec<_>>(), vec![member.id]);

        let missed = service
            .search(
                &staff,
                MemberQuery {
                    search: Some("someone.else@".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(missed.is_empty());
    }

    #[tokio::test]
    async fn points_adjustment_is_bounded() {
        let member = test_member(crate::domain::entities::UserId::new());
        let id = member.id;
        let (service, _) = create_test_service(member);

        let err = service
            .adjust_points(
                &test_user(Role::Manager),
                &id,
                PointsAdjustment {
                    delta: i64::MIN,
                    reason: "typo".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn points_adjustment_cannot_go_negative() {
        let mut member = test_member(crate::domain::entities::UserId::new());
        member.points = 50;
        let id = member.id;
        let (service, logs) = create_test_service(member);
        let staff = test_user(Role::Manager);

        let adjust = |delta| PointsAdjustment {
            delta,
            reason: "goodwill".to_string(),
        };

        let err = service.adjust_points(&staff, &id, adjust(-51)).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        let member = service.adjust_points(&staff, &id, adjust(-50)).await.unwrap();
        assert_eq!(member.points, 0);
        assert_eq!(member.level, MembershipLevel::Standard);
        assert_eq!(logs.entries().len(), 1);
    }
}

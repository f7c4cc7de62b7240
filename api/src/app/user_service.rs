//! Staff account administration

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::app::audit_service::AuditService;
use crate::app::serde_helpers::double_option;
use crate::app::validation::{normalize_email, optional_text, required_text};
use crate::auth::{
    hash_password, require_branch_access, require_role, scoped_branch, validate_password,
};
use crate::domain::entities::{BranchId, NewUser, Role, User, UserChanges, UserId};
use crate::domain::ports::{AuditLogRepository, BranchRepository, UserRepository};
use crate::error::{AppError, DomainError};

/// Staff account to create
#[derive(Debug, Clone, Deserialize)]
pub struct StaffAccount {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub branch_id: Option<BranchId>,
}

/// Fields an administrator may change on an account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaffUpdate {
    pub name: Option<String>,
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "double_option")]
    pub branch_id: Option<Option<BranchId>>,
    pub is_active: Option<bool>,
}

pub struct UserService<UR, BR, AL>
where
    UR: UserRepository,
    BR: BranchRepository,
    AL: AuditLogRepository,
{
    users: Arc<UR>,
    branches: Arc<BR>,
    audit: Arc<AuditService<AL>>,
}

impl<UR, BR, AL> UserService<UR, BR, AL>
where
    UR: UserRepository,
    BR: BranchRepository,
    AL: AuditLogRepository,
{
    pub fn new(users: Arc<UR>, branches: Arc<BR>, audit: Arc<AuditService<AL>>) -> Self {
        Self {
            users,
            branches,
            audit,
        }
    }

    pub async fn get(&self, id: &UserId) -> Result<User, AppError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("User {} not found", id)).into())
    }

    /// Accounts visible to an administrator
    pub async fn list(
        &self,
        actor: &User,
        branch_id: Option<BranchId>,
    ) -> Result<Vec<User>, AppError> {
        let branch_id = scoped_branch(actor, branch_id)?;
        Ok(self.users.list(branch_id.as_ref()).await?)
    }

    /// Create a staff account
    ///
    /// Boss may create any staff role; a manager only artists of their branch.
    pub async fn create(&self, actor: &User, account: StaffAccount) -> Result<User, AppError> {
        require_role(actor, &[Role::Boss, Role::Manager])?;

        if account.role == Role::Member {
            return Err(AppError::BadRequest(
                "Members sign up through registration".to_string(),
            ));
        }
        if actor.role == Role::Manager && account.role != Role::Artist {
            return Err(AppError::Forbidden);
        }

        let branch_id = self
            .checked_branch(actor, account.role, account.branch_id)
            .await?;

        let email = normalize_email(&account.email)?;
        let name = required_text("Name", &account.name, 100)?;
        validate_password(&account.password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(
                DomainError::AlreadyExists(format!("Email {} is already registered", email)).into(),
            );
        }

        let user = self
            .users
            .create(&NewUser {
                email,
                phone: optional_text(account.phone.as_deref()),
                password_hash: hash_password(&account.password)?,
                name,
                role: account.role,
                branch_id,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "Staff account created");
        self.audit
            .record_by(
                actor,
                "user.create",
                "user",
                user.id,
                json!({"role": user.role, "branch_id": user.branch_id}),
            )
            .await;

        Ok(user)
    }

    pub async fn update(
        &self,
        actor: &User,
        id: &UserId,
        update: StaffUpdate,
    ) -> Result<User, AppError> {
        require_role(actor, &[Role::Boss, Role::Manager])?;
        let target = self.get(id).await?;

        if actor.role == Role::Manager {
            let branch = target.branch_id.ok_or(AppError::Forbidden)?;
            require_branch_access(actor, &branch)?;
            if target.role != Role::Artist {
                return Err(AppError::Forbidden);
            }
            if update.role.is_some_and(|r| r != Role::Artist) {
                return Err(AppError::Forbidden);
            }
        }
        if target.id == actor.id && update.is_active == Some(false) {
            return Err(AppError::BadRequest("You cannot deactivate yourself".to_string()));
        }

        let role = update.role.unwrap_or(target.role);
        let branch_id = match update.branch_id {
            Some(branch) => Some(self.checked_branch(actor, role, branch).await?),
            None if update.role.is_some() => {
                Some(self.checked_branch(actor, role, target.branch_id).await?)
            }
            None => None,
        };

        let name = match &update.name {
            Some(name) => Some(required_text("Name", name, 100)?),
            None => None,
        };

        let changes = UserChanges {
            name,
            phone: None,
            role: update.role,
            branch_id,
            is_active: update.is_active,
        };
        let user = self.users.update(id, &changes).await?;

        self.audit
            .record_by(
                actor,
                "user.update",
                "user",
                user.id,
                json!({
                    "role": update.role,
                    "branch_id": user.branch_id,
                    "is_active": update.is_active,
                }),
            )
            .await;

        Ok(user)
    }

    /// Branch assignment for a role: managers and artists need one, boss and members none
    async fn checked_branch(
        &self,
        actor: &User,
        role: Role,
        branch_id: Option<BranchId>,
    ) -> Result<Option<BranchId>, AppError> {
        match role {
            Role::Manager | Role::Artist => {
                let branch_id = branch_id.ok_or_else(|| {
                    AppError::BadRequest(format!("A branch is required for role {}", role))
                })?;
                require_branch_access(actor, &branch_id)?;
                let branch = self
                    .branches
                    .find_by_id(&branch_id)
                    .await?
                    .ok_or_else(|| {
                        DomainError::NotFound(format!("Branch {} not found", branch_id))
                    })?;
                if !branch.is_active {
                    return Err(AppError::BadRequest("Branch is inactive".to_string()));
                }
                Ok(Some(branch_id))
            }
            Role::Boss | Role::Member => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        test_branch, test_manager, test_user, InMemoryAuditLogRepository, InMemoryBranchRepository,
        InMemoryUserRepository,
    };

    type Service =
        UserService<InMemoryUserRepository, InMemoryBranchRepository, InMemoryAuditLogRepository>;

    fn create_test_service(
        branch_ids: &[BranchId],
    ) -> (Service, Arc<InMemoryUserRepository>, Arc<InMemoryAuditLogRepository>) {
        let users = Arc::new(InMemoryUserRepository::new());
        let mut branches = InMemoryBranchRepository::new();
        for id in branch_ids {
            let mut branch = test_branch("Studio");
            branch.id = *id;
            branches = branches.with_branch(branch);
        }
        let logs = Arc::new(InMemoryAuditLogRepository::new());
        let service = UserService::new(
            users.clone(),
            Arc::new(branches),
            Arc::new(AuditService::new(logs.clone())),
        );
        (service, users, logs)
    }

    fn account(role: Role, branch_id: Option<BranchId>) -> StaffAccount {
        StaffAccount {
            email: format!("{}@studio.test", uuid::Uuid::new_v4()),
            password: "needle-and-ink".to_string(),
            name: "Staff".to_string(),
            phone: None,
            role,
            branch_id,
        }
    }

    #[tokio::test]
    async fn boss_creates_manager_with_branch() {
        let branch = BranchId::new();
        let (service, _, logs) = create_test_service(&[branch]);
        let boss = test_user(Role::Boss);

        let manager = service
            .create(&boss, account(Role::Manager, Some(branch)))
            .await
            .unwrap();
        assert_eq!(manager.role, Role::Manager);
        assert_eq!(manager.branch_id, Some(branch));
        assert_eq!(logs.entries().len(), 1);
    }

    #[tokio::test]
    async fn manager_and_artist_require_branch() {
        let (service, _, _) = create_test_service(&[]);
        let boss = test_user(Role::Boss);
        let err = service.create(&boss, account(Role::Artist, None)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn manager_may_only_create_artists_in_own_branch() {
        let own = BranchId::new();
        let other = BranchId::new();
        let (service, _, _) = create_test_service(&[own, other]);
        let manager = test_manager(own);

        assert!(service.create(&manager, account(Role::Artist, Some(own))).await.is_ok());
        assert!(matches!(
            service.create(&manager, account(Role::Artist, Some(other))).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            service.create(&manager, account(Role::Manager, Some(own))).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn members_cannot_administer() {
        let (service, _, _) = create_test_service(&[]);
        let member = test_user(Role::Member);
        assert!(matches!(
            service.create(&member, account(Role::Boss, None)).await,
            Err(AppError::Forbidden)
        ));
        assert!(service.list(&member, None).await.is_err());
    }

    #[tokio::test]
    async fn update_deactivates_and_audits() {
        let branch = BranchId::new();
        let (service, _, logs) = create_test_service(&[branch]);
        let boss = test_user(Role::Boss);
        let artist = service
            .create(&boss, account(Role::Artist, Some(branch)))
            .await
            .unwrap();

        let updated = service
            .update(
                &boss,
                &artist.id,
                StaffUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_active);
        assert_eq!(logs.entries().len(), 2);
    }

    #[tokio::test]
    async fn promoting_to_boss_clears_branch() {
        let branch = BranchId::new();
        let (service, _, _) = create_test_service(&[branch]);
        let boss = test_user(Role::Boss);
        let manager = service
            .create(&boss, account(Role::Manager, Some(branch)))
            .await
            .unwrap();

        let promoted = service
            .update(
                &boss,
                &manager.id,
                StaffUpdate {
                    role: Some(Role::Boss),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Boss);
        assert_eq!(promoted.branch_id, None);
    }

    #[tokio::test]
    async fn cannot_deactivate_self() {
        let (service, users, _) = create_test_service(&[]);
        let boss = users
            .create(&NewUser {
                email: "boss@studio.test".to_string(),
                phone: None,
                password_hash: String::new(),
                name: "Boss".to_string(),
                role: Role::Boss,
                branch_id: None,
            })
            .await
            .unwrap();

        let err = service
            .update(
                &boss,
                &boss.id,
                StaffUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}

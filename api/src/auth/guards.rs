//! Role and branch checks shared by services and handlers

use crate::domain::entities::{BranchId, Role, User};
use crate::error::AppError;

/// Fail unless the user has one of `roles`
pub fn require_role(user: &User, roles: &[Role]) -> Result<(), AppError> {
    if roles.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub fn require_staff(user: &User) -> Result<(), AppError> {
    if user.role.is_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Boss may manage every branch, a manager only their own
pub fn require_branch_access(user: &User, branch_id: &BranchId) -> Result<(), AppError> {
    if user.can_manage_branch(branch_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Branch filter forced on list endpoints: managers only see their branch
pub fn scoped_branch(
    user: &User,
    requested: Option<BranchId>,
) -> Result<Option<BranchId>, AppError> {
    match user.role {
        Role::Boss => Ok(requested),
        Role::Manager => {
            let own = user.branch_id.ok_or(AppError::Forbidden)?;
            match requested {
                Some(branch) if branch != own => Err(AppError::Forbidden),
                _ => Ok(Some(own)),
            }
        }
        _ => Err(AppError::Forbidden),
    }
}

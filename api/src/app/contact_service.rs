//! Contact form leads

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::app::audit_service::AuditService;
use crate::app::validation::{normalize_email, optional_text, required_text};
use crate::auth::require_staff;
use crate::domain::entities::{
    ArtistId, BranchId, Contact, ContactId, ContactStatus, NewContact, Role, User,
};
use crate::domain::ports::{AuditLogRepository, ContactRepository};
use crate::error::{AppError, DomainError};

#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub message: String,
    pub branch_id: Option<BranchId>,
    pub artist_id: Option<ArtistId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactUpdate {
    pub status: ContactStatus,
    pub admin_note: Option<String>,
}

pub struct ContactService<CR, AL>
where
    CR: ContactRepository,
    AL: AuditLogRepository,
{
    contacts: Arc<CR>,
    audit: Arc<AuditService<AL>>,
}

impl<CR, AL> ContactService<CR, AL>
where
    CR: ContactRepository,
    AL: AuditLogRepository,
{
    pub fn new(contacts: Arc<CR>, audit: Arc<AuditService<AL>>) -> Self {
        Self { contacts, audit }
    }

    /// Store a public contact form submission
    pub async fn submit(&self, form: ContactForm) -> Result<Contact, AppError> {
        let name = required_text("Name", &form.name, 100)?;
        let message = required_text("Message", &form.message, 5000)?;
        let phone = optional_text(form.phone.as_deref());
        let email = optional_text(form.email.as_deref())
            .map(|e| normalize_email(&e))
            .transpose()?;

        if phone.is_none() && email.is_none() {
            return Err(
                DomainError::Validation("Phone or email is required".to_string()).into(),
            );
        }

        let contact = self
            .contacts
            .create(&NewContact {
                name,
                phone,
                email,
                message,
                branch_id: form.branch_id,
                artist_id: form.artist_id,
            })
            .await?;

        tracing::info!(contact_id = %contact.id, "Contact request received");
        Ok(contact)
    }

    /// Contacts visible to a staff member; managers see their branch and unassigned leads
    pub async fn list(
        &self,
        actor: &User,
        status: Option<ContactStatus>,
    ) -> Result<Vec<Contact>, AppError> {
        require_staff(actor)?;
        let branch_id = match actor.role {
            Role::Boss => None,
            _ => Some(actor.branch_id.ok_or(AppError::Forbidden)?),
        };
        Ok(self.contacts.list(status, branch_id.as_ref()).await?)
    }

    pub async fn update_status(
        &self,
        actor: &User,
        id: &ContactId,
        update: ContactUpdate,
    ) -> Result<Contact, AppError> {
        require_staff(actor)?;
        let contact = self
            .contacts
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Contact {} not found", id)))?;

        let foreign = contact
            .branch_id
            .is_some_and(|b| actor.branch_id != Some(b));
        if actor.role != Role::Boss && foreign {
            return Err(AppError::Forbidden);
        }

        if contact.status != update.status && !contact.status.can_transition_to(update.status) {
            return Err(DomainError::Conflict(format!(
                "Contact cannot move from {} to {}",
                contact.status, update.status
            ))
            .into());
        }

        let updated = self
            .contacts
            .update_status(id, update.status, optional_text(update.admin_note.as_deref()))
            .await?;

        self.audit
            .record_by(
                actor,
                "contact.update",
                "contact",
                updated.id,
                json!({"from": contact.status, "to": updated.status}),
            )
            .await;
        Ok(updated)
    }
}

//! Appointment booking and lifecycle

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::app::audit_service::AuditService;
use crate::app::cart_service::CheckoutDraft;
use crate::app::notification_service::NotificationService;
use crate::app::validation::optional_text;
use crate::auth::scoped_branch;
use crate::domain::entities::{
    Appointment, AppointmentId, AppointmentQuery, AppointmentStatus, Artist, ArtistId, BranchId,
    Member, MemberId, NewAppointment, NotificationKind, Role, ServiceId, User,
};
use crate::domain::ports::{
    AppointmentRepository, ArtistRepository, AuditLogRepository, BranchRepository,
    MemberRepository, NotificationRepository,
};
use crate::error::{AppError, DomainError};

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    /// Required when staff book; members always book for themselves
    pub member_id: Option<MemberId>,
    pub artist_id: ArtistId,
    pub branch_id: BranchId,
    pub service_id: Option<ServiceId>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub notes: Option<String>,
    #[serde(skip)]
    pub cart_snapshot: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub branch_id: Option<BranchId>,
    pub artist_id: Option<ArtistId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RescheduleRequest {
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: AppointmentStatus,
    pub reason: Option<String>,
}

pub struct AppointmentService<APR, AR, BR, MR, NR, AL>
where
    APR: AppointmentRepository,
    AR: ArtistRepository,
    BR: BranchRepository,
    MR: MemberRepository,
    NR: NotificationRepository,
    AL: AuditLogRepository,
{
    appointments: Arc<APR>,
    artists: Arc<AR>,
    branches: Arc<BR>,
    members: Arc<MR>,
    notifications: Arc<NotificationService<NR>>,
    audit: Arc<AuditService<AL>>,
}

impl<APR, AR, BR, MR, NR, AL> AppointmentService<APR, AR, BR, MR, NR, AL>
where
    APR: AppointmentRepository,
    AR: ArtistRepository,
    BR: BranchRepository,
    MR: MemberRepository,
    NR: NotificationRepository,
    AL: AuditLogRepository,
{
    pub fn new(
        appointments: Arc<APR>,
        artists: Arc<AR>,
        branches: Arc<BR>,
        members: Arc<MR>,
        notifications: Arc<NotificationService<NR>>,
        audit: Arc<AuditService<AL>>,
    ) -> Self {
        Self {
            appointments,
            artists,
            branches,
            members,
            notifications,
            audit,
        }
    }

    pub async fn create(&self, actor: &User, req: BookingRequest) -> Result<Appointment, AppError> {
        let member = match actor.role {
            Role::Member => {
                let own = self.member_of(actor).await?;
                if req.member_id.is_some_and(|id| id != own.id) {
                    return Err(AppError::Forbidden);
                }
                own
            }
            _ => {
                let member_id = req.member_id.ok_or_else(|| {
                    AppError::BadRequest(
                        "member_id is required when booking for a member".to_string(),
                    )
                })?;
                self.member(&member_id).await?
            }
        };

        let artist = self.bookable_artist(&req.branch_id, &req.artist_id).await?;
        match actor.role {
            Role::Manager if actor.branch_id != Some(req.branch_id) => {
                return Err(AppError::Forbidden)
            }
            Role::Artist if artist.user_id != actor.id => return Err(AppError::Forbidden),
            _ => {}
        }

        check_window(req.start_at, req.end_at, Utc::now())?;
        self.ensure_free(&artist.id, req.start_at, req.end_at, None).await?;

        let appointment = self
            .appointments
            .create(&NewAppointment {
                member_id: member.id,
                artist_id: artist.id,
                branch_id: req.branch_id,
                service_id: req.service_id,
                cart_snapshot: req.cart_snapshot,
                start_at: req.start_at,
                end_at: req.end_at,
                notes: optional_text(req.notes.as_deref()),
                created_by: actor.id,
            })
            .await?;

        tracing::info!(
            appointment_id = %appointment.id,
            artist_id = %artist.id,
            start_at = %appointment.start_at,
            "Appointment booked"
        );

        let body = format!(
            "{} with {} on {}",
            member.name,
            artist.display_name,
            appointment.start_at.format("%Y-%m-%d %H:%M UTC")
        );
        self.notify_parties(
            &appointment,
            &member,
            &artist,
            NotificationKind::AppointmentCreated,
            "New appointment",
            &body,
        )
        .await;
        self.audit
            .record_by(
                actor,
                "appointment.create",
                "appointment",
                appointment.id,
                json!({
                    "member_id": member.id,
                    "artist_id": artist.id,
                    "start_at": appointment.start_at,
                    "end_at": appointment.end_at,
                }),
            )
            .await;

        Ok(appointment)
    }

    /// Book the appointment a cart checkout was priced for
    pub async fn create_from_checkout(
        &self,
        actor: &User,
        draft: &CheckoutDraft,
    ) -> Result<Appointment, AppError> {
        if actor.id != draft.user_id {
            return Err(AppError::Forbidden);
        }
        let member = self.member_of(actor).await?;

        self.create(
            actor,
            BookingRequest {
                member_id: Some(member.id),
                artist_id: draft.artist_id,
                branch_id: draft.branch_id,
                service_id: None,
                start_at: draft.start_at,
                end_at: draft.end_at,
                notes: draft.notes.clone(),
                cart_snapshot: Some(draft.snapshot.clone()),
            },
        )
        .await
    }

    /// Appointments visible to the caller
    pub async fn list(
        &self,
        actor: &User,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppError> {
        let mut query = AppointmentQuery {
            member_id: None,
            artist_id: filter.artist_id,
            branch_id: filter.branch_id,
            status: filter.status,
            from: filter.from,
            to: filter.to,
        };

        match actor.role {
            Role::Boss | Role::Manager => {
                query.branch_id = scoped_branch(actor, filter.branch_id)?;
            }
            Role::Artist => {
                let artist = self
                    .artists
                    .find_by_user_id(&actor.id)
                    .await?
                    .ok_or(AppError::Forbidden)?;
                query.artist_id = Some(artist.id);
            }
            Role::Member => {
                query.member_id = Some(self.member_of(actor).await?.id);
            }
        }

        Ok(self.appointments.list(&query).await?)
    }

    pub async fn get(&self, actor: &User, id: &AppointmentId) -> Result<Appointment, AppError> {
        let appointment = self.find(id).await?;
        self.authorize_view(actor, &appointment).await?;
        Ok(appointment)
    }

    /// Move an appointment or edit its notes while it is still pending or confirmed
    pub async fn reschedule(
        &self,
        actor: &User,
        id: &AppointmentId,
        req: RescheduleRequest,
    ) -> Result<Appointment, AppError> {
        if !actor.role.is_staff() {
            return Err(AppError::Forbidden);
        }
        let appointment = self.find(id).await?;
        self.authorize_view(actor, &appointment).await?;

        if !appointment.status.is_editable() {
            return Err(DomainError::Conflict(format!(
                "A {} appointment cannot be changed",
                appointment.status
            ))
            .into());
        }

        let start_at = req.start_at.unwrap_or(appointment.start_at);
        let end_at = req.end_at.unwrap_or(appointment.end_at);
        let moved = start_at != appointment.start_at || end_at != appointment.end_at;
        if moved {
            check_window(start_at, end_at, Utc::now())?;
            self.ensure_free(&appointment.artist_id, start_at, end_at, Some(&appointment.id))
                .await?;
        }

        let updated = self
            .appointments
            .reschedule(id, start_at, end_at, req.notes.map(|n| n.trim().to_string()))
            .await?;

        if moved {
            let (member, artist) = self.parties(&updated).await?;
            let body = format!(
                "Moved to {}",
                updated.start_at.format("%Y-%m-%d %H:%M UTC")
            );
            self.notify_parties(
                &updated,
                &member,
                &artist,
                NotificationKind::AppointmentRescheduled,
                "Appointment rescheduled",
                &body,
            )
            .await;
        }
        self.audit
            .record_by(
                actor,
                "appointment.update",
                "appointment",
                updated.id,
                json!({
                    "start_at": updated.start_at,
                    "end_at": updated.end_at,
                    "moved": moved,
                }),
            )
            .await;

        Ok(updated)
    }

    /// Apply a status transition; members may only cancel their own bookings
    pub async fn change_status(
        &self,
        actor: &User,
        id: &AppointmentId,
        change: StatusChange,
    ) -> Result<Appointment, AppError> {
        let appointment = self.find(id).await?;
        self.authorize_view(actor, &appointment).await?;

        if actor.role == Role::Member && change.status != AppointmentStatus::Canceled {
            return Err(AppError::Forbidden);
        }
        if !appointment.status.can_transition_to(change.status) {
            return Err(DomainError::Conflict(format!(
                "Appointment cannot move from {} to {}",
                appointment.status, change.status
            ))
            .into());
        }

        let updated = self.appointments.update_status(id, change.status).await?;
        tracing::info!(
            appointment_id = %updated.id,
            from = %appointment.status,
            to = %updated.status,
            "Appointment status changed"
        );

        let (member, artist) = self.parties(&updated).await?;
        let body = match optional_text(change.reason.as_deref()) {
            Some(reason) => format!("Now {}: {}", updated.status, reason),
            None => format!("Now {}", updated.status),
        };
        self.notify_parties(
            &updated,
            &member,
            &artist,
            NotificationKind::AppointmentStatusChanged,
            "Appointment updated",
            &body,
        )
        .await;
        self.audit
            .record_by(
                actor,
                "appointment.status",
                "appointment",
                updated.id,
                json!({
                    "from": appointment.status,
                    "to": updated.status,
                    "reason": change.reason,
                }),
            )
            .await;

        Ok(updated)
    }

    async fn find(&self, id: &AppointmentId) -> Result<Appointment, AppError> {
        self.appointments
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Appointment {} not found", id)).into())
    }

    async fn member(&self, id: &MemberId) -> Result<Member, AppError> {
        self.members
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Member {} not found", id)).into())
    }

    async fn member_of(&self, user: &User) -> Result<Member, AppError> {
        self.members
            .find_by_user_id(&user.id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound("No member profile for this account".to_string()).into()
            })
    }

    async fn parties(&self, appointment: &Appointment) -> Result<(Member, Artist), AppError> {
        let member = self.member(&appointment.member_id).await?;
        let artist = self
            .artists
            .find_by_id(&appointment.artist_id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!("Artist {} not found", appointment.artist_id))
            })?;
        Ok((member, artist))
    }

    /// Active artist working at an active branch
    async fn bookable_artist(
        &self,
        branch_id: &BranchId,
        artist_id: &ArtistId,
    ) -> Result<Artist, AppError> {
        match self.branches.find_by_id(branch_id).await? {
            Some(branch) if branch.is_active => {}
            _ => {
                return Err(DomainError::Validation(format!(
                    "Branch {} is not available",
                    branch_id
                ))
                .into())
            }
        }

        let artist = match self.artists.find_by_id(artist_id).await? {
            Some(artist) if artist.is_active => artist,
            _ => {
                return Err(DomainError::Validation(format!(
                    "Artist {} is not available",
                    artist_id
                ))
                .into())
            }
        };
        if artist.branch_id != *branch_id {
            return Err(DomainError::Validation(format!(
                "Artist {} does not work at branch {}",
                artist_id, branch_id
            ))
            .into());
        }
        Ok(artist)
    }

    async fn ensure_free(
        &self,
        artist_id: &ArtistId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude: Option<&AppointmentId>,
    ) -> Result<(), AppError> {
        let clashes = self
            .appointments
            .find_overlapping(artist_id, start_at, end_at, exclude)
            .await?;
        match clashes.first() {
            Some(clash) => Err(DomainError::Conflict(format!(
                "Artist is already booked from {} to {}",
                clash.start_at, clash.end_at
            ))
            .into()),
            None => Ok(()),
        }
    }

    async fn authorize_view(
        &self,
        actor: &User,
        appointment: &Appointment,
    ) -> Result<(), AppError> {
        let allowed = match actor.role {
            Role::Boss => true,
            Role::Manager => actor.can_manage_branch(&appointment.branch_id),
            Role::Artist => self
                .artists
                .find_by_user_id(&actor.id)
                .await?
                .is_some_and(|a| a.id == appointment.artist_id),
            Role::Member => self
                .members
                .find_by_user_id(&actor.id)
                .await?
                .is_some_and(|m| m.id == appointment.member_id),
        };
        if allowed {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    async fn notify_parties(
        &self,
        appointment: &Appointment,
        member: &Member,
        artist: &Artist,
        kind: NotificationKind,
        title: &str,
        body: &str,
    ) {
        let link = format!("/appointments/{}", appointment.id);
        for user_id in [member.user_id, artist.user_id] {
            self.notifications
                .notify(user_id, kind, title, body, Some(link.clone()))
                .await;
        }
    }
}

/// A booking window must be non-empty and not start in the past
fn check_window(
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if end_at <= start_at {
        return Err(DomainError::Validation("end_at must be after start_at".to_string()).into());
    }
    if start_at < now {
        return Err(DomainError::Validation(
            "Appointments cannot start in the past".to_string(),
        )
        .into());
    }
    Ok(())
}

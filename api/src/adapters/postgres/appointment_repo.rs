//! PostgreSQL adapter for AppointmentRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, RuntimeErr, Set,
};
use uuid::Uuid;

use super::{parse_or, utc};
use crate::domain::entities::{
    Appointment, AppointmentId, AppointmentQuery, AppointmentStatus, ArtistId, BranchId, MemberId,
    NewAppointment, ServiceId, UserId,
};
use crate::domain::ports::AppointmentRepository;
use crate::entity::appointments;
use crate::error::DomainError;

/// Statuses that no longer hold a time slot
const RELEASED_STATUSES: [AppointmentStatus; 2] =
    [AppointmentStatus::Canceled, AppointmentStatus::NoShow];

/// SQLSTATE raised by `appointments_artist_no_overlap`
const EXCLUSION_VIOLATION: &str = "23P01";

/// Map a write error, reporting a lost race for the artist's slot as a conflict
fn slot_error(err: DbErr) -> DomainError {
    let overlap = match &err {
        DbErr::Exec(RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(e)))
        | DbErr::Query(RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(e))) => {
            e.code().as_deref() == Some(EXCLUSION_VIOLATION)
        }
        _ => false,
    };

    if overlap {
        DomainError::Conflict("The artist is already booked at that time".to_string())
    } else {
        err.into()
    }
}

/// PostgreSQL implementation of AppointmentRepository
pub struct PostgresAppointmentRepository {
    db: DatabaseConnection,
}

impl PostgresAppointmentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn model(&self, id: &AppointmentId) -> Result<appointments::Model, DomainError> {
        appointments::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Appointment {} not found", id)))
    }
}

#[async_trait]
impl AppointmentRepository for PostgresAppointmentRepository {
    async fn find_by_id(&self, id: &AppointmentId) -> Result<Option<Appointment>, DomainError> {
        let result = appointments::Entity::find_by_id(id.0).one(&self.db).await?;
        Ok(result.map(|m| m.into()))
    }

    async fn create(&self, appointment: &NewAppointment) -> Result<Appointment, DomainError> {
        let now = Utc::now().fixed_offset();
        let model = appointments::ActiveModel {
            id: Set(Uuid::new_v4()),
            member_id: Set(appointment.member_id.0),
            artist_id: Set(appointment.artist_id.0),
            branch_id: Set(appointment.branch_id.0),
            service_id: Set(appointment.service_id.map(|s| s.0)),
            cart_snapshot: Set(appointment.cart_snapshot.clone()),
            start_at: Set(appointment.start_at.fixed_offset()),
            end_at: Set(appointment.end_at.fixed_offset()),
            status: Set(AppointmentStatus::Pending.to_string()),
            notes: Set(appointment.notes.clone()),
            created_by: Set(appointment.created_by.0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model.insert(&self.db).await.map_err(slot_error)?;
        Ok(result.into())
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DomainError> {
        let mut select = appointments::Entity::find().order_by_asc(appointments::Column::StartAt);

        if let Some(member_id) = query.member_id {
            select = select.filter(appointments::Column::MemberId.eq(member_id.0));
        }
        if let Some(artist_id) = query.artist_id {
            select = select.filter(appointments::Column::ArtistId.eq(artist_id.0));
        }
        if let Some(branch_id) = query.branch_id {
            select = select.filter(appointments::Column::BranchId.eq(branch_id.0));
        }
        if let Some(status) = query.status {
            select = select.filter(appointments::Column::Status.eq(status.to_string()));
        }
        if let Some(from) = query.from {
            select = select.filter(appointments::Column::StartAt.gte(from.fixed_offset()));
        }
        if let Some(to) = query.to {
            select = select.filter(appointments::Column::StartAt.lt(to.fixed_offset()));
        }

        let results = select.all(&self.db).await?;
        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn find_overlapping(
        &self,
        artist_id: &ArtistId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude: Option<&AppointmentId>,
    ) -> Result<Vec<Appointment>, DomainError> {
        let mut select = appointments::Entity::find()
            .filter(appointments::Column::ArtistId.eq(artist_id.0))
            .filter(appointments::Column::StartAt.lt(end_at.fixed_offset()))
            .filter(appointments::Column::EndAt.gt(start_at.fixed_offset()))
            .filter(
                appointments::Column::Status
                    .is_not_in(RELEASED_STATUSES.iter().map(|s| s.to_string())),
            );
        if let Some(exclude) = exclude {
            select = select.filter(appointments::Column::Id.ne(exclude.0));
        }

        let results = select.all(&self.db).await?;
        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn update_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, DomainError> {
        let mut model = self.model(id).await?.into_active_model();
        model.status = Set(status.to_string());
        model.updated_at = Set(Utc::now().fixed_offset());

        let result = model.update(&self.db).await.map_err(slot_error)?;
        Ok(result.into())
    }

    async fn reschedule(
        &self,
        id: &AppointmentId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Appointment, DomainError> {
        let mut model = self.model(id).await?.into_active_model();
        model.start_at = Set(start_at.fixed_offset());
        model.end_at = Set(end_at.fixed_offset());
        if notes.is_some() {
            model.notes = Set(notes);
        }
        model.updated_at = Set(Utc::now().fixed_offset());

        let result = model.update(&self.db).await.map_err(slot_error)?;
        Ok(result.into())
    }
}

impl From<appointments::Model> for Appointment {
    fn from(model: appointments::Model) -> Self {
        Appointment {
            id: AppointmentId(model.id),
            member_id: MemberId(model.member_id),
            artist_id: ArtistId(model.artist_id),
            branch_id: BranchId(model.branch_id),
            service_id: model.service_id.map(ServiceId),
            cart_snapshot: model.cart_snapshot,
            start_at: utc(model.start_at),
            end_at: utc(model.end_at),
            status: parse_or(&model.status, AppointmentStatus::Pending),
            notes: model.notes,
            created_by: UserId(model.created_by),
            created_at: utc(model.created_at),
            updated_at: utc(model.updated_at),
        }
    }
}

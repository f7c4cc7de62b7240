//! Appointment domain entity
//!
//! A scheduled tattoo session for one member with one artist at one branch.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::artist::ArtistId;
use super::branch::BranchId;
use super::macros::{entity_id, string_enum};
use super::member::MemberId;
use super::service::ServiceId;
use super::user::UserId;

entity_id!(
    /// Unique identifier for an appointment
    AppointmentId
);

string_enum!(
    /// Lifecycle of an appointment
    AppointmentStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        InProgress => "in_progress",
        Completed => "completed",
        Canceled => "canceled",
        NoShow => "no_show",
    }
);

impl AppointmentStatus {
    /// Statuses reachable from this one
    pub fn allowed_transitions(&self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Pending => &[Confirmed, Canceled],
            Confirmed => &[InProgress, Canceled, NoShow],
            InProgress => &[Completed],
            Completed | Canceled | NoShow => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Whether the appointment still holds the artist's time slot
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Canceled | AppointmentStatus::NoShow)
    }

    /// Whether time and notes may still be edited
    pub fn is_editable(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub member_id: MemberId,
    pub artist_id: ArtistId,
    pub branch_id: BranchId,
    pub service_id: Option<ServiceId>,
    /// Frozen copy of the cart the booking came from
    pub cart_snapshot: Option<serde_json::Value>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Half-open interval overlap; back-to-back sessions do not collide
    pub fn overlaps(&self, start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> bool {
        self.start_at < end_at && start_at < self.end_at
    }
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub member_id: MemberId,
    pub artist_id: ArtistId,
    pub branch_id: BranchId,
    pub service_id: Option<ServiceId>,
    pub cart_snapshot: Option<serde_json::Value>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_by: UserId,
}

/// Filter for appointment listings
#[derive(Debug, Clone, Default)]
pub struct AppointmentQuery {
    pub member_id: Option<MemberId>,
    pub artist_id: Option<ArtistId>,
    pub branch_id: Option<BranchId>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn transition_table() {
        use AppointmentStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Canceled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(Confirmed.can_transition_to(NoShow));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Canceled));
        for terminal in [Completed, Canceled, NoShow] {
            assert!(terminal.is_terminal());
            for next in AppointmentStatus::ALL {
                assert!(!terminal.can_transition_to(*next));
            }
        }
    }

    #[test]
    fn canceled_and_no_show_free_the_slot() {
        assert!(AppointmentStatus::Pending.occupies_slot());
        assert!(AppointmentStatus::Completed.occupies_slot());
        assert!(!AppointmentStatus::Canceled.occupies_slot());
        assert!(!AppointmentStatus::NoShow.occupies_slot());
    }

    #[test]
    fn status_strings() {
        assert_eq!(AppointmentStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            "no_show".parse::<AppointmentStatus>().unwrap(),
            AppointmentStatus::NoShow
        );
    }

    #[test]
    fn overlap_is_half_open() {
        let start = Utc::now();
        let appointment = Appointment {
            id: AppointmentId::new(),
            member_id: MemberId::new(),
            artist_id: ArtistId::new(),
            branch_id: BranchId::new(),
            service_id: None,
            cart_snapshot: None,
            start_at: start,
            end_at: start + Duration::hours(2),
            status: AppointmentStatus::Confirmed,
            notes: None,
            created_by: UserId::new(),
            created_at: start,
            updated_at: start,
        };

        assert!(appointment.overlaps(start + Duration::hours(1), start + Duration::hours(3)));
        assert!(appointment.overlaps(start - Duration::hours(1), start + Duration::minutes(1)));
        assert!(!appointment.overlaps(start + Duration::hours(2), start + Duration::hours(3)));
        assert!(!appointment.overlaps(start - Duration::hours(1), start));
    }
}

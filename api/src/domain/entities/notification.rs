//! Notification domain entity

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::macros::{entity_id, string_enum};
use super::user::UserId;

entity_id!(
    /// Unique identifier for a notification
    NotificationId
);

string_enum!(
    /// What a notification is about
    NotificationKind {
        AppointmentCreated => "appointment_created",
        AppointmentStatusChanged => "appointment_status_changed",
        AppointmentRescheduled => "appointment_rescheduled",
        PaymentReceived => "payment_received",
        BillIssued => "bill_issued",
        System => "system",
    }
);

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    /// Client route the notification points to
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

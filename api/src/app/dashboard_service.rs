//! Admin dashboard figures

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::app::billing_service::overdue_installments;
use crate::auth::{require_role, scoped_branch};
use crate::domain::entities::{
    Appointment, AppointmentQuery, AppointmentStatus, BillQuery, BranchId, Role, User,
};
use crate::domain::ports::{AppointmentRepository, BillingRepository, MemberRepository};
use crate::error::{AppError, DomainError};

const UPCOMING_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    pub branch_id: Option<BranchId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub branch_id: Option<BranchId>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Appointments starting in range, keyed by status
    pub appointments_by_status: BTreeMap<String, u64>,
    /// Payments received in range
    pub revenue: i64,
    /// Still owed on open bills
    pub outstanding: i64,
    pub new_members: u64,
    pub upcoming_appointments: Vec<Appointment>,
    pub overdue_installments: u64,
    pub overdue_amount: i64,
}

/// First instant of the month containing `now` and of the month after it
pub fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap_or(now.date_naive());
    let next = if now.month() == 12 {
        NaiveDate::from_ymd_opt(now.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(now.year(), now.month() + 1, 1)
    }
    .unwrap_or(first);

    let start = Utc.from_utc_datetime(&first.and_time(chrono::NaiveTime::MIN));
    let end = Utc.from_utc_datetime(&next.and_time(chrono::NaiveTime::MIN));
    (start, end)
}

pub struct DashboardService<APR, BLR, MR>
where
    APR: AppointmentRepository,
    BLR: BillingRepository,
    MR: MemberRepository,
{
    appointments: Arc<APR>,
    bills: Arc<BLR>,
    members: Arc<MR>,
}

impl<APR, BLR, MR> DashboardService<APR, BLR, MR>
where
    APR: AppointmentRepository,
    BLR: BillingRepository,
    MR: MemberRepository,
{
    pub fn new(appointments: Arc<APR>, bills: Arc<BLR>, members: Arc<MR>) -> Self {
        Self {
            appointments,
            bills,
            members,
        }
    }

    pub async fn summary(
        &self,
        actor: &User,
        query: DashboardQuery,
    ) -> Result<DashboardSummary, AppError> {
        require_role(actor, &[Role::Boss, Role::Manager])?;
        let branch_id = scoped_branch(actor, query.branch_id)?;

        let now = Utc::now();
        let (month_start, month_end) = month_bounds(now);
        let from = query.from.unwrap_or(month_start);
        let to = query.to.unwrap_or(month_end);
        if from >= to {
            return Err(DomainError::Validation("from must be before to".to_string()).into());
        }

        let in_range = self
            .appointments
            .list(&AppointmentQuery {
                branch_id,
                from: Some(from),
                to: Some(to),
                ..Default::default()
            })
            .await?;
        let mut appointments_by_status: BTreeMap<String, u64> = AppointmentStatus::ALL
            .iter()
            .map(|s| (s.to_string(), 0))
            .collect();
        for appointment in &in_range {
            *appointments_by_status
                .entry(appointment.status.to_string())
                .or_default() += 1;
        }

        let revenue = self
            .bills
            .payments_between(branch_id.as_ref(), from, to)
            .await?
            .iter()
            .map(|p| p.amount)
            .sum();

        let bills = self
            .bills
            .list(&BillQuery {
                branch_id,
                ..Default::default()
            })
            .await?;
        let outstanding = bills
            .iter()
            .filter(|b| b.is_open())
            .map(|b| b.outstanding())
            .sum();
        let overdue = overdue_installments(&bills, now.date_naive());

        let upcoming_appointments = self
            .appointments
            .list(&AppointmentQuery {
                branch_id,
                from: Some(now),
                to: Some(now + Duration::days(UPCOMING_DAYS)),
                ..Default::default()
            })
            .await?
            .into_iter()
            .filter(|a| a.status.is_editable())
            .collect();

        let new_members = self.members.count_created_between(from, to).await?;

        Ok(DashboardSummary {
            branch_id,
            from,
            to,
            appointments_by_status,
            revenue,
            outstanding,
            new_members,
            upcoming_appointments,
            overdue_installments: overdue.len() as u64,
            overdue_amount: overdue.iter().map(|o| o.outstanding).sum(),
        })
    }
}

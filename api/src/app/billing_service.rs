//! Bills, installment plans and payments

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::audit_service::AuditService;
use crate::app::notification_service::NotificationService;
use crate::app::validation::{optional_text, required_text};
use crate::auth::{require_branch_access, require_role, scoped_branch};
use crate::domain::entities::{
    plan_installments, points_for_payment, AppointmentId, AppointmentStatus, Bill, BillId,
    BillQuery, BranchId, Installment, Member, MemberId, MembershipLevel, NewBill, NewBillItem,
    NewPayment, NotificationKind, Payment, PaymentMethod, PaymentStatus, Role, User,
    MAX_INSTALLMENTS, MIN_INSTALLMENTS,
};
use crate::domain::ports::{
    AppointmentRepository, AuditLogRepository, BillSettlement, BillingRepository,
    MemberRepository, NotificationRepository,
};
use crate::error::{AppError, DomainError};

const MAX_LINE_QUANTITY: i32 = 100;
const MAX_INTERVAL_MONTHS: u32 = 6;

#[derive(Debug, Clone, Deserialize)]
pub struct BillLine {
    pub description: String,
    pub unit_price: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillRequest {
    /// Lines to bill; the appointment's cart snapshot is used when empty
    #[serde(default)]
    pub items: Vec<BillLine>,
    /// Explicit discount; the member's level discount applies when absent
    pub discount: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallmentRequest {
    pub count: u32,
    pub first_due_date: NaiveDate,
    #[serde(default = "default_interval")]
    pub interval_months: u32,
}

fn default_interval() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub amount: i64,
    pub method: PaymentMethod,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillFilter {
    pub status: Option<PaymentStatus>,
    pub branch_id: Option<BranchId>,
}

/// An installment past its due date with money still owed
#[derive(Debug, Clone, Serialize)]
pub struct OverdueInstallment {
    pub bill_id: BillId,
    pub member_id: MemberId,
    pub branch_id: BranchId,
    pub outstanding: i64,
    pub installment: Installment,
}

/// Overdue installments of open bills as of `today`
pub fn overdue_installments(bills: &[Bill], today: NaiveDate) -> Vec<OverdueInstallment> {
    bills
        .iter()
        .filter(|b| b.is_open())
        .flat_map(|bill| {
            bill.installments
                .iter()
                .filter(|i| i.is_overdue(today))
                .map(move |i| OverdueInstallment {
                    bill_id: bill.id,
                    member_id: bill.member_id,
                    branch_id: bill.branch_id,
                    outstanding: i.remaining(),
                    installment: i.clone(),
                })
        })
        .collect()
}

/// Cart snapshot line as written at checkout
#[derive(Debug, Deserialize)]
struct SnapshotLine {
    service_name: String,
    unit_price: i64,
    quantity: i32,
}

fn lines_from_snapshot(snapshot: &serde_json::Value) -> Vec<BillLine> {
    let lines: Vec<SnapshotLine> = snapshot
        .get("items")
        .cloned()
        .and_then(|items| serde_json::from_value(items).ok())
        .unwrap_or_default();
    lines
        .into_iter()
        .map(|l| BillLine {
            description: l.service_name,
            unit_price: l.unit_price,
            quantity: l.quantity,
        })
        .collect()
}

pub struct BillingService<BLR, APR, MR, NR, AL>
where
    BLR: BillingRepository,
    APR: AppointmentRepository,
    MR: MemberRepository,
    NR: NotificationRepository,
    AL: AuditLogRepository,
{
    bills: Arc<BLR>,
    appointments: Arc<APR>,
    members: Arc<MR>,
    notifications: Arc<NotificationService<NR>>,
    audit: Arc<AuditService<AL>>,
}

impl<BLR, APR, MR, NR, AL> BillingService<BLR, APR, MR, NR, AL>
where
    BLR: BillingRepository,
    APR: AppointmentRepository,
    MR: MemberRepository,
    NR: NotificationRepository,
    AL: AuditLogRepository,
{
    pub fn new(
        bills: Arc<BLR>,
        appointments: Arc<APR>,
        members: Arc<MR>,
        notifications: Arc<NotificationService<NR>>,
        audit: Arc<AuditService<AL>>,
    ) -> Self {
        Self {
            bills,
            appointments,
            members,
            notifications,
            audit,
        }
    }

    /// Raise the bill of an appointment
    pub async fn create_bill(
        &self,
        actor: &User,
        appointment_id: &AppointmentId,
        req: BillRequest,
    ) -> Result<Bill, AppError> {
        let appointment = self
            .appointments
            .find_by_id(appointment_id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!("Appointment {} not found", appointment_id))
            })?;
        require_branch_staff(actor, &appointment.branch_id)?;

        if matches!(
            appointment.status,
            AppointmentStatus::Canceled | AppointmentStatus::NoShow
        ) {
            return Err(DomainError::Conflict(format!(
                "A {} appointment cannot be billed",
                appointment.status
            ))
            .into());
        }
        if self.bills.find_by_appointment(&appointment.id).await?.is_some() {
            return Err(DomainError::AlreadyExists(format!(
                "Appointment {} is already billed",
                appointment.id
            ))
            .into());
        }

        let lines = match (req.items.is_empty(), &appointment.cart_snapshot) {
            (true, Some(snapshot)) => lines_from_snapshot(snapshot),
            _ => req.items,
        };
        if lines.is_empty() {
            return Err(AppError::BadRequest("A bill needs at least one item".to_string()));
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            if line.unit_price < 0 {
                return Err(DomainError::Validation(
                    "unit_price must not be negative".to_string(),
                )
                .into());
            }
            if !(1..=MAX_LINE_QUANTITY).contains(&line.quantity) {
                return Err(DomainError::Validation(format!(
                    "quantity must be between 1 and {}",
                    MAX_LINE_QUANTITY
                ))
                .into());
            }
            items.push(NewBillItem {
                description: required_text("Description", &line.description, 255)?,
                unit_price: line.unit_price,
                quantity: line.quantity,
            });
        }

        let subtotal: i64 = items.iter().map(NewBillItem::amount).sum();
        let member = self.member(&appointment.member_id).await?;
        let discount = match req.discount {
            Some(d) if d < 0 || d > subtotal => {
                return Err(DomainError::Validation(
                    "discount must be between 0 and the subtotal".to_string(),
                )
                .into())
            }
            Some(d) => d,
            None => member.level.discount_for(subtotal),
        };

        let bill = self
            .bills
            .create(&NewBill {
                appointment_id: appointment.id,
                member_id: member.id,
                branch_id: appointment.branch_id,
                items,
                subtotal,
                discount,
                final_amount: subtotal - discount,
            })
            .await?;

        tracing::info!(
            bill_id = %bill.id,
            appointment_id = %appointment.id,
            final_amount = bill.final_amount,
            "Bill created"
        );
        self.notifications
            .notify(
                member.user_id,
                NotificationKind::BillIssued,
                "New bill",
                format!("Amount due: {}", bill.final_amount),
                Some(format!("/bills/{}", bill.id)),
            )
            .await;
        self.audit
            .record_by(
                actor,
                "bill.create",
                "bill",
                bill.id,
                json!({
                    "appointment_id": appointment.id,
                    "subtotal": bill.subtotal,
                    "discount": bill.discount,
                    "final_amount": bill.final_amount,
                }),
            )
            .await;

        Ok(bill)
    }

    pub async fn get(&self, actor: &User, id: &BillId) -> Result<Bill, AppError> {
        let bill = self.find(id).await?;
        self.authorize_view(actor, &bill).await?;
        Ok(bill)
    }

    /// Staff bill listing, scoped to the caller's branch
    pub async fn list(&self, actor: &User, filter: BillFilter) -> Result<Vec<Bill>, AppError> {
        let branch_id = match actor.role {
            Role::Artist => Some(actor.branch_id.ok_or(AppError::Forbidden)?),
            _ => scoped_branch(actor, filter.branch_id)?,
        };
        Ok(self
            .bills
            .list(&BillQuery {
                member_id: None,
                branch_id,
                status: filter.status,
            })
            .await?)
    }

    pub async fn member_bills(&self, user: &User) -> Result<Vec<Bill>, AppError> {
        let member = self.member_of(user).await?;
        Ok(self
            .bills
            .list(&BillQuery {
                member_id: Some(member.id),
                ..Default::default()
            })
            .await?)
    }

    pub async fn payments(&self, actor: &User, id: &BillId) -> Result<Vec<Payment>, AppError> {
        let bill = self.get(actor, id).await?;
        Ok(self.bills.list_payments(&bill.id).await?)
    }

    /// Split an unpaid bill into installments
    pub async fn create_installments(
        &self,
        actor: &User,
        id: &BillId,
        req: InstallmentRequest,
    ) -> Result<Vec<Installment>, AppError> {
        require_role(actor, &[Role::Boss, Role::Manager])?;
        let bill = self.find(id).await?;
        require_branch_access(actor, &bill.branch_id)?;

        if !(MIN_INSTALLMENTS..=MAX_INSTALLMENTS).contains(&req.count) {
            return Err(DomainError::Validation(format!(
                "count must be between {} and {}",
                MIN_INSTALLMENTS, MAX_INSTALLMENTS
            ))
            .into());
        }
        if !(1..=MAX_INTERVAL_MONTHS).contains(&req.interval_months) {
            return Err(DomainError::Validation(format!(
                "interval_months must be between 1 and {}",
                MAX_INTERVAL_MONTHS
            ))
            .into());
        }
        if bill.status == PaymentStatus::Void {
            return Err(DomainError::Conflict("Bill is void".to_string()).into());
        }
        if !bill.installments.is_empty() {
            return Err(DomainError::Conflict(
                "Bill already has an installment plan".to_string(),
            )
            .into());
        }
        if bill.paid_amount > 0 || !self.bills.list_payments(&bill.id).await?.is_empty() {
            return Err(DomainError::Conflict(
                "Installments can only be planned before the first payment".to_string(),
            )
            .into());
        }
        if bill.final_amount < i64::from(req.count) {
            return Err(DomainError::Validation(
                "Bill total is too small to split".to_string(),
            )
            .into());
        }

        let plan = plan_installments(
            bill.final_amount,
            req.count,
            req.first_due_date,
            req.interval_months,
        )
        .ok_or_else(|| DomainError::Validation("Installment dates are out of range".to_string()))?;

        let installments = self.bills.create_installments(&bill.id, &plan).await?;

        tracing::info!(bill_id = %bill.id, count = req.count, "Installment plan created");
        self.audit
            .record_by(
                actor,
                "bill.installments",
                "bill",
                bill.id,
                json!({
                    "count": req.count,
                    "first_due_date": req.first_due_date,
                    "interval_months": req.interval_months,
                }),
            )
            .await;
        Ok(installments)
    }

    /// Record a payment, allocate it and update the member's loyalty
    pub async fn record_payment(
        &self,
        actor: &User,
        id: &BillId,
        req: PaymentRequest,
    ) -> Result<Payment, AppError> {
        let bill = self.find(id).await?;
        require_branch_staff(actor, &bill.branch_id)?;

        BillSettlement::for_payment(&bill, req.amount)?;

        let (payment, settlement) = self
            .bills
            .record_payment(&NewPayment {
                bill_id: bill.id,
                amount: req.amount,
                method: req.method,
                recorded_by: actor.id,
                note: optional_text(req.note.as_deref()),
            })
            .await?;

        tracing::info!(
            bill_id = %bill.id,
            payment_id = %payment.id,
            amount = payment.amount,
            status = %settlement.status,
            "Payment recorded"
        );

        self.credit_loyalty(&bill.member_id, payment.amount).await;

        self.audit
            .record_by(
                actor,
                "bill.payment",
                "bill",
                bill.id,
                json!({
                    "payment_id": payment.id,
                    "amount": payment.amount,
                    "method": payment.method,
                    "status": settlement.status,
                }),
            )
            .await;

        Ok(payment)
    }

    /// Cancel a bill that has not been paid at all
    pub async fn void(&self, actor: &User, id: &BillId) -> Result<Bill, AppError> {
        require_role(actor, &[Role::Boss])?;
        let mut bill = self.find(id).await?;

        if bill.status == PaymentStatus::Void {
            return Err(DomainError::Conflict("Bill is already void".to_string()).into());
        }
        if bill.paid_amount > 0 || !self.bills.list_payments(&bill.id).await?.is_empty() {
            return Err(DomainError::Conflict(
                "A bill with payments cannot be voided".to_string(),
            )
            .into());
        }

        self.bills.set_status(&bill.id, PaymentStatus::Void).await?;
        bill.status = PaymentStatus::Void;

        tracing::info!(bill_id = %bill.id, "Bill voided");
        self.audit
            .record_by(
                actor,
                "bill.void",
                "bill",
                bill.id,
                json!({"final_amount": bill.final_amount}),
            )
            .await;
        Ok(bill)
    }

    /// Overdue installments across the caller's bills
    pub async fn overdue(
        &self,
        actor: &User,
        branch_id: Option<BranchId>,
    ) -> Result<Vec<OverdueInstallment>, AppError> {
        let bills = self
            .list(
                actor,
                BillFilter {
                    status: None,
                    branch_id,
                },
            )
            .await?;
        Ok(overdue_installments(&bills, Utc::now().date_naive()))
    }

    async fn credit_loyalty(&self, member_id: &MemberId, amount: i64) {
        let member = match self
            .members
            .add_loyalty(member_id, points_for_payment(amount), amount)
            .await
        {
            Ok(member) => member,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    member_id = %member_id,
                    amount,
                    "Failed to credit loyalty"
                );
                return;
            }
        };
        let previous = MembershipLevel::from_total_spent(member.total_spent - amount);

        self.notifications
            .notify(
                member.user_id,
                NotificationKind::PaymentReceived,
                "Payment received",
                format!("We received {}. Points balance: {}", amount, member.points),
                None,
            )
            .await;
        if member.level != previous {
            self.notifications
                .notify(
                    member.user_id,
                    NotificationKind::System,
                    "Membership upgraded",
                    format!("You are now a {} member", member.level),
                    None,
                )
                .await;
        }
    }

    async fn find(&self, id: &BillId) -> Result<Bill, AppError> {
        self.bills
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Bill {} not found", id)).into())
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

    async fn authorize_view(&self, actor: &User, bill: &Bill) -> Result<(), AppError> {
        match actor.role {
            Role::Member => {
                let member = self.member_of(actor).await?;
                if member.id == bill.member_id {
                    Ok(())
                } else {
                    Err(AppError::Forbidden)
                }
            }
            _ => require_branch_staff(actor, &bill.branch_id),
        }
    }
}

/// Boss, or staff assigned to the branch
fn require_branch_staff(actor: &User, branch_id: &BranchId) -> Result<(), AppError> {
    match actor.role {
        Role::Boss => Ok(()),
        Role::Manager | Role::Artist if actor.branch_id.as_ref() == Some(branch_id) => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    use crate::app::member_service::{MemberService, PointsAdjustment};
    use crate::domain::entities::{Appointment, InstallmentId, PaymentType};
    use crate::test_utils::{
        test_appointment, test_member, test_user, InMemoryAppointmentRepository,
        InMemoryAuditLogRepository, InMemoryBillingRepository, InMemoryMemberRepository,
        InMemoryNotificationRepository,
    };

    type TestBilling = BillingService<
        InMemoryBillingRepository,
        InMemoryAppointmentRepository,
        InMemoryMemberRepository,
        InMemoryNotificationRepository,
        InMemoryAuditLogRepository,
    >;

    struct Fixture {
        service: TestBilling,
        members: Arc<InMemoryMemberRepository>,
        appointment: Appointment,
        member: Member,
        member_user: User,
        boss: User,
    }

    fn fixture_with(member: Member, member_user: User) -> Fixture {
        fixture_over(
            InMemoryBillingRepository::new(),
            InMemoryMemberRepository::new().with_member(member.clone()),
            member,
            member_user,
        )
    }

    fn fixture_over(
        bills: InMemoryBillingRepository,
        members: InMemoryMemberRepository,
        member: Member,
        member_user: User,
    ) -> Fixture {
        let appointment = test_appointment(member.id, BranchId::new());
        let members = Arc::new(members);
        let service = BillingService::new(
            Arc::new(bills),
            Arc::new(InMemoryAppointmentRepository::new().with_appointment(appointment.clone())),
            members.clone(),
            Arc::new(NotificationService::new(Arc::new(InMemoryNotificationRepository::new()))),
            Arc::new(AuditService::new(Arc::new(InMemoryAuditLogRepository::new()))),
        );
        Fixture {
            service,
            members,
            appointment,
            member,
            member_user,
            boss: test_user(Role::Boss),
        }
    }

    fn fixture() -> Fixture {
        let member_user = test_user(Role::Member);
        fixture_with(test_member(member_user.id), member_user)
    }

    fn lines(amounts: &[i64]) -> BillRequest {
        BillRequest {
            items: amounts
                .iter()
                .map(|a| BillLine {
                    description: "Session".to_string(),
                    unit_price: *a,
                    quantity: 1,
                })
                .collect(),
            discount: None,
        }
    }

    fn pay(amount: i64) -> PaymentRequest {
        PaymentRequest {
            amount,
            method: PaymentMethod::Card,
            note: None,
        }
    }

    async fn billed(f: &Fixture, amounts: &[i64]) -> Bill {
        f.service
            .create_bill(&f.boss, &f.appointment.id, lines(amounts))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn bill_totals_and_single_bill_per_appointment() {
        let f = fixture();
        let bill = billed(&f, &[6_000, 4_000]).await;

        assert_eq!(bill.subtotal, 10_000);
        assert_eq!(bill.discount, 0);
        assert_eq!(bill.final_amount, 10_000);
        assert_eq!(bill.status, PaymentStatus::Unpaid);

        let err = f
            .service
            .create_bill(&f.boss, &f.appointment.id, lines(&[100]))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn level_discount_applies_without_explicit_discount() {
        let member_user = test_user(Role::Member);
        let mut member = test_member(member_user.id);
        member.level = MembershipLevel::Gold;
        member.total_spent = 60_000;
        let f = fixture_with(member, member_user);

        let bill = billed(&f, &[10_000]).await;
        assert_eq!(bill.discount, 800);
        assert_eq!(bill.final_amount, 9_200);
    }

    #[tokio::test]
    async fn discount_cannot_exceed_subtotal() {
        let f = fixture();
        let mut req = lines(&[1_000]);
        req.discount = Some(1_001);

        let err = f
            .service
            .create_bill(&f.boss, &f.appointment.id, req)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn installments_sum_to_final_amount() {
        let f = fixture();
        let bill = billed(&f, &[10_000]).await;

        let installments = f
            .service
            .create_installments(
                &f.boss,
                &bill.id,
                InstallmentRequest {
                    count: 3,
                    first_due_date: NaiveDate::from_ymd_opt(2030, 1, 31).unwrap(),
                    interval_months: 1,
                },
            )
            .await
            .unwrap();

        assert_eq!(installments.len(), 3);
        assert_eq!(installments.iter().map(|i| i.amount).sum::<i64>(), 10_000);
        assert_eq!(installments[0].amount, 3_334);

        let bill = f.service.get(&f.boss, &bill.id).await.unwrap();
        assert_eq!(bill.payment_type, PaymentType::Installment);
    }

    #[tokio::test]
    async fn installment_count_is_bounded() {
        let f = fixture();
        let bill = billed(&f, &[10_000]).await;

        for count in [1, 13] {
            let err = f
                .service
                .create_installments(
                    &f.boss,
                    &bill.id,
                    InstallmentRequest {
                        count,
                        first_due_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                        interval_months: 1,
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn payments_fill_installments_in_order() {
        let f = fixture();
        let bill = billed(&f, &[9_000]).await;
        f.service
            .create_installments(
                &f.boss,
                &bill.id,
                InstallmentRequest {
                    count: 3,
                    first_due_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                    interval_months: 1,
                },
            )
            .await
            .unwrap();

        let payment = f.service.record_payment(&f.boss, &bill.id, pay(4_000)).await.unwrap();
        assert_eq!(payment.allocations.len(), 2);
        assert_eq!(payment.allocations[0].amount, 3_000);
        assert_eq!(payment.allocations[1].amount, 1_000);

        let bill = f.service.get(&f.boss, &bill.id).await.unwrap();
        assert_eq!(bill.paid_amount, 4_000);
        assert_eq!(bill.status, PaymentStatus::PartiallyPaid);
        assert_eq!(bill.installments[0].status, PaymentStatus::Paid);
        assert_eq!(bill.installments[1].status, PaymentStatus::PartiallyPaid);
        assert_eq!(bill.installments[2].status, PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn overpayment_is_rejected() {
        let f = fixture();
        let bill = billed(&f, &[5_000]).await;

        let err = f
            .service
            .record_payment(&f.boss, &bill.id, pay(5_001))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        f.service.record_payment(&f.boss, &bill.id, pay(5_000)).await.unwrap();
        let err = f
            .service
            .record_payment(&f.boss, &bill.id, pay(1))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn concurrent_payments_cannot_overpay() {
        let member_user = test_user(Role::Member);
        let member = test_member(member_user.id);
        let f = fixture_over(
            InMemoryBillingRepository::new().with_yielding_reads(),
            InMemoryMemberRepository::new().with_member(member.clone()),
            member,
            member_user,
        );
        let bill = billed(&f, &[5_000]).await;

        let (a, b) = tokio::join!(
            f.service.record_payment(&f.boss, &bill.id, pay(3_000)),
            f.service.record_payment(&f.boss, &bill.id, pay(3_000)),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let rejected = a.err().or(b.err()).unwrap();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let bill = f.service.get(&f.boss, &bill.id).await.unwrap();
        let payments = f.service.payments(&f.boss, &bill.id).await.unwrap();
        let paid: i64 = payments.iter().map(|p| p.amount).sum();
        assert_eq!(paid, 3_000);
        assert_eq!(bill.paid_amount, paid);
        assert!(bill.paid_amount <= bill.final_amount);
    }

    #[tokio::test]
    async fn payment_and_points_adjustment_both_land() {
        let member_user = test_user(Role::Member);
        let mut member = test_member(member_user.id);
        member.points = 100;
        let f = fixture_over(
            InMemoryBillingRepository::new(),
            InMemoryMemberRepository::new()
                .with_member(member.clone())
                .with_yielding_reads(),
            member,
            member_user,
        );
        let members = MemberService::new(
            f.members.clone(),
            Arc::new(AuditService::new(Arc::new(InMemoryAuditLogRepository::new()))),
        );
        let bill = billed(&f, &[25_000]).await;

        let (paid, adjusted) = tokio::join!(
            f.service.record_payment(&f.boss, &bill.id, pay(25_000)),
            members.adjust_points(
                &f.boss,
                &f.member.id,
                PointsAdjustment {
                    delta: -40,
                    reason: "merch redemption".to_string(),
                },
            ),
        );
        paid.unwrap();
        adjusted.unwrap();

        let member = f.members.find_by_id(&f.member.id).await.unwrap().unwrap();
        assert_eq!(member.points, 100 + 250 - 40);
        assert_eq!(member.total_spent, 25_000);
        assert_eq!(member.level, MembershipLevel::Silver);
    }

    #[tokio::test]
    async fn payment_accrues_loyalty() {
        let f = fixture();
        let bill = billed(&f, &[25_000]).await;

        f.service.record_payment(&f.boss, &bill.id, pay(25_000)).await.unwrap();

        let member = f.members.find_by_id(&f.member.id).await.unwrap().unwrap();
        assert_eq!(member.points, 250);
        assert_eq!(member.total_spent, 25_000);
        assert_eq!(member.level, MembershipLevel::Silver);
    }

    #[tokio::test]
    async fn void_only_without_payments() {
        let f = fixture();
        let bill = billed(&f, &[5_000]).await;
        f.service.record_payment(&f.boss, &bill.id, pay(100)).await.unwrap();

        let err = f.service.void(&f.boss, &bill.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(
            f.service
                .void(&test_user(Role::Manager), &bill.id)
                .await
                .unwrap_err()
                .status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn members_see_only_their_bills() {
        let f = fixture();
        let bill = billed(&f, &[5_000]).await;

        assert!(f.service.get(&f.member_user, &bill.id).await.is_ok());
        assert_eq!(f.service.member_bills(&f.member_user).await.unwrap().len(), 1);

        let stranger = test_user(Role::Member);
        assert!(f.service.get(&stranger, &bill.id).await.is_err());
    }

    #[test]
    fn overdue_lists_past_due_remainders() {
        let bill_id = BillId::new();
        let installment = |sequence, paid_amount, day| Installment {
            id: InstallmentId::new(),
            bill_id,
            sequence,
            due_date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            amount: 1_000,
            paid_amount,
            status: PaymentStatus::from_amounts(paid_amount, 1_000),
        };
        let now = Utc::now();
        let bill = Bill {
            id: bill_id,
            appointment_id: AppointmentId::new(),
            member_id: MemberId::new(),
            branch_id: BranchId::new(),
            subtotal: 3_000,
            discount: 0,
            final_amount: 3_000,
            paid_amount: 1_300,
            status: PaymentStatus::PartiallyPaid,
            payment_type: PaymentType::Installment,
            items: vec![],
            installments: vec![
                installment(1, 1_000, 1),
                installment(2, 300, 10),
                installment(3, 0, 20),
            ],
            created_at: now,
            updated_at: now,
        };

        let overdue = overdue_installments(&[bill], NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].installment.sequence, 2);
        assert_eq!(overdue[0].outstanding, 700);
    }
}

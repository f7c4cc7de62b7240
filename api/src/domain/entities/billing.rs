//! Billing domain entities
//!
//! A bill is raised for an appointment. It may be paid in full or split into
//! installments; payments are allocated onto installments in sequence order.

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::Serialize;

use super::appointment::AppointmentId;
use super::branch::BranchId;
use super::macros::{entity_id, string_enum};
use super::member::MemberId;
use super::user::UserId;

entity_id!(
    /// Unique identifier for a bill
    BillId
);

entity_id!(
    /// Unique identifier for a bill line
    BillItemId
);

entity_id!(
    /// Unique identifier for an installment
    InstallmentId
);

entity_id!(
    /// Unique identifier for a payment
    PaymentId
);

string_enum!(
    /// Settlement state of a bill or installment
    PaymentStatus {
        Unpaid => "unpaid",
        PartiallyPaid => "partially_paid",
        Paid => "paid",
        Void => "void",
    }
);

string_enum!(
    /// How a bill is settled
    PaymentType {
        Full => "full",
        Installment => "installment",
    }
);

string_enum!(
    /// Tender used for a payment
    PaymentMethod {
        Cash => "cash",
        Card => "card",
        Transfer => "transfer",
        Other => "other",
    }
);

/// Smallest installment plan
pub const MIN_INSTALLMENTS: u32 = 2;
/// Largest installment plan
pub const MAX_INSTALLMENTS: u32 = 12;

impl PaymentStatus {
    /// Status for an amount paid against an amount due
    pub fn from_amounts(paid: i64, due: i64) -> Self {
        if due <= 0 || paid >= due {
            PaymentStatus::Paid
        } else if paid <= 0 {
            PaymentStatus::Unpaid
        } else {
            PaymentStatus::PartiallyPaid
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Bill {
    pub id: BillId,
    pub appointment_id: AppointmentId,
    pub member_id: MemberId,
    pub branch_id: BranchId,
    pub subtotal: i64,
    pub discount: i64,
    pub final_amount: i64,
    pub paid_amount: i64,
    pub status: PaymentStatus,
    pub payment_type: PaymentType,
    pub items: Vec<BillItem>,
    pub installments: Vec<Installment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    pub fn outstanding(&self) -> i64 {
        (self.final_amount - self.paid_amount).max(0)
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            PaymentStatus::Unpaid | PaymentStatus::PartiallyPaid
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BillItem {
    pub id: BillItemId,
    pub description: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct NewBillItem {
    pub description: String,
    pub unit_price: i64,
    pub quantity: i32,
}

impl NewBillItem {
    pub fn amount(&self) -> i64 {
        self.unit_price * i64::from(self.quantity)
    }
}

#[derive(Debug, Clone)]
pub struct NewBill {
    pub appointment_id: AppointmentId,
    pub member_id: MemberId,
    pub branch_id: BranchId,
    pub items: Vec<NewBillItem>,
    pub subtotal: i64,
    pub discount: i64,
    pub final_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub bill_id: BillId,
    pub sequence: i32,
    pub due_date: NaiveDate,
    pub amount: i64,
    pub paid_amount: i64,
    pub status: PaymentStatus,
}

impl Installment {
    pub fn remaining(&self) -> i64 {
        (self.amount - self.paid_amount).max(0)
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.remaining() > 0 && self.due_date < today
    }
}

/// Planned installment before it is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedInstallment {
    pub sequence: i32,
    pub due_date: NaiveDate,
    pub amount: i64,
}

/// Split a bill total into equal installments
///
/// Each installment gets `total / count`; the remainder goes to the first one
/// so the plan always sums to `total`.
pub fn plan_installments(
    total: i64,
    count: u32,
    first_due_date: NaiveDate,
    interval_months: u32,
) -> Option<Vec<PlannedInstallment>> {
    if count == 0 || total < 0 {
        return None;
    }

    let base = total / i64::from(count);
    let remainder = total - base * i64::from(count);

    (0..count)
        .map(|i| {
            let due_date = first_due_date.checked_add_months(Months::new(i * interval_months))?;
            let amount = if i == 0 { base + remainder } else { base };
            Some(PlannedInstallment {
                sequence: i as i32 + 1,
                due_date,
                amount,
            })
        })
        .collect()
}

/// Allocate a payment onto installments in sequence order
///
/// Returns `(installment, amount)` pairs. Any amount beyond the combined
/// remainders is left unallocated.
pub fn allocate_payment(installments: &[Installment], amount: i64) -> Vec<(InstallmentId, i64)> {
    let mut ordered: Vec<&Installment> = installments.iter().collect();
    ordered.sort_by_key(|i| i.sequence);

    let mut left = amount;
    let mut allocations = Vec::new();
    for installment in ordered {
        if left <= 0 {
            break;
        }
        let take = installment.remaining().min(left);
        if take > 0 {
            allocations.push((installment.id, take));
            left -= take;
        }
    }
    allocations
}

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub bill_id: BillId,
    pub amount: i64,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
    pub recorded_by: UserId,
    pub note: Option<String>,
    pub allocations: Vec<PaymentAllocation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentAllocation {
    pub installment_id: InstallmentId,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub bill_id: BillId,
    pub amount: i64,
    pub method: PaymentMethod,
    pub recorded_by: UserId,
    pub note: Option<String>,
}

/// Filter for bill listings
#[derive(Debug, Clone, Default)]
pub struct BillQuery {
    pub member_id: Option<MemberId>,
    pub branch_id: Option<BranchId>,
    pub status: Option<PaymentStatus>,
}

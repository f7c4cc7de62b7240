//! PostgreSQL adapter for BillingRepository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use super::{parse_or, utc};
use crate::domain::entities::{
    AppointmentId, Bill, BillId, BillItem, BillItemId, BillQuery, BranchId, Installment,
    InstallmentId, MemberId, NewBill, NewPayment, Payment, PaymentAllocation, PaymentId,
    PaymentMethod, PaymentStatus, PaymentType, PlannedInstallment, UserId,
};
use crate::domain::ports::{BillSettlement, BillingRepository};
use crate::entity::{appointment_bills, bill_items, installments, payment_allocations, payments};
use crate::error::DomainError;

/// PostgreSQL implementation of BillingRepository
pub struct PostgresBillingRepository {
    db: DatabaseConnection,
}

impl PostgresBillingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Load payments together with their allocations
    async fn with_allocations(
        &self,
        models: Vec<payments::Model>,
    ) -> Result<Vec<Payment>, DomainError> {
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let allocations = payment_allocations::Entity::find()
            .filter(payment_allocations::Column::PaymentId.is_in(ids))
            .all(&self.db)
            .await?;

        let mut by_payment: HashMap<Uuid, Vec<PaymentAllocation>> = HashMap::new();
        for allocation in allocations {
            by_payment
                .entry(allocation.payment_id)
                .or_default()
                .push(PaymentAllocation {
                    installment_id: InstallmentId(allocation.installment_id),
                    amount: allocation.amount,
                });
        }

        Ok(models
            .into_iter()
            .map(|m| {
                let allocations = by_payment.remove(&m.id).unwrap_or_default();
                payment_from_model(m, allocations)
            })
            .collect())
    }
}

/// Attach items and installments to a bill row
async fn hydrate<C: ConnectionTrait>(
    db: &C,
    model: appointment_bills::Model,
) -> Result<Bill, DomainError> {
    let items = bill_items::Entity::find()
        .filter(bill_items::Column::BillId.eq(model.id))
        .all(db)
        .await?;

    let installments = installments::Entity::find()
        .filter(installments::Column::BillId.eq(model.id))
        .order_by_asc(installments::Column::Sequence)
        .all(db)
        .await?;

    Ok(bill_from_model(
        model,
        items.into_iter().map(|m| m.into()).collect(),
        installments.into_iter().map(|m| m.into()).collect(),
    ))
}

#[async_trait]
impl BillingRepository for PostgresBillingRepository {
    async fn find_by_id(&self, id: &BillId) -> Result<Option<Bill>, DomainError> {
        match appointment_bills::Entity::find_by_id(id.0).one(&self.db).await? {
            Some(model) => Ok(Some(hydrate(&self.db, model).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Option<Bill>, DomainError> {
        let result = appointment_bills::Entity::find()
            .filter(appointment_bills::Column::AppointmentId.eq(appointment_id.0))
            .one(&self.db)
            .await?;

        match result {
            Some(model) => Ok(Some(hydrate(&self.db, model).await?)),
            None => Ok(None),
        }
    }

    async fn create(&self, bill: &NewBill) -> Result<Bill, DomainError> {
        let now = Utc::now().fixed_offset();
        let bill_id = Uuid::new_v4();
        let txn = self.db.begin().await?;

        let model = appointment_bills::ActiveModel {
            id: Set(bill_id),
            appointment_id: Set(bill.appointment_id.0),
            member_id: Set(bill.member_id.0),
            branch_id: Set(bill.branch_id.0),
            subtotal: Set(bill.subtotal),
            discount: Set(bill.discount),
            final_amount: Set(bill.final_amount),
            paid_amount: Set(0),
            status: Set(PaymentStatus::from_amounts(0, bill.final_amount).to_string()),
            payment_type: Set(PaymentType::Full.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let saved = model.insert(&txn).await?;

        let mut items = Vec::with_capacity(bill.items.len());
        for item in &bill.items {
            let row = bill_items::ActiveModel {
                id: Set(Uuid::new_v4()),
                bill_id: Set(bill_id),
                description: Set(item.description.clone()),
                unit_price: Set(item.unit_price),
                quantity: Set(item.quantity),
                amount: Set(item.amount()),
            };
            items.push(row.insert(&txn).await?.into());
        }

        txn.commit().await?;
        Ok(bill_from_model(saved, items, Vec::new()))
    }

    async fn list(&self, query: &BillQuery) -> Result<Vec<Bill>, DomainError> {
        let mut select =
            appointment_bills::Entity::find().order_by_desc(appointment_bills::Column::CreatedAt);

        if let Some(member_id) = query.member_id {
            select = select.filter(appointment_bills::Column::MemberId.eq(member_id.0));
        }
        if let Some(branch_id) = query.branch_id {
            select = select.filter(appointment_bills::Column::BranchId.eq(branch_id.0));
        }
        if let Some(status) = query.status {
            select = select.filter(appointment_bills::Column::Status.eq(status.to_string()));
        }

        let models = select.all(&self.db).await?;
        let mut bills = Vec::with_capacity(models.len());
        for model in models {
            bills.push(hydrate(&self.db, model).await?);
        }
        Ok(bills)
    }

    async fn create_installments(
        &self,
        bill_id: &BillId,
        plan: &[PlannedInstallment],
    ) -> Result<Vec<Installment>, DomainError> {
        let txn = self.db.begin().await?;

        let updated = appointment_bills::Entity::update_many()
            .col_expr(
                appointment_bills::Column::PaymentType,
                Expr::value(PaymentType::Installment.to_string()),
            )
            .col_expr(
                appointment_bills::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(appointment_bills::Column::Id.eq(bill_id.0))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(DomainError::NotFound(format!("Bill {} not found", bill_id)));
        }

        let mut created = Vec::with_capacity(plan.len());
        for planned in plan {
            let row = installments::ActiveModel {
                id: Set(Uuid::new_v4()),
                bill_id: Set(bill_id.0),
                sequence: Set(planned.sequence),
                due_date: Set(planned.due_date),
                amount: Set(planned.amount),
                paid_amount: Set(0),
                status: Set(PaymentStatus::Unpaid.to_string()),
            };
            created.push(row.insert(&txn).await?.into());
        }

        txn.commit().await?;
        Ok(created)
    }

    async fn record_payment(
        &self,
        payment: &NewPayment,
    ) -> Result<(Payment, BillSettlement), DomainError> {
        let txn = self.db.begin().await?;

        let locked = appointment_bills::Entity::find_by_id(payment.bill_id.0)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!("Bill {} not found", payment.bill_id))
            })?;
        let bill = hydrate(&txn, locked).await?;
        let settlement = BillSettlement::for_payment(&bill, payment.amount)?;

        let now = Utc::now().fixed_offset();
        let payment_id = Uuid::new_v4();
        let model = payments::ActiveModel {
            id: Set(payment_id),
            bill_id: Set(payment.bill_id.0),
            amount: Set(payment.amount),
            method: Set(payment.method.to_string()),
            paid_at: Set(now),
            recorded_by: Set(payment.recorded_by.0),
            note: Set(payment.note.clone()),
        };
        let saved = model.insert(&txn).await?;

        for allocation in &settlement.allocations {
            payment_allocations::ActiveModel {
                id: Set(Uuid::new_v4()),
                payment_id: Set(payment_id),
                installment_id: Set(allocation.installment_id.0),
                amount: Set(allocation.amount),
            }
            .insert(&txn)
            .await?;
        }

        for installment in &settlement.installments {
            installments::Entity::update_many()
                .col_expr(
                    installments::Column::PaidAmount,
                    Expr::value(installment.paid_amount),
                )
                .col_expr(
                    installments::Column::Status,
                    Expr::value(installment.status.to_string()),
                )
                .filter(installments::Column::Id.eq(installment.installment_id.0))
                .filter(installments::Column::BillId.eq(payment.bill_id.0))
                .exec(&txn)
                .await?;
        }

        appointment_bills::Entity::update_many()
            .col_expr(
                appointment_bills::Column::PaidAmount,
                Expr::value(settlement.paid_amount),
            )
            .col_expr(
                appointment_bills::Column::Status,
                Expr::value(settlement.status.to_string()),
            )
            .col_expr(appointment_bills::Column::UpdatedAt, Expr::value(now))
            .filter(appointment_bills::Column::Id.eq(payment.bill_id.0))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        let recorded = payment_from_model(saved, settlement.allocations.clone());
        Ok((recorded, settlement))
    }

    async fn list_payments(&self, bill_id: &BillId) -> Result<Vec<Payment>, DomainError> {
        let models = payments::Entity::find()
            .filter(payments::Column::BillId.eq(bill_id.0))
            .order_by_asc(payments::Column::PaidAt)
            .all(&self.db)
            .await?;

        self.with_allocations(models).await
    }

    async fn payments_between(
        &self,
        branch_id: Option<&BranchId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Payment>, DomainError> {
        let mut select = payments::Entity::find()
            .filter(payments::Column::PaidAt.gte(from.fixed_offset()))
            .filter(payments::Column::PaidAt.lt(to.fixed_offset()))
            .order_by_asc(payments::Column::PaidAt);

        if let Some(branch_id) = branch_id {
            let bill_ids: Vec<Uuid> = appointment_bills::Entity::find()
                .select_only()
                .column(appointment_bills::Column::Id)
                .filter(appointment_bills::Column::BranchId.eq(branch_id.0))
                .into_tuple()
                .all(&self.db)
                .await?;
            if bill_ids.is_empty() {
                return Ok(Vec::new());
            }
            select = select.filter(payments::Column::BillId.is_in(bill_ids));
        }

        let models = select.all(&self.db).await?;
        self.with_allocations(models).await
    }

    async fn set_status(&self, id: &BillId, status: PaymentStatus) -> Result<(), DomainError> {
        let updated = appointment_bills::Entity::update_many()
            .col_expr(appointment_bills::Column::Status, Expr::value(status.to_string()))
            .col_expr(
                appointment_bills::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(appointment_bills::Column::Id.eq(id.0))
            .exec(&self.db)
            .await?;

        if updated.rows_affected == 0 {
            return Err(DomainError::NotFound(format!("Bill {} not found", id)));
        }
        Ok(())
    }
}

fn bill_from_model(
    model: appointment_bills::Model,
    items: Vec<BillItem>,
    installments: Vec<Installment>,
) -> Bill {
    Bill {
        id: BillId(model.id),
        appointment_id: AppointmentId(model.appointment_id),
        member_id: MemberId(model.member_id),
        branch_id: BranchId(model.branch_id),
        subtotal: model.subtotal,
        discount: model.discount,
        final_amount: model.final_amount,
        paid_amount: model.paid_amount,
        status: parse_or(&model.status, PaymentStatus::Unpaid),
        payment_type: parse_or(&model.payment_type, PaymentType::Full),
        items,
        installments,
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
    }
}

fn payment_from_model(model: payments::Model, allocations: Vec<PaymentAllocation>) -> Payment {
    Payment {
        id: PaymentId(model.id),
        bill_id: BillId(model.bill_id),
        amount: model.amount,
        method: parse_or(&model.method, PaymentMethod::Other),
        paid_at: utc(model.paid_at),
        recorded_by: UserId(model.recorded_by),
        note: model.note,
        allocations,
    }
}

impl From<bill_items::Model> for BillItem {
    fn from(model: bill_items::Model) -> Self {
        BillItem {
            id: BillItemId(model.id),
            description: model.description,
            unit_price: model.unit_price,
            quantity: model.quantity,
            amount: model.amount,
        }
    }
}

impl From<installments::Model> for Installment {
    fn from(model: installments::Model) -> Self {
        Installment {
            id: InstallmentId(model.id),
            bill_id: BillId(model.bill_id),
            sequence: model.sequence,
            due_date: model.due_date,
            amount: model.amount,
            paid_amount: model.paid_amount,
            status: parse_or(&model.status, PaymentStatus::Unpaid),
        }
    }
}

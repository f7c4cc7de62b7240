//! Repository port traits
//!
//! These traits define the interface for data persistence.
//! Implementations are provided by adapters (e.g., PostgreSQL).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::{
    allocate_payment, Appointment, AppointmentId, AppointmentQuery, AppointmentStatus, Artist,
    ArtistChanges, ArtistId, AuditLog, AuditLogQuery, Bill, BillId, BillQuery, Branch,
    BranchChanges, BranchId, Cart, CartId, CartItem, CartItemId, CartOwner, Contact, ContactId,
    ContactStatus, Installment, InstallmentId, Member, MemberChanges, MemberId, MemberQuery,
    NewAppointment, NewArtist, NewAuditLog, NewBill, NewBranch, NewCartItem, NewContact, NewMember,
    NewNotification, NewPayment, NewPortfolioItem, NewService, NewServiceVariant, NewUser,
    Notification, NotificationId, Payment, PaymentAllocation, PaymentStatus, PaymentType,
    PlannedInstallment, PortfolioChanges, PortfolioItem, PortfolioItemId, Service, ServiceChanges,
    ServiceId, ServiceVariant, User, UserChanges, UserId, VariantChanges, VariantId,
};
use crate::error::DomainError;

/// Repository for User entities
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    /// Find a user by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, DomainError>;

    async fn create(&self, user: &NewUser) -> Result<User, DomainError>;

    async fn update(&self, id: &UserId, changes: &UserChanges) -> Result<User, DomainError>;

    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), DomainError>;

    /// Update the last login timestamp
    async fn touch_last_login(&self, id: &UserId) -> Result<(), DomainError>;

    /// List users, optionally restricted to one branch
    async fn list(&self, branch_id: Option<&BranchId>) -> Result<Vec<User>, DomainError>;
}

/// Repository for Branch entities
#[async_trait]
pub trait BranchRepository: Send + Sync {
    async fn find_by_id(&self, id: &BranchId) -> Result<Option<Branch>, DomainError>;

    async fn list(&self, include_inactive: bool) -> Result<Vec<Branch>, DomainError>;

    async fn create(&self, branch: &NewBranch) -> Result<Branch, DomainError>;

    async fn update(&self, id: &BranchId, changes: &BranchChanges)
        -> Result<Branch, DomainError>;
}

/// Repository for the service catalog
#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn find_by_id(&self, id: &ServiceId) -> Result<Option<Service>, DomainError>;

    /// List services ordered by `sort_order`
    async fn list(&self, include_inactive: bool) -> Result<Vec<Service>, DomainError>;

    async fn create(&self, service: &NewService) -> Result<Service, DomainError>;

    async fn update(
        &self,
        id: &ServiceId,
        changes: &ServiceChanges,
    ) -> Result<Service, DomainError>;

    /// All variants of a service, active or not, ordered by `sort_order`
    async fn variants_for(&self, service_id: &ServiceId)
        -> Result<Vec<ServiceVariant>, DomainError>;

    async fn find_variant(&self, id: &VariantId) -> Result<Option<ServiceVariant>, DomainError>;

    async fn create_variant(
        &self,
        variant: &NewServiceVariant,
    ) -> Result<ServiceVariant, DomainError>;

    async fn update_variant(
        &self,
        id: &VariantId,
        changes: &VariantChanges,
    ) -> Result<ServiceVariant, DomainError>;

    async fn delete_variant(&self, id: &VariantId) -> Result<(), DomainError>;
}

/// Repository for Member profiles
#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn find_by_id(&self, id: &MemberId) -> Result<Option<Member>, DomainError>;

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Member>, DomainError>;

    async fn create(&self, member: &NewMember) -> Result<Member, DomainError>;

    async fn update(&self, id: &MemberId, changes: &MemberChanges)
        -> Result<Member, DomainError>;

    /// Search members by name, phone or account email
    async fn search(&self, query: &MemberQuery) -> Result<Vec<Member>, DomainError>;

    /// Add to the points balance and lifetime spend in one step, then
    /// recompute the level from the new spend
    ///
    /// Fails with `Validation` and changes nothing when the balance would
    /// drop below zero.
    async fn add_loyalty(
        &self,
        id: &MemberId,
        points: i64,
        spent: i64,
    ) -> Result<Member, DomainError>;

    async fn count_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, DomainError>;
}

/// Repository for artists and their portfolios
#[async_trait]
pub trait ArtistRepository: Send + Sync {
    async fn find_by_id(&self, id: &ArtistId) -> Result<Option<Artist>, DomainError>;

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Artist>, DomainError>;

    async fn list(
        &self,
        branch_id: Option<&BranchId>,
        include_inactive: bool,
    ) -> Result<Vec<Artist>, DomainError>;

    async fn create(&self, artist: &NewArtist) -> Result<Artist, DomainError>;

    async fn update(&self, id: &ArtistId, changes: &ArtistChanges)
        -> Result<Artist, DomainError>;

    /// Portfolio of an artist, newest first
    async fn list_portfolio(
        &self,
        artist_id: &ArtistId,
        include_private: bool,
    ) -> Result<Vec<PortfolioItem>, DomainError>;

    async fn find_portfolio_item(
        &self,
        id: &PortfolioItemId,
    ) -> Result<Option<PortfolioItem>, DomainError>;

    async fn create_portfolio_item(
        &self,
        item: &NewPortfolioItem,
    ) -> Result<PortfolioItem, DomainError>;

    async fn update_portfolio_item(
        &self,
        id: &PortfolioItemId,
        changes: &PortfolioChanges,
    ) -> Result<PortfolioItem, DomainError>;

    async fn delete_portfolio_item(&self, id: &PortfolioItemId) -> Result<(), DomainError>;
}

/// Repository for carts and cart items
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Find the cart of an owner, with its items
    async fn find_by_owner(&self, owner: &CartOwner) -> Result<Option<Cart>, DomainError>;

    async fn create(&self, owner: &CartOwner, expires_at: DateTime<Utc>)
        -> Result<Cart, DomainError>;

    /// Delete a cart and its items
    async fn delete(&self, id: &CartId) -> Result<(), DomainError>;

    /// Delete every cart that expired at or before `now`, returning how many
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError>;

    async fn add_item(&self, cart_id: &CartId, item: &NewCartItem)
        -> Result<CartItem, DomainError>;

    /// Overwrite selection, quantity, price and notes of an item
    async fn save_item(&self, cart_id: &CartId, item: &CartItem) -> Result<(), DomainError>;

    async fn remove_item(&self, cart_id: &CartId, item_id: &CartItemId)
        -> Result<bool, DomainError>;

    async fn clear(&self, cart_id: &CartId) -> Result<(), DomainError>;

    /// Set preferred branch and artist
    async fn set_preferences(
        &self,
        cart_id: &CartId,
        branch_id: Option<BranchId>,
        artist_id: Option<ArtistId>,
    ) -> Result<(), DomainError>;

    /// Refresh the modification time and expiry
    async fn touch(
        &self,
        cart_id: &CartId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    /// Move every item of one cart into another
    async fn move_items(&self, from: &CartId, to: &CartId) -> Result<(), DomainError>;
}

/// Repository for contact requests
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn create(&self, contact: &NewContact) -> Result<Contact, DomainError>;

    async fn find_by_id(&self, id: &ContactId) -> Result<Option<Contact>, DomainError>;

    /// List contacts, newest first
    ///
    /// With a branch, contacts of that branch and contacts without a branch
    /// are returned.
    async fn list(
        &self,
        status: Option<ContactStatus>,
        branch_id: Option<&BranchId>,
    ) -> Result<Vec<Contact>, DomainError>;

    async fn update_status(
        &self,
        id: &ContactId,
        status: ContactStatus,
        admin_note: Option<String>,
    ) -> Result<Contact, DomainError>;
}

/// Repository for appointments
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_by_id(&self, id: &AppointmentId) -> Result<Option<Appointment>, DomainError>;

    /// Store a pending appointment
    ///
    /// Fails with `Conflict` when another slot-holding appointment of the
    /// artist overlaps, even if `find_overlapping` found none a moment earlier.
    async fn create(&self, appointment: &NewAppointment) -> Result<Appointment, DomainError>;

    /// List appointments ordered by start time
    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DomainError>;

    /// Slot-holding appointments of an artist that overlap `[start_at, end_at)`
    async fn find_overlapping(
        &self,
        artist_id: &ArtistId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude: Option<&AppointmentId>,
    ) -> Result<Vec<Appointment>, DomainError>;

    async fn update_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, DomainError>;

    /// Move an appointment; fails with `Conflict` like `create`
    async fn reschedule(
        &self,
        id: &AppointmentId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Appointment, DomainError>;
}

/// New paid state of one installment after a payment
#[derive(Debug, Clone)]
pub struct InstallmentSettlement {
    pub installment_id: InstallmentId,
    pub paid_amount: i64,
    pub status: PaymentStatus,
}

/// New paid state of a bill after a payment
#[derive(Debug, Clone)]
pub struct BillSettlement {
    pub paid_amount: i64,
    pub status: PaymentStatus,
    pub allocations: Vec<PaymentAllocation>,
    pub installments: Vec<InstallmentSettlement>,
}

impl BillSettlement {
    /// Apply a payment to the current state of a bill
    ///
    /// Installment bills allocate the amount onto installments in sequence
    /// order. Fails when the bill is closed or the amount exceeds what is owed.
    pub fn for_payment(bill: &Bill, amount: i64) -> Result<Self, DomainError> {
        if amount <= 0 {
            return Err(DomainError::Validation("amount must be positive".to_string()));
        }
        if !bill.is_open() {
            return Err(DomainError::Conflict(format!("Bill is {}", bill.status)));
        }
        if amount > bill.outstanding() {
            return Err(DomainError::Validation(format!(
                "amount exceeds the outstanding {}",
                bill.outstanding()
            )));
        }

        let allocations: Vec<PaymentAllocation> = match bill.payment_type {
            PaymentType::Installment => allocate_payment(&bill.installments, amount)
                .into_iter()
                .map(|(installment_id, amount)| PaymentAllocation {
                    installment_id,
                    amount,
                })
                .collect(),
            PaymentType::Full => Vec::new(),
        };

        let installments = allocations
            .iter()
            .filter_map(|a| {
                let installment = bill.installments.iter().find(|i| i.id == a.installment_id)?;
                let paid_amount = installment.paid_amount + a.amount;
                Some(InstallmentSettlement {
                    installment_id: installment.id,
                    paid_amount,
                    status: PaymentStatus::from_amounts(paid_amount, installment.amount),
                })
            })
            .collect();

        let paid_amount = bill.paid_amount + amount;
        Ok(Self {
            paid_amount,
            status: PaymentStatus::from_amounts(paid_amount, bill.final_amount),
            allocations,
            installments,
        })
    }
}

/// Repository for bills, installments and payments
#[async_trait]
pub trait BillingRepository: Send + Sync {
    /// Find a bill with its items and installments
    async fn find_by_id(&self, id: &BillId) -> Result<Option<Bill>, DomainError>;

    async fn find_by_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Option<Bill>, DomainError>;

    async fn create(&self, bill: &NewBill) -> Result<Bill, DomainError>;

    /// List bills, newest first
    async fn list(&self, query: &BillQuery) -> Result<Vec<Bill>, DomainError>;

    /// Store an installment plan and switch the bill to installment payment
    async fn create_installments(
        &self,
        bill_id: &BillId,
        plan: &[PlannedInstallment],
    ) -> Result<Vec<Installment>, DomainError>;

    /// Settle a payment against the bill as stored and persist both atomically
    ///
    /// The bill is locked for the duration so concurrent payments see each
    /// other's effect. Errors from `BillSettlement::for_payment` are returned
    /// unchanged.
    async fn record_payment(
        &self,
        payment: &NewPayment,
    ) -> Result<(Payment, BillSettlement), DomainError>;

    async fn list_payments(&self, bill_id: &BillId) -> Result<Vec<Payment>, DomainError>;

    /// Payments received in `[from, to)`, optionally for one branch
    async fn payments_between(
        &self,
        branch_id: Option<&BranchId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Payment>, DomainError>;

    async fn set_status(&self, id: &BillId, status: PaymentStatus) -> Result<(), DomainError>;
}

/// Repository for in-app notifications
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &NewNotification)
        -> Result<Notification, DomainError>;

    /// Notifications of a user, newest first
    async fn list_for_user(
        &self,
        user_id: &UserId,
        unread_only: bool,
        limit: u64,
    ) -> Result<Vec<Notification>, DomainError>;

    async fn count_unread(&self, user_id: &UserId) -> Result<u64, DomainError>;

    /// Mark one notification read; false when it does not belong to the user
    async fn mark_read(&self, user_id: &UserId, id: &NotificationId)
        -> Result<bool, DomainError>;

    async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, DomainError>;
}

/// Repository for the audit trail
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn create(&self, entry: &NewAuditLog) -> Result<AuditLog, DomainError>;

    /// Filtered records, newest first
    async fn list(&self, query: &AuditLogQuery) -> Result<Vec<AuditLog>, DomainError>;
}

/// Key/value store for site-wide settings
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, DomainError>;

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), DomainError>;
}

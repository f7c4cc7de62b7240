//! Domain entities
//!
//! Pure domain models representing core business concepts.
//! These are separate from the SeaORM entities in the `entity` module.

mod macros;

pub mod appointment;
pub mod artist;
pub mod audit_log;
pub mod backup;
pub mod billing;
pub mod branch;
pub mod cart;
pub mod contact;
pub mod member;
pub mod notification;
pub mod service;
pub mod user;

pub use appointment::{
    Appointment, AppointmentId, AppointmentQuery, AppointmentStatus, NewAppointment,
};
pub use artist::{
    Artist, ArtistChanges, ArtistId, NewArtist, NewPortfolioItem, PortfolioChanges,
    PortfolioItem, PortfolioItemId,
};
pub use audit_log::{AuditLog, AuditLogId, AuditLogQuery, NewAuditLog};
pub use backup::BackupKind;
pub use billing::{
    allocate_payment, plan_installments, Bill, BillId, BillItem, BillItemId, BillQuery,
    Installment, InstallmentId, NewBill, NewBillItem, NewPayment, Payment, PaymentAllocation,
    PaymentId, PaymentMethod, PaymentStatus, PaymentType, PlannedInstallment, MAX_INSTALLMENTS,
    MIN_INSTALLMENTS,
};
pub use branch::{Branch, BranchChanges, BranchId, NewBranch};
pub use cart::{Cart, CartId, CartItem, CartItemId, CartOwner, NewCartItem, VariantSelection};
pub use contact::{Contact, ContactId, ContactStatus, NewContact};
pub use member::{
    points_for_payment, Member, MemberChanges, MemberId, MemberQuery, MembershipLevel, NewMember,
};
pub use notification::{NewNotification, Notification, NotificationId, NotificationKind};
pub use service::{
    NewService, NewServiceVariant, Service, ServiceChanges, ServiceId, ServiceVariant,
    ServiceWithVariants, VariantChanges, VariantId, VariantKind,
};
pub use user::{NewUser, Role, User, UserChanges, UserId};

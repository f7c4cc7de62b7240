//! Domain ports (traits)
//!
//! Port traits define interfaces that the domain layer requires.
//! Adapters provide concrete implementations of these traits.

pub mod process;
pub mod repositories;

pub use process::{CommandOutput, CommandRunner};
pub use repositories::{
    AppointmentRepository, ArtistRepository, AuditLogRepository, BillSettlement,
    BillingRepository, BranchRepository, CartRepository, ContactRepository, InstallmentSettlement,
    MemberRepository, NotificationRepository, ServiceRepository, SettingsRepository,
    UserRepository,
};

//! Adapters layer
//!
//! Implementations of port traits for external systems.

pub mod postgres;
pub mod process;

pub use postgres::{
    PostgresAppointmentRepository, PostgresArtistRepository, PostgresAuditLogRepository,
    PostgresBillingRepository, PostgresBranchRepository, PostgresCartRepository,
    PostgresContactRepository, PostgresMemberRepository, PostgresNotificationRepository,
    PostgresServiceRepository, PostgresSettingsRepository, PostgresUserRepository,
};
pub use process::TokioCommandRunner;

//! Application layer
//!
//! Contains use cases and service orchestration.
//! Services coordinate between domain entities, ports, and external systems.

pub mod appointment_service;
pub mod artist_service;
pub mod audit_service;
pub mod auth_service;
pub mod backup_service;
pub mod billing_service;
pub mod cart_service;
pub mod catalog_service;
pub mod contact_service;
pub mod dashboard_service;
pub mod maintenance_service;
pub mod member_service;
pub mod notification_service;
pub mod pricing;
pub mod serde_helpers;
pub mod user_service;
pub mod validation;

pub use appointment_service::{
    AppointmentFilter, AppointmentService, BookingRequest, RescheduleRequest, StatusChange,
};
pub use artist_service::{
    ArtistInput, ArtistProfile, ArtistService, ArtistUpdate, PortfolioInput, PortfolioUpdate,
};
pub use audit_service::AuditService;
pub use auth_service::{AuthService, AuthSession, Registration};
pub use backup_service::{BackupService, BackupSettings};
pub use billing_service::{
    BillFilter, BillRequest, BillingService, InstallmentRequest, OverdueInstallment,
    PaymentRequest,
};
pub use cart_service::{
    generate_guest_token, is_valid_guest_token, AddItem, CartPreferences, CartService, CartView,
    CheckoutRequest, ItemUpdate,
};
pub use catalog_service::{
    BranchInput, BranchUpdate, CatalogService, ServiceInput, ServiceUpdate, VariantInput,
    VariantUpdate,
};
pub use contact_service::{ContactForm, ContactService, ContactUpdate};
pub use dashboard_service::{DashboardQuery, DashboardService, DashboardSummary};
pub use maintenance_service::{MaintenanceRequest, MaintenanceService, MaintenanceStatus};
pub use member_service::{MemberService, PointsAdjustment, ProfileUpdate};
pub use notification_service::NotificationService;
pub use pricing::{PriceBreakdown, PriceRequest};
pub use user_service::{StaffAccount, StaffUpdate, UserService};

//! HTTP handlers
//!
//! Axum request handlers for the API endpoints.

pub mod admin;
pub mod appointments;
pub mod artists;
pub mod auth;
pub mod backups;
pub mod billing;
pub mod cart;
pub mod catalog;
pub mod contacts;
pub mod maintenance;
pub mod members;
pub mod notifications;
pub mod users;

pub use admin::{dashboard, list_audit_logs};
pub use appointments::{
    change_status, create_appointment, create_bill, get_appointment, list_appointments,
    reschedule_appointment,
};
pub use artists::{
    add_portfolio_item, create_artist, delete_portfolio_item, get_artist, list_artists,
    update_artist, update_portfolio_item,
};
pub use auth::{change_password, login, me, refresh, register};
pub use backups::{
    create_backup, delete_backup, download_backup, list_backups, restore_backup, restore_upload,
};
pub use billing::{
    create_installments, get_bill, list_bills, list_overdue, list_payments, record_payment,
    void_bill,
};
pub use cart::{add_item, checkout, clear_cart, get_cart, remove_item, set_preferences, update_item};
pub use catalog::{
    create_branch, create_service, create_variant, delete_branch, delete_service, delete_variant,
    get_branch, get_service, list_branches, list_services, quote, update_branch, update_service,
    update_variant,
};
pub use contacts::{list_contacts, submit_contact, update_contact};
pub use maintenance::{get_maintenance, maintenance_gate, set_maintenance};
pub use members::{
    adjust_points, get_me, get_member, my_bills, search_members, update_me, update_notes,
};
pub use notifications::{list_notifications, mark_all_read, mark_read, unread_count};
pub use users::{create_user, list_users, update_user};

//! SeaORM entities
//!
//! Table models mirroring `migrations/`. Domain code never sees these;
//! the Postgres adapters convert them into domain entities.

pub mod appointment_bills;
pub mod appointments;
pub mod artists;
pub mod audit_logs;
pub mod bill_items;
pub mod branches;
pub mod cart_items;
pub mod carts;
pub mod contacts;
pub mod installments;
pub mod members;
pub mod notifications;
pub mod payment_allocations;
pub mod payments;
pub mod portfolio_items;
pub mod service_variants;
pub mod services;
pub mod system_settings;
pub mod users;

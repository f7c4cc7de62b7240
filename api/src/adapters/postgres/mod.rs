//! PostgreSQL adapters
//!
//! Implementations of repository traits using SeaORM and PostgreSQL.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;

pub mod appointment_repo;
pub mod artist_repo;
pub mod audit_log_repo;
pub mod billing_repo;
pub mod branch_repo;
pub mod cart_repo;
pub mod contact_repo;
pub mod member_repo;
pub mod notification_repo;
pub mod service_repo;
pub mod settings_repo;
pub mod user_repo;


pub use appointment_repo::PostgresAppointmentRepository;
pub use artist_repo::PostgresArtistRepository;
pub use audit_log_repo::PostgresAuditLogRepository;
pub use billing_repo::PostgresBillingRepository;
pub use branch_repo::PostgresBranchRepository;
pub use cart_repo::PostgresCartRepository;
pub use contact_repo::PostgresContactRepository;
pub use member_repo::PostgresMemberRepository;
pub use notification_repo::PostgresNotificationRepository;
pub use service_repo::PostgresServiceRepository;
pub use settings_repo::PostgresSettingsRepository;
pub use user_repo::PostgresUserRepository;

/// Convert a stored timestamp to UTC
pub(crate) fn utc(dt: DateTimeWithTimeZone) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

/// Parse a stored enum string, falling back when the column holds an unknown value
pub(crate) fn parse_or<T: FromStr>(raw: &str, fallback: T) -> T {
    raw.parse().unwrap_or(fallback)
}

/// Read a JSON array column of strings
pub(crate) fn string_list(value: serde_json::Value) -> Vec<String> {
    serde_json::from_value(value).unwrap_or_default()
}

/// `ILIKE` pattern matching `term` anywhere, with wildcards in `term` taken literally
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("ink"), "%ink%");
        assert_eq!(contains_pattern("50%_off"), r"%50\%\_off%");
        assert_eq!(contains_pattern(r"a\b"), r"%a\\b%");
    }
}

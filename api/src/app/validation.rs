//! Input checks shared by the services

use crate::error::DomainError;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Trim and lowercase an email address, rejecting obviously invalid ones
pub fn normalize_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim().to_lowercase();
    let valid = regex::Regex::new(EMAIL_PATTERN)
        .map(|re| re.is_match(&email))
        .unwrap_or(false);

    if valid && email.len() <= 254 {
        Ok(email)
    } else {
        Err(DomainError::Validation(format!("Invalid email: {}", raw)))
    }
}

/// Trimmed, non-empty text of at most `max` characters
pub fn required_text(field: &str, raw: &str, max: usize) -> Result<String, DomainError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(DomainError::Validation(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(DomainError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

/// Blank optional text becomes `None`
pub fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn non_negative(field: &str, value: i64) -> Result<(), DomainError> {
    if value < 0 {
        return Err(DomainError::Validation(format!("{} must not be negative", field)));
    }
    Ok(())
}

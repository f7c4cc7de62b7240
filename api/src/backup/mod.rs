//! Encrypted backups
//!
//! `format` implements the artifact container. This module holds the naming
//! rules for artifacts on disk.

pub mod format;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::BackupKind;
use crate::error::BackupError;

pub use format::{decrypt, encrypt, read_header, BackupHeader, KdfParams};

pub const ARTIFACT_EXTENSION: &str = ".inkbk";

/// A backup file found in the backup directory
#[derive(Debug, Clone, Serialize)]
pub struct BackupArtifact {
    pub name: String,
    pub size_bytes: u64,
    /// `None` when the file is not a readable artifact
    pub header: Option<BackupHeader>,
}

/// `inkstone-<kind>-<YYYYMMDDHHMMSS>.inkbk`
pub fn artifact_name(kind: BackupKind, at: DateTime<Utc>) -> String {
    format!(
        "inkstone-{}-{}{}",
        kind,
        at.format("%Y%m%d%H%M%S"),
        ARTIFACT_EXTENSION
    )
}

/// Reject names that could escape the backup directory
pub fn validate_name(name: &str) -> Result<(), BackupError> {
    let stem = name.strip_suffix(ARTIFACT_EXTENSION).unwrap_or("");
    let valid = !stem.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.contains("..");

    if valid {
        Ok(())
    } else {
        Err(BackupError::Format(format!("Invalid backup name: {}", name)))
    }
}

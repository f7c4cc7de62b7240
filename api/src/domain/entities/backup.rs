//! Backup kinds

use super::macros::string_enum;

string_enum!(
    /// What a backup artifact contains
    BackupKind {
        Database => "database",
        Files => "files",
        Full => "full",
    }
);


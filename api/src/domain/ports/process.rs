//! External process port
//!
//! Backups shell out to `pg_dump`, `pg_restore` and `tar`. The runner trait
//! keeps that behind a seam so the backup flow can be exercised without them.

use async_trait::async_trait;

use crate::error::BackupError;

/// Captured result of a finished process
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and extra environment variables, waiting for it to exit
    async fn run(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
    ) -> Result<CommandOutput, BackupError>;
}

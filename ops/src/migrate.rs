//! Migration deploy with bounded retry and failed-migration recovery
//!
//! `sqlx migrate run` is the migrator. When it fails, its output is classified:
//! transient connection problems are retried, a partially applied version can
//! be cleared from `_sqlx_migrations` when the operator allows it, and
//! anything else aborts with a hint.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use sea_orm::{ConnectionTrait, Database, DbBackend, Statement};
use tokio::process::Command;

const TRANSIENT_MARKERS: &[&str] = &[
    "connection refused",
    "could not connect",
    "timed out",
    "too many connections",
];

static DIRTY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)migration (\d+) is partially applied|Dirty\((\d+)\)").ok()
});

static MODIFIED_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"(?i)migration (\d+) was previously applied but has been modified",
            r"|VersionMismatch\((\d+)\)",
        ),
    )
    .ok()
});

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to run migrator: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error(
        "Migration {version} is partially applied. Fix the migration, then rerun with \
         AUTO_RESOLVE_FAILED_MIGRATION={version} to clear its row from _sqlx_migrations"
    )]
    Unresolved { version: i64 },

    #[error(
        "Migration {version} was changed after it was applied. Restore the original file \
         or add a new migration instead"
    )]
    Modified { version: i64 },

    #[error("Database still unreachable after {attempts} attempts:\n{output}")]
    AttemptsExhausted { attempts: u32, output: String },

    #[error("Migration failed:\n{0}")]
    Failed(String),
}

/// What a failed migrator run means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Transient,
    Dirty(i64),
    Modified(i64),
    Other,
}

fn captured_version(re: &Option<Regex>, output: &str) -> Option<i64> {
    let caps = re.as_ref()?.captures(output)?;
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .and_then(|m| m.as_str().parse().ok())
}

/// Classify the combined stdout and stderr of a failed run
pub fn classify(output: &str) -> Failure {
    if let Some(version) = captured_version(&DIRTY_RE, output) {
        return Failure::Dirty(version);
    }
    if let Some(version) = captured_version(&MODIFIED_RE, output) {
        return Failure::Modified(version);
    }

    let lower = output.to_lowercase();
    if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        return Failure::Transient;
    }
    Failure::Other
}

/// Which partially applied versions may be cleared automatically
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResolvePolicy {
    #[default]
    Never,
    All,
    Versions(BTreeSet<i64>),
}

impl ResolvePolicy {
    /// Parse `AUTO_RESOLVE_FAILED_MIGRATION`: empty, `all`, or comma separated versions
    pub fn parse(raw: &str) -> Result<Self, MigrateError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(ResolvePolicy::Never);
        }
        if raw.eq_ignore_ascii_case("all") {
            return Ok(ResolvePolicy::All);
        }

        let versions = raw
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<i64>()
                    .map_err(|_| MigrateError::Config(format!("Not a migration version: {}", v)))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(ResolvePolicy::Versions(versions))
    }

    pub fn allows(&self, version: i64) -> bool {
        match self {
            ResolvePolicy::Never => false,
            ResolvePolicy::All => true,
            ResolvePolicy::Versions(versions) => versions.contains(&version),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MigrateSettings {
    pub database_url: String,
    pub migrations_dir: PathBuf,
    pub sqlx_bin: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub resolve: ResolvePolicy,
}

impl MigrateSettings {
    pub fn from_env() -> Result<Self, MigrateError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| MigrateError::Config("DATABASE_URL must be set".to_string()))?;

        Ok(Self {
            database_url,
            migrations_dir: std::env::var("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("api/migrations")),
            sqlx_bin: std::env::var("SQLX_BIN").unwrap_or_else(|_| "sqlx".to_string()),
            max_attempts: number_from_env("MIGRATE_MAX_ATTEMPTS", 5)?.max(1),
            retry_delay: Duration::from_secs(u64::from(number_from_env(
                "MIGRATE_RETRY_DELAY_SECS",
                3,
            )?)),
            resolve: ResolvePolicy::parse(
                &std::env::var("AUTO_RESOLVE_FAILED_MIGRATION").unwrap_or_default(),
            )?,
        })
    }
}

fn number_from_env(name: &str, default: u32) -> Result<u32, MigrateError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| MigrateError::Config(format!("Invalid {}: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

/// Result of one migrator run
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub success: bool,
    pub output: String,
}

/// The migrator and the bookkeeping table it writes to
#[async_trait]
pub trait Migrator: Send + Sync {
    async fn run(&self) -> Result<RunOutput, MigrateError>;

    /// Remove the failed bookkeeping row of a version
    async fn clear_failed(&self, version: i64) -> Result<(), MigrateError>;
}

/// `sqlx migrate run` against Postgres
pub struct SqlxMigrator {
    settings: MigrateSettings,
}

impl SqlxMigrator {
    pub fn new(settings: MigrateSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Migrator for SqlxMigrator {
    async fn run(&self) -> Result<RunOutput, MigrateError> {
        let output = Command::new(&self.settings.sqlx_bin)
            .args(["migrate", "run", "--source"])
            .arg(&self.settings.migrations_dir)
            .env("DATABASE_URL", &self.settings.database_url)
            .output()
            .await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(RunOutput {
            success: output.status.success(),
            output: combined,
        })
    }

    async fn clear_failed(&self, version: i64) -> Result<(), MigrateError> {
        let db = Database::connect(&self.settings.database_url).await?;
        let result = db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "DELETE FROM _sqlx_migrations WHERE version = $1 AND success = false",
                [version.into()],
            ))
            .await?;
        tracing::info!(version, rows = result.rows_affected(), "Cleared failed migration row");
        Ok(())
    }
}

/// How a successful deploy went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployed {
    pub runs: u32,
    pub resolved: Vec<i64>,
}

/// Run migrations until they succeed or fail for a reason retrying cannot fix
pub async fn deploy<M: Migrator>(
    migrator: &M,
    settings: &MigrateSettings,
) -> Result<Deployed, MigrateError> {
    let mut runs = 0;
    let mut transient_failures = 0;
    let mut resolved: Vec<i64> = Vec::new();

    loop {
        runs += 1;
        let run = migrator.run().await?;
        if run.success {
            tracing::info!(runs, "Migrations applied");
            return Ok(Deployed { runs, resolved });
        }

        match classify(&run.output) {
            Failure::Transient => {
                transient_failures += 1;
                if transient_failures >= settings.max_attempts {
                    return Err(MigrateError::AttemptsExhausted {
                        attempts: transient_failures,
                        output: run.output,
                    });
                }
                tracing::warn!(
                    attempt = transient_failures,
                    max_attempts = settings.max_attempts,
                    "Database not reachable, retrying in {:?}",
                    settings.retry_delay
                );
                tokio::time::sleep(settings.retry_delay).await;
            }
            Failure::Dirty(version) => {
                if resolved.contains(&version) || !settings.resolve.allows(version) {
                    return Err(MigrateError::Unresolved { version });
                }
                tracing::warn!(version, "Clearing partially applied migration");
                migrator.clear_failed(version).await?;
                resolved.push(version);
            }
            Failure::Modified(version) => return Err(MigrateError::Modified { version }),
            Failure::Other => return Err(MigrateError::Failed(run.output)),
        }
    }
}

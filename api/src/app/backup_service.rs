//! Encrypted backup export and restore

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;

use crate::app::audit_service::AuditService;
use crate::app::maintenance_service::MaintenanceService;
use crate::auth::require_role;
use crate::backup::format::{header_length, parse_header, PREFIX_LEN};
use crate::backup::{
    artifact_name, decrypt, encrypt, read_header, validate_name, BackupArtifact, BackupHeader,
    KdfParams,
};
use crate::config::Config;
use crate::domain::entities::{BackupKind, Role, User};
use crate::domain::ports::{AuditLogRepository, CommandOutput, CommandRunner, SettingsRepository};
use crate::error::{AppError, BackupError};

const DATABASE_FILE: &str = "database.dump";
const UPLOADS_ARCHIVE: &str = "uploads.tar.gz";
const FULL_ARCHIVE: &str = "full.tar.gz";
const RESTORE_MESSAGE: &str = "A backup is being restored. Please try again in a few minutes.";

/// Paths, tools and secrets used by backups
#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub backup_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub passphrase: Option<String>,
    pub database_url: String,
    pub pg_dump_bin: String,
    pub pg_restore_bin: String,
    pub tar_bin: String,
    pub protect_real_data: bool,
    pub kdf: KdfParams,
}

impl BackupSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            backup_dir: config.backup_dir.clone(),
            uploads_dir: config.uploads_dir.clone(),
            passphrase: config.backup_passphrase.clone(),
            database_url: config.database_url.clone(),
            pg_dump_bin: config.pg_dump_bin.clone(),
            pg_restore_bin: config.pg_restore_bin.clone(),
            tar_bin: config.tar_bin.clone(),
            protect_real_data: config.protect_real_data,
            kdf: KdfParams::default(),
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn failure_message(output: &CommandOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        match output.code {
            Some(code) => format!("exited with code {}", code),
            None => "terminated by signal".to_string(),
        }
    } else {
        stderr.lines().last().unwrap_or(stderr).to_string()
    }
}

const PG_URL_PATTERN: &str = concat!(
    r"^postgres(?:ql)?://",
    r"(?:([^:@/]*)(?::([^@/]*))?@)?",
    r"([^/:?]*)(?::(\d+))?",
    r"(?:/([^?]*))?(?:\?(.*))?$",
);

/// libpq environment for a `postgres://` URL, keeping the password off the command line
fn pg_env(database_url: &str) -> Result<Vec<(String, String)>, BackupError> {
    let invalid = || BackupError::Config("DATABASE_URL is not a postgres:// URL".to_string());
    let re = regex::Regex::new(PG_URL_PATTERN).map_err(|_| invalid())?;
    let caps = re.captures(database_url.trim()).ok_or_else(invalid)?;
    let decode = |raw: &str| {
        urlencoding::decode(raw)
            .map(|v| v.into_owned())
            .map_err(|_| invalid())
    };

    let mut envs = Vec::new();
    let parts = [
        ("PGUSER", 1),
        ("PGPASSWORD", 2),
        ("PGHOST", 3),
        ("PGPORT", 4),
        ("PGDATABASE", 5),
    ];
    for (var, group) in parts {
        if let Some(value) = caps.get(group).filter(|m| !m.as_str().is_empty()) {
            envs.push((var.to_string(), decode(value.as_str())?));
        }
    }
    if let Some(query) = caps.get(6) {
        for pair in query.as_str().split('&') {
            if let Some(mode) = pair.strip_prefix("sslmode=") {
                envs.push(("PGSSLMODE".to_string(), decode(mode)?));
            }
        }
    }
    Ok(envs)
}

fn not_found(name: &str) -> impl FnOnce(std::io::Error) -> AppError + '_ {
    move |e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::NotFound(format!("Backup {} not found", name)),
        _ => BackupError::Io(e).into(),
    }
}

pub struct BackupService<CR, SR, AL>
where
    CR: CommandRunner,
    SR: SettingsRepository,
    AL: AuditLogRepository,
{
    runner: Arc<CR>,
    maintenance: Arc<MaintenanceService<SR, AL>>,
    audit: Arc<AuditService<AL>>,
    settings: BackupSettings,
    export_lock: Mutex<()>,
    restore_lock: Mutex<()>,
}

impl<CR, SR, AL> BackupService<CR, SR, AL>
where
    CR: CommandRunner,
    SR: SettingsRepository,
    AL: AuditLogRepository,
{
    pub fn new(
        runner: Arc<CR>,
        maintenance: Arc<MaintenanceService<SR, AL>>,
        audit: Arc<AuditService<AL>>,
        settings: BackupSettings,
    ) -> Self {
        Self {
            runner,
            maintenance,
            audit,
            settings,
            export_lock: Mutex::new(()),
            restore_lock: Mutex::new(()),
        }
    }

    /// Export one artifact; a second export while one runs is refused
    pub async fn create(&self, actor: &User, kind: BackupKind) -> Result<BackupArtifact, AppError> {
        require_role(actor, &[Role::Boss])?;
        let passphrase = self.passphrase()?;
        let _guard = self.export_lock.try_lock().map_err(|_| BackupError::Locked)?;

        let staging = self.staging_dir().await?;
        let result = self.export(kind, &staging, passphrase).await;
        self.cleanup(&staging).await;
        let artifact = result?;

        tracing::info!(name = %artifact.name, size_bytes = artifact.size_bytes, "Backup created");
        self.audit
            .record_by(
                actor,
                "backup.create",
                "backup",
                &artifact.name,
                json!({"kind": kind, "size_bytes": artifact.size_bytes}),
            )
            .await;
        Ok(artifact)
    }

    /// Artifacts in the backup directory, newest first
    pub async fn list(&self, actor: &User) -> Result<Vec<BackupArtifact>, AppError> {
        require_role(actor, &[Role::Boss])?;

        let mut entries = match fs::read_dir(&self.settings.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackupError::Io(e).into()),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(BackupError::Io)? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if validate_name(&name).is_err() {
                continue;
            }
            let metadata = entry.metadata().await.map_err(BackupError::Io)?;
            if !metadata.is_file() {
                continue;
            }

            let header = match peek_header(&entry.path()).await {
                Ok(header) => Some(header),
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "Unreadable backup artifact");
                    None
                }
            };
            artifacts.push(BackupArtifact {
                name,
                size_bytes: metadata.len(),
                header,
            });
        }

        artifacts.sort_by(|a, b| {
            let key = |x: &BackupArtifact| {
                (x.header.as_ref().map(|h| h.created_at), x.name.clone())
            };
            key(b).cmp(&key(a))
        });
        Ok(artifacts)
    }

    pub async fn download(&self, actor: &User, name: &str) -> Result<Vec<u8>, AppError> {
        require_role(actor, &[Role::Boss])?;
        validate_name(name)?;
        fs::read(self.settings.backup_dir.join(name))
            .await
            .map_err(not_found(name))
    }

    pub async fn delete(&self, actor: &User, name: &str) -> Result<(), AppError> {
        require_role(actor, &[Role::Boss])?;
        validate_name(name)?;
        fs::remove_file(self.settings.backup_dir.join(name))
            .await
            .map_err(not_found(name))?;

        tracing::info!(name, "Backup deleted");
        self.audit
            .record_by(actor, "backup.delete", "backup", name, json!({}))
            .await;
        Ok(())
    }

    /// Restore a stored artifact
    pub async fn restore(&self, actor: &User, name: &str) -> Result<BackupHeader, AppError> {
        require_role(actor, &[Role::Boss])?;
        validate_name(name)?;
        self.guard_real_data()?;
        let data = fs::read(self.settings.backup_dir.join(name))
            .await
            .map_err(not_found(name))?;
        self.restore_bytes(actor, data, name).await
    }

    /// Restore an artifact uploaded in the request body
    pub async fn restore_upload(
        &self,
        actor: &User,
        data: Vec<u8>,
    ) -> Result<BackupHeader, AppError> {
        require_role(actor, &[Role::Boss])?;
        self.guard_real_data()?;
        read_header(&data)?;
        self.restore_bytes(actor, data, "upload").await
    }

    async fn restore_bytes(
        &self,
        actor: &User,
        data: Vec<u8>,
        source: &str,
    ) -> Result<BackupHeader, AppError> {
        let passphrase = self.passphrase()?;
        let _guard = self.restore_lock.try_lock().map_err(|_| BackupError::Locked)?;

        tracing::warn!(source, "Starting restore, entering maintenance mode");
        let saved = self.maintenance.enter(RESTORE_MESSAGE).await;
        let result = self.import(data, passphrase).await;
        self.maintenance.leave(saved).await;

        match &result {
            Ok(header) => {
                tracing::info!(source, kind = %header.kind, "Restore finished");
                self.audit
                    .record_by(
                        actor,
                        "backup.restore",
                        "backup",
                        source,
                        json!({"kind": header.kind, "created_at": header.created_at}),
                    )
                    .await;
            }
            Err(e) => tracing::error!(source, error = %e, "Restore failed"),
        }
        Ok(result?)
    }

    async fn export(
        &self,
        kind: BackupKind,
        staging: &Path,
        passphrase: String,
    ) -> Result<BackupArtifact, BackupError> {
        let payload = match kind {
            BackupKind::Database => {
                let dump = staging.join(DATABASE_FILE);
                self.dump_database(&dump).await?;
                dump
            }
            BackupKind::Files => {
                let archive = staging.join(UPLOADS_ARCHIVE);
                self.archive_uploads(&archive).await?;
                archive
            }
            BackupKind::Full => {
                self.dump_database(&staging.join(DATABASE_FILE)).await?;
                self.archive_uploads(&staging.join(UPLOADS_ARCHIVE)).await?;
                let bundle = staging.join(FULL_ARCHIVE);
                self.run(
                    &self.settings.tar_bin,
                    vec![
                        "-czf".to_string(),
                        path_arg(&bundle),
                        "-C".to_string(),
                        path_arg(staging),
                        DATABASE_FILE.to_string(),
                        UPLOADS_ARCHIVE.to_string(),
                    ],
                )
                .await?;
                bundle
            }
        };

        let plain = fs::read(&payload).await?;
        let source_name = payload
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let kdf = self.settings.kdf;
        let sealed = tokio::task::spawn_blocking(move || {
            encrypt(&plain, &passphrase, kind, &source_name, kdf)
        })
        .await
        .map_err(|e| BackupError::Io(std::io::Error::other(e)))??;

        let name = artifact_name(kind, Utc::now());
        let target = self.settings.backup_dir.join(&name);
        if fs::try_exists(&target).await? {
            return Err(BackupError::Exists(name));
        }
        let partial = self.settings.backup_dir.join(format!("{}.part", name));
        fs::write(&partial, &sealed).await?;
        fs::rename(&partial, &target).await?;

        Ok(BackupArtifact {
            name,
            size_bytes: sealed.len() as u64,
            header: read_header(&sealed).ok(),
        })
    }

    async fn import(&self, data: Vec<u8>, passphrase: String) -> Result<BackupHeader, BackupError> {
        let (header, plain) = tokio::task::spawn_blocking(move || decrypt(&data, &passphrase))
            .await
            .map_err(|e| BackupError::Io(std::io::Error::other(e)))??;

        let staging = self.staging_dir().await?;
        let result = self.apply(&header, &plain, &staging).await;
        self.cleanup(&staging).await;
        result.map(|_| header)
    }

    async fn apply(
        &self,
        header: &BackupHeader,
        plain: &[u8],
        staging: &Path,
    ) -> Result<(), BackupError> {
        match header.kind {
            BackupKind::Database => {
                let dump = staging.join(DATABASE_FILE);
                fs::write(&dump, plain).await?;
                self.restore_database(&dump).await
            }
            BackupKind::Files => {
                let archive = staging.join(UPLOADS_ARCHIVE);
                fs::write(&archive, plain).await?;
                self.extract_uploads(&archive).await
            }
            BackupKind::Full => {
                let bundle = staging.join(FULL_ARCHIVE);
                fs::write(&bundle, plain).await?;
                self.run(
                    &self.settings.tar_bin,
                    vec![
                        "-xzf".to_string(),
                        path_arg(&bundle),
                        "-C".to_string(),
                        path_arg(staging),
                    ],
                )
                .await?;
                self.restore_database(&staging.join(DATABASE_FILE)).await?;
                self.extract_uploads(&staging.join(UPLOADS_ARCHIVE)).await
            }
        }
    }

    async fn dump_database(&self, target: &Path) -> Result<(), BackupError> {
        let envs = pg_env(&self.settings.database_url)?;
        self.run_with(
            &self.settings.pg_dump_bin,
            vec![
                "--format=custom".to_string(),
                "--no-owner".to_string(),
                "--file".to_string(),
                path_arg(target),
            ],
            &envs,
        )
        .await
    }

    async fn restore_database(&self, dump: &Path) -> Result<(), BackupError> {
        let envs = pg_env(&self.settings.database_url)?;
        let database = envs
            .iter()
            .find(|(var, _)| var == "PGDATABASE")
            .map(|(_, db)| db.clone())
            .ok_or_else(|| BackupError::Config("DATABASE_URL names no database".to_string()))?;
        self.run_with(
            &self.settings.pg_restore_bin,
            vec![
                "--clean".to_string(),
                "--if-exists".to_string(),
                "--no-owner".to_string(),
                "--dbname".to_string(),
                database,
                path_arg(dump),
            ],
            &envs,
        )
        .await
    }

    async fn archive_uploads(&self, target: &Path) -> Result<(), BackupError> {
        fs::create_dir_all(&self.settings.uploads_dir).await?;
        self.run(
            &self.settings.tar_bin,
            vec![
                "-czf".to_string(),
                path_arg(target),
                "-C".to_string(),
                path_arg(&self.settings.uploads_dir),
                ".".to_string(),
            ],
        )
        .await
    }

    async fn extract_uploads(&self, archive: &Path) -> Result<(), BackupError> {
        fs::create_dir_all(&self.settings.uploads_dir).await?;
        self.run(
            &self.settings.tar_bin,
            vec![
                "-xzf".to_string(),
                path_arg(archive),
                "-C".to_string(),
                path_arg(&self.settings.uploads_dir),
            ],
        )
        .await
    }

    async fn run(&self, program: &str, args: Vec<String>) -> Result<(), BackupError> {
        self.run_with(program, args, &[]).await
    }

    /// Run a tool, turning a non-zero exit into an error
    async fn run_with(
        &self,
        program: &str,
        args: Vec<String>,
        envs: &[(String, String)],
    ) -> Result<(), BackupError> {
        tracing::debug!(program, "Running backup tool");
        let output = self.runner.run(program, &args, envs).await?;
        if output.success {
            Ok(())
        } else {
            Err(BackupError::Command {
                program: program.to_string(),
                message: failure_message(&output),
            })
        }
    }

    async fn staging_dir(&self) -> Result<PathBuf, BackupError> {
        let dir = self
            .settings
            .backup_dir
            .join(format!(".staging-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    async fn cleanup(&self, staging: &Path) {
        if let Err(e) = fs::remove_dir_all(staging).await {
            tracing::warn!(
                path = %staging.display(),
                error = %e,
                "Failed to remove staging directory"
            );
        }
    }

    fn passphrase(&self) -> Result<String, BackupError> {
        self.settings
            .passphrase
            .clone()
            .ok_or_else(|| BackupError::Config("BACKUP_PASSPHRASE is not set".to_string()))
    }

    fn guard_real_data(&self) -> Result<(), AppError> {
        if self.settings.protect_real_data {
            tracing::warn!("Restore refused: PROTECT_REAL_DATA is set");
            return Err(AppError::Forbidden);
        }
        Ok(())
    }
}

async fn peek_header(path: &Path) -> Result<BackupHeader, BackupError> {
    let mut file = fs::File::open(path).await?;
    let mut prefix = [0u8; PREFIX_LEN];
    file.read_exact(&mut prefix).await?;
    let len = header_length(&prefix)?;
    let mut header = vec![0u8; len];
    file.read_exact(&mut header).await?;
    parse_header(&header)
}

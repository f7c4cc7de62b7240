//! Inkstone operations CLI
//!
//! - `migrate`: deploy SQL migrations with retry and failed-migration recovery
//! - `backup`: export, list, download and restore encrypted backups through the API
//! - `maintenance`: inspect and toggle the API's maintenance mode

mod client;
mod migrate;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use client::InkstoneClient;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Operations tooling for the Inkstone studio backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Manage encrypted backups
    Backup {
        #[command(subcommand)]
        command: BackupCommand,
    },
    /// Manage maintenance mode
    Maintenance {
        #[command(subcommand)]
        command: MaintenanceCommand,
    },
}

#[derive(Subcommand, Debug)]
enum BackupCommand {
    Create {
        #[arg(long, value_enum, default_value_t = BackupKind::Full)]
        kind: BackupKind,
    },
    List,
    Restore {
        name: String,
    },
    Download {
        name: String,
        /// Defaults to the artifact name in the current directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum MaintenanceCommand {
    On {
        #[arg(long)]
        message: Option<String>,
        /// Keep maintenance mode across API restarts
        #[arg(long)]
        persist: bool,
    },
    Off,
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum BackupKind {
    Database,
    Files,
    Full,
}

impl BackupKind {
    fn as_str(&self) -> &'static str {
        match self {
            BackupKind::Database => "database",
            BackupKind::Files => "files",
            BackupKind::Full => "full",
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_backup(command: BackupCommand) -> Result<()> {
    let client = InkstoneClient::from_env()?;
    match command {
        BackupCommand::Create { kind } => print_json(&client.create_backup(kind.as_str()).await?),
        BackupCommand::List => print_json(&client.list_backups().await?),
        BackupCommand::Restore { name } => {
            tracing::warn!(
                %name,
                "Restoring backup; the API is in maintenance mode until it finishes"
            );
            print_json(&client.restore_backup(&name).await?)
        }
        BackupCommand::Download { name, out } => {
            let dest = out.unwrap_or_else(|| PathBuf::from(&name));
            let written = client.download_backup(&name, &dest).await?;
            println!("Saved {} ({} bytes)", dest.display(), written);
            Ok(())
        }
    }
}

async fn run_maintenance(command: MaintenanceCommand) -> Result<()> {
    let client = InkstoneClient::from_env()?;
    let status = match command {
        MaintenanceCommand::On { message, persist } => {
            client
                .set_maintenance(true, persist, message.as_deref())
                .await?
        }
        MaintenanceCommand::Off => client.set_maintenance(false, false, None).await?,
        MaintenanceCommand::Status => client.maintenance_status().await?,
    };
    print_json(&status)
}

async fn run_migrate() -> Result<()> {
    let settings = migrate::MigrateSettings::from_env()?;
    tracing::info!(
        source = %settings.migrations_dir.display(),
        max_attempts = settings.max_attempts,
        "Deploying migrations"
    );

    let migrator = migrate::SqlxMigrator::new(settings.clone());
    let deployed = migrate::deploy(&migrator, &settings).await?;
    if !deployed.resolved.is_empty() {
        tracing::warn!(versions = ?deployed.resolved, "Cleared failed migrations during deploy");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,inkstone_ops=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Migrate => run_migrate().await,
        Command::Backup { command } => run_backup(command).await,
        Command::Maintenance { command } => run_maintenance(command).await,
    }
}

use std::env;
use std::path::PathBuf;

use chrono::Duration;

const DEV_ACCESS_SECRET: &str = "dev-access-secret-not-for-production";
const DEV_REFRESH_SECRET: &str = "dev-refresh-secret-not-for-production";

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_access_ttl: Duration,
    pub jwt_refresh_ttl: Duration,
    /// Refuse destructive restores against a database holding real customer data
    pub protect_real_data: bool,
    pub backup_dir: PathBuf,
    /// Passphrase used to derive the backup encryption key
    pub backup_passphrase: Option<String>,
    pub uploads_dir: PathBuf,
    pub pg_dump_bin: String,
    pub pg_restore_bin: String,
    pub tar_bin: String,
    /// Start in (ephemeral) maintenance mode
    pub maintenance_mode: bool,
    pub cors_origin: Option<String>,
    pub cart_sweep_interval: std::time::Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let jwt_access_secret = env::var("JWT_ACCESS_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_ACCESS_SECRET not set, using development secret");
            DEV_ACCESS_SECRET.to_string()
        });

        Ok(Self {
            database_url,
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            jwt_access_secret,
            jwt_refresh_secret: env::var("JWT_REFRESH_SECRET")
                .unwrap_or_else(|_| DEV_REFRESH_SECRET.to_string()),
            jwt_access_ttl: ttl_from_env("JWT_ACCESS_TTL", Duration::minutes(15))?,
            jwt_refresh_ttl: ttl_from_env("JWT_REFRESH_TTL", Duration::days(7))?,
            protect_real_data: flag_from_env("PROTECT_REAL_DATA"),
            backup_dir: env::var("BACKUP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./backups")),
            backup_passphrase: env::var("BACKUP_PASSPHRASE")
                .ok()
                .filter(|p| !p.is_empty()),
            uploads_dir: env::var("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads")),
            pg_dump_bin: env::var("PG_DUMP_BIN").unwrap_or_else(|_| "pg_dump".to_string()),
            pg_restore_bin: env::var("PG_RESTORE_BIN")
                .unwrap_or_else(|_| "pg_restore".to_string()),
            tar_bin: env::var("TAR_BIN").unwrap_or_else(|_| "tar".to_string()),
            maintenance_mode: flag_from_env("MAINTENANCE_MODE"),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|o| o != "*"),
            cart_sweep_interval: std::time::Duration::from_secs(
                env::var("CART_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|s| *s > 0)
                    .unwrap_or(3600),
            ),
        })
    }
}

fn flag_from_env(name: &str) -> bool {
    env::var(name).map(|v| parse_flag(&v)).unwrap_or(false)
}

fn ttl_from_env(name: &str, default: Duration) -> anyhow::Result<Duration> {
    match env::var(name) {
        Ok(raw) => parse_ttl(&raw).ok_or_else(|| anyhow::anyhow!("Invalid {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

/// Parse a boolean flag as written in `.env` files
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse a token lifetime such as `900`, `15m`, `12h` or `7d`
pub fn parse_ttl(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], c),
        _ => (raw, 's'),
    };

    let value: i64 = digits.parse().ok().filter(|v| *v > 0)?;

    match unit {
        's' => Some(Duration::seconds(value)),
        'm' => Some(Duration::minutes(value)),
        'h' => Some(Duration::hours(value)),
        'd' => Some(Duration::days(value)),
        _ => None,
    }
}

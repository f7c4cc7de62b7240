//! Site-wide maintenance switch
//!
//! Effective mode is the in-memory flag OR the persisted setting. The
//! persisted value is cached so the request gate never touches the database.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;

use crate::app::audit_service::AuditService;
use crate::app::validation::optional_text;
use crate::auth::require_role;
use crate::domain::entities::{Role, User};
use crate::domain::ports::{AuditLogRepository, SettingsRepository};
use crate::error::AppError;

/// Settings key of the persisted flag
pub const MAINTENANCE_KEY: &str = "maintenance";

pub const DEFAULT_MESSAGE: &str =
    "The studio system is under maintenance. Please try again shortly.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Flag {
    enabled: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct State {
    ephemeral: Flag,
    persisted: Flag,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceStatus {
    pub enabled: bool,
    pub ephemeral: bool,
    pub persisted: bool,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceRequest {
    pub enabled: bool,
    #[serde(default)]
    pub persist: bool,
    pub message: Option<String>,
}

/// In-memory flag before a restore took it over
#[derive(Debug, Clone)]
pub struct SavedFlag(Flag);

pub struct MaintenanceService<SR, AL>
where
    SR: SettingsRepository,
    AL: AuditLogRepository,
{
    settings: Arc<SR>,
    audit: Arc<AuditService<AL>>,
    state: RwLock<State>,
}

impl<SR, AL> MaintenanceService<SR, AL>
where
    SR: SettingsRepository,
    AL: AuditLogRepository,
{
    pub fn new(settings: Arc<SR>, audit: Arc<AuditService<AL>>, start_enabled: bool) -> Self {
        Self {
            settings,
            audit,
            state: RwLock::new(State {
                ephemeral: Flag {
                    enabled: start_enabled,
                    message: None,
                },
                persisted: Flag::default(),
            }),
        }
    }

    /// Load the persisted flag into the cache
    pub async fn load(&self) -> Result<(), AppError> {
        let persisted = match self.settings.get(MAINTENANCE_KEY).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring malformed maintenance setting");
                Flag::default()
            }),
            None => Flag::default(),
        };
        if persisted.enabled {
            tracing::warn!("Persisted maintenance mode is on");
        }
        self.state.write().await.persisted = persisted;
        Ok(())
    }

    pub async fn status(&self) -> MaintenanceStatus {
        let state = self.state.read().await;
        let message = [&state.ephemeral, &state.persisted]
            .into_iter()
            .filter(|f| f.enabled)
            .find_map(|f| f.message.clone())
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
        MaintenanceStatus {
            enabled: state.ephemeral.enabled || state.persisted.enabled,
            ephemeral: state.ephemeral.enabled,
            persisted: state.persisted.enabled,
            message,
        }
    }

    pub async fn is_enabled(&self) -> bool {
        let state = self.state.read().await;
        state.ephemeral.enabled || state.persisted.enabled
    }

    /// Switch maintenance on or off
    ///
    /// Turning it off clears both the in-memory and the persisted flag.
    pub async fn set(
        &self,
        actor: &User,
        req: MaintenanceRequest,
    ) -> Result<MaintenanceStatus, AppError> {
        require_role(actor, &[Role::Boss])?;
        let flag = Flag {
            enabled: req.enabled,
            message: optional_text(req.message.as_deref()),
        };

        let was_persisted = self.state.read().await.persisted.enabled;
        let write_persisted = req.persist || (!req.enabled && was_persisted);
        if write_persisted {
            let value = serde_json::to_value(&flag)
                .map_err(|e| AppError::Internal(e.to_string()))?;
            self.settings.set(MAINTENANCE_KEY, &value).await?;
        }

        {
            let mut state = self.state.write().await;
            if write_persisted {
                state.persisted = flag.clone();
            }
            if !req.persist || !req.enabled {
                state.ephemeral = flag;
            }
        }

        let status = self.status().await;
        tracing::warn!(
            enabled = status.enabled,
            persisted = status.persisted,
            "Maintenance mode changed"
        );
        self.audit
            .record_by(
                actor,
                "maintenance.set",
                "system_setting",
                MAINTENANCE_KEY,
                json!({"enabled": req.enabled, "persist": req.persist}),
            )
            .await;
        Ok(status)
    }

    /// Force the in-memory flag on and return what it was
    pub async fn enter(&self, message: &str) -> SavedFlag {
        let mut state = self.state.write().await;
        let saved = SavedFlag(state.ephemeral.clone());
        state.ephemeral = Flag {
            enabled: true,
            message: Some(message.to_string()),
        };
        saved
    }

    /// Put back the in-memory flag saved by `enter`
    pub async fn leave(&self, saved: SavedFlag) {
        self.state.write().await.ephemeral = saved.0;
    }
}

//! HTTP client for the Inkstone admin endpoints
//!
//! Backup and maintenance commands need a boss account's access token.

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;

/// HTTP client for communicating with the Inkstone API
#[derive(Clone)]
pub struct InkstoneClient {
    client: reqwest::Client,
    base_url: String,
}

impl InkstoneClient {
    /// Create a new client from environment variables
    ///
    /// Required env vars:
    /// - INKSTONE_API_TOKEN: access token of a boss account
    /// - INKSTONE_API_URL: base URL of the API (defaults to http://localhost:8080)
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("INKSTONE_API_TOKEN").context(
            "INKSTONE_API_TOKEN not set. Sign in as a boss account and export its access token.",
        )?;
        let base_url = std::env::var("INKSTONE_API_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());

        Self::new(&base_url, &token)
    }

    /// Create a new client with explicit configuration
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Invalid access token format")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[cfg(test)]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Export a new encrypted backup
    pub async fn create_backup(&self, kind: &str) -> Result<Value> {
        self.post_json(
            "/admin/backups",
            &CreateBackupRequest {
                kind: kind.to_string(),
            },
        )
        .await
    }

    pub async fn list_backups(&self) -> Result<Value> {
        self.get_json("/admin/backups").await
    }

    /// Restore a stored artifact; the API enters maintenance mode while it runs
    pub async fn restore_backup(&self, name: &str) -> Result<Value> {
        self.post_json(
            &format!("/admin/backups/{}/restore", urlencoding::encode(name)),
            &serde_json::json!({}),
        )
        .await
    }

    /// Stream an artifact to a local file, returning the bytes written
    pub async fn download_backup(&self, name: &str, dest: &Path) -> Result<u64> {
        let path = format!("/admin/backups/{}", urlencoding::encode(name));
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", path))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read backup body")?;
        tokio::fs::write(dest, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        Ok(bytes.len() as u64)
    }

    pub async fn maintenance_status(&self) -> Result<Value> {
        self.get_json("/admin/maintenance").await
    }

    pub async fn set_maintenance(
        &self,
        enabled: bool,
        persist: bool,
        message: Option<&str>,
    ) -> Result<Value> {
        self.post_json(
            "/admin/maintenance",
            &MaintenanceRequest {
                enabled,
                persist,
                message: message.map(|m| m.to_string()),
            },
        )
        .await
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", path))?;

        handle_json_response(response).await
    }

    async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to POST {}", path))?;

        handle_json_response(response).await
    }
}

async fn handle_json_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .await
        .context("Failed to read response body")?;

    if !status.is_success() {
        anyhow::bail!("API error ({}): {}", status, body);
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).context("API returned invalid JSON")
}

// --- Request Types ---

#[derive(Debug, Serialize)]
struct CreateBackupRequest {
    kind: String,
}

#[derive(Debug, Serialize)]
struct MaintenanceRequest {
    enabled: bool,
    persist: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

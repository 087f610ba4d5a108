//! Configuration management for the manual sync.
//!
//! Loads configuration from a TOML file, then applies environment variable
//! overrides (a `.env` file is honoured). Every section has defaults so an
//! empty file is valid; `validate` checks what the selected target needs.

use crate::resilience::retry::RetryConfig;
use crate::utils::errors::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub manuals: ManualsConfig,
    pub sharepoint: SharePointConfig,
    pub sync: SyncConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualsConfig {
    /// Manifest endpoint of the manuals backend
    pub base_url: String,

    /// Optional API key; omitted from requests when empty
    pub api_key: String,

    /// How the API key is sent
    pub api_key_style: ApiKeyStyle,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStyle {
    /// `X-API-KEY: <key>`
    Header,
    /// `Authorization: Bearer <key>`
    Bearer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharePointConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub site_id: String,
    pub drive_id: String,

    /// Graph API base, including the version segment
    pub graph_url: String,

    /// Identity provider base; the tenant is appended
    pub authority_url: String,

    /// List column holding the content hash of the last upload
    pub hash_field: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Top-level folder in the document library
    pub root_folder: String,

    /// Where files are mirrored to
    pub target: Target,

    /// Destination directory when `target = "local"`
    pub local_root: Option<PathBuf>,

    /// Cap on processed files per run (0 = unlimited)
    pub max_files: usize,

    /// Six-field cron expression (seconds first)
    pub schedule: String,

    /// Run once immediately when the scheduler starts
    pub run_on_startup: bool,

    /// Download timeout in seconds
    pub download_timeout_secs: u64,

    /// Value of the `source` metadata field on uploaded files
    pub source_label: String,

    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[value(name = "sharepoint")]
    SharePoint,
    Local,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Extra attempts for transient failures (0 disables retry)
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for ManualsConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            api_key_style: ApiKeyStyle::Header,
            timeout_secs: 30,
        }
    }
}

impl Default for SharePointConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            site_id: String::new(),
            drive_id: String::new(),
            graph_url: "https://graph.microsoft.com/v1.0".to_string(),
            authority_url: "https://login.microsoftonline.com".to_string(),
            hash_field: "contentHash".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root_folder: "Manuals".to_string(),
            target: Target::SharePoint,
            local_root: None,
            max_files: 0,
            schedule: "0 0 * * * *".to_string(),
            run_on_startup: false,
            download_timeout_secs: 60,
            source_label: "ManifestSource".to_string(),
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ManualsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SharePointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SyncConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// The per-run cap, with 0 meaning no cap.
    pub fn max_files(&self) -> Option<usize> {
        (self.max_files > 0).then_some(self.max_files)
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            factor: 2.0,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Overlay values from environment variables. Unset or empty variables
    /// leave the file value untouched.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = var("MANUALS_API_BASE_URL") {
            self.manuals.base_url = v;
        }
        if let Some(v) = var("MANUALS_API_KEY") {
            self.manuals.api_key = v;
        }
        if let Some(v) = var("TENANT_ID") {
            self.sharepoint.tenant_id = v;
        }
        if let Some(v) = var("CLIENT_ID") {
            self.sharepoint.client_id = v;
        }
        if let Some(v) = var("CLIENT_SECRET") {
            self.sharepoint.client_secret = v;
        }
        if let Some(v) = var("SHAREPOINT_SITE_ID") {
            self.sharepoint.site_id = v;
        }
        if let Some(v) = var("SHAREPOINT_DRIVE_ID") {
            self.sharepoint.drive_id = v;
        }
        if let Some(v) = var("SYNC_SCHEDULE") {
            self.sync.schedule = v;
        }
        if let Some(n) = var("SYNC_MAX_FILES").and_then(|v| v.parse().ok()) {
            self.sync.max_files = n;
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.log.level = v;
        }
    }

    /// Check that everything the selected target needs is present.
    pub fn validate(&self) -> Result<()> {
        if self.manuals.base_url.trim().is_empty() {
            return Err(SyncError::Config(
                "manuals.base_url (MANUALS_API_BASE_URL) is required".into(),
            ));
        }
        if self.sync.root_folder.trim_matches('/').is_empty() {
            return Err(SyncError::Config("sync.root_folder must not be empty".into()));
        }

        match self.sync.target {
            Target::SharePoint => {
                let sp = &self.sharepoint;
                if sp.tenant_id.is_empty() || sp.client_id.is_empty() || sp.client_secret.is_empty() {
                    return Err(SyncError::Config(
                        "TENANT_ID, CLIENT_ID and CLIENT_SECRET are required".into(),
                    ));
                }
                if sp.site_id.is_empty() || sp.drive_id.is_empty() {
                    return Err(SyncError::Config(
                        "SHAREPOINT_SITE_ID and SHAREPOINT_DRIVE_ID are required".into(),
                    ));
                }
                if sp.hash_field.is_empty() {
                    return Err(SyncError::Config("sharepoint.hash_field must not be empty".into()));
                }
            }
            Target::Local => {
                if self.sync.local_root.is_none() {
                    return Err(SyncError::Config(
                        "sync.local_root is required when target is local".into(),
                    ));
                }
            }
            Target::Memory => {}
        }

        Ok(())
    }
}

//! Configuration loading for HOK Admin
//!
//! Configuration is loaded from a TOML file, with defaults that point at
//! the production storefront API. The base URL can be overridden from the
//! environment without touching the file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::AdminError;

/// Environment variable that overrides `api.base_url`
pub const BASE_URL_ENV: &str = "HOK_ADMIN_BASE_URL";

/// Production API address used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "https://api.hokstore.com";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend API configuration
    pub api: ApiConfig,
    /// Revalidating fetch cache configuration
    pub fetch: FetchConfig,
    /// Image host configuration
    pub upload: UploadConfig,
    /// Local persistence configuration
    pub storage: StorageConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base address every request path is joined onto
    pub base_url: String,
    /// Request timeout in seconds (unset = transport default)
    pub timeout_secs: Option<u64>,
    /// Whether a 401/403 response wipes stored credentials
    pub clear_credentials_on_auth_failure: bool,
    /// Page size for list endpoints
    pub page_limit: u32,
}

/// Revalidating fetch cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Retries after the first failed attempt
    pub retry_count: u32,
    /// Fixed delay between attempts in milliseconds
    pub retry_interval_ms: u64,
    /// Revalidate mounted keys when focus is regained
    pub revalidate_on_focus: bool,
    /// Revalidate a key when it is mounted
    pub revalidate_on_mount: bool,
}

/// Image host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Upload endpoint root (cloud name is appended)
    pub endpoint: String,
    /// Image host cloud name
    pub cloud_name: String,
    /// Unsigned upload preset
    pub upload_preset: String,
}

/// Local persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory backing the durable key/value store
    pub data_dir: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
            clear_credentials_on_auth_failure: false,
            page_limit: 20,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_interval_ms: 30_000,
            revalidate_on_focus: true,
            revalidate_on_mount: true,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.cloudinary.com/v1_1".to_string(),
            cloud_name: "dwfvec1ne".to_string(),
            upload_preset: "hok-files".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .map(|d| d.join("hok-admin"))
                .unwrap_or_else(|| PathBuf::from(".hok-admin")),
        }
    }
}

impl UploadConfig {
    /// Full upload URL for the configured cloud
    pub fn upload_url(&self) -> String {
        format!(
            "{}/{}/image/upload",
            self.endpoint.trim_end_matches('/'),
            self.cloud_name
        )
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults, then apply
    /// environment overrides
    pub fn load(path: Option<&PathBuf>) -> Result<Self, AdminError> {
        let config_path = path.cloned().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|d| d.join("hok-admin").join("config.toml"))
                .unwrap_or_else(|| PathBuf::from("hok-admin.toml"))
        });

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .map_err(|e| AdminError::Config(format!("failed to read config: {e}")))?;
            toml::from_str(&contents)
                .map_err(|e| AdminError::Config(format!("failed to parse config: {e}")))?
        } else {
            tracing::info!("no config file found at {}, using defaults", config_path.display());
            Config::default()
        };

        config.apply_env(std::env::var(BASE_URL_ENV).ok());
        Ok(config)
    }

    /// Apply the base URL override, ignoring blank values
    pub fn apply_env(&mut self, base_url: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            tracing::debug!(base_url = %url, "base url overridden from environment");
            self.api.base_url = url;
        }
    }

    /// Get request timeout as Duration, if configured
    pub fn request_timeout(&self) -> Option<Duration> {
        self.api.timeout_secs.map(Duration::from_secs)
    }

    /// Get the retry interval as Duration
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.fetch.retry_interval_ms)
    }
}

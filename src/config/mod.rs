use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};
use url::Url;

// Default configuration values
const DEFAULT_API_URL: &str = "http://localhost:8000/api/";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_LOGIN_PATH: &str = "accounts/token/";
const DEFAULT_REFRESH_PATH: &str = "token/refresh/";
const DEFAULT_PROFILE_PATH: &str = "accounts/users/me/";
const DEFAULT_REGISTER_PATH: &str = "accounts/register/";
const APP_DIR: &str = "erp-client";

/// Main configuration struct for the client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Session persistence configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is resolved against
    #[serde(default = "default_api_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Token obtain endpoint, relative to the base URL
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Token refresh endpoint, relative to the base URL
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Current user profile endpoint
    #[serde(default = "default_profile_path")]
    pub profile_path: String,
    /// Account registration endpoint
    #[serde(default = "default_register_path")]
    pub register_path: String,
}

/// Session persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// File holding the persisted session
    #[serde(default = "default_session_path")]
    pub store_path: PathBuf,
}

// Default functions
fn default_api_url() -> String {
    std::env::var("ERP_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string())
}

fn default_timeout() -> u64 {
    std::env::var("ERP_API_TIMEOUT_SECONDS")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS)
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_profile_path() -> String {
    DEFAULT_PROFILE_PATH.to_string()
}

fn default_register_path() -> String {
    DEFAULT_REGISTER_PATH.to_string()
}

fn default_session_path() -> PathBuf {
    std::env::var("ERP_SESSION_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| app_dir().join("session.json"))
}

/// Per-user directory for client files, falling back to the working directory
fn app_dir() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".config").join(APP_DIR),
        Err(_) => PathBuf::from("."),
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_seconds: default_timeout(),
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            profile_path: default_profile_path(),
            register_path: default_register_path(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_path: default_session_path(),
        }
    }
}

impl ApiConfig {
    /// Config pointing at `base_url` with default endpoints
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Parse the base URL, making sure it ends in `/` so joins append
    pub fn parsed_base_url(&self) -> Result<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw).map_err(|e| anyhow!("Invalid base URL '{}': {}", self.base_url, e))?;
        if url.cannot_be_a_base() {
            return Err(anyhow!("Base URL '{}' cannot carry paths", self.base_url));
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Load the client configuration, creating a default file on first run
pub async fn load_config() -> Result<Config> {
    let config_path = get_config_path();
    load_or_create_config(&config_path).await
}

/// Get the path to the configuration file
pub fn get_config_path() -> PathBuf {
    // Check for explicit config path from environment
    if let Ok(path) = std::env::var("ERP_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    app_dir().join("config.json")
}

/// Load configuration from file or create default
pub async fn load_or_create_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        let default_config = Config::default();
        save_config(path, &default_config).await?;
        info!("Created default configuration at {}", path.display());
        return Ok(default_config);
    }

    let config_str = fs::read_to_string(path).await?;
    let config: Config = serde_json::from_str(&config_str)
        .map_err(|e| anyhow!("Failed to parse configuration at {}: {}", path.display(), e))?;
    debug!("Loaded configuration from {}", path.display());

    // Reject a bad base URL at load time rather than on the first request
    config.api.parsed_base_url()?;
    Ok(config)
}

/// Save configuration to file
pub async fn save_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let config_str = serde_json::to_string_pretty(config)?;
    fs::write(path, config_str).await?;
    debug!("Saved configuration to {}", path.display());

    Ok(())
}

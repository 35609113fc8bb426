//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WAYPOST_*)
//! 2. TOML config file (if WAYPOST_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WAYPOST_*)
/// 2. TOML config file (if WAYPOST_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding cache containers and the queue.
    ///
    /// Set via WAYPOST_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Backend origin that request paths are resolved against.
    ///
    /// Set via WAYPOST_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Cache version; containers are named `<kind>-<cache_version>`.
    ///
    /// Set via WAYPOST_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via WAYPOST_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body bytes buffered per fetch.
    ///
    /// Set via WAYPOST_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via WAYPOST_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Path prefix routed through the API policy table.
    ///
    /// Set via WAYPOST_API_PREFIX environment variable.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Precached page served to navigations when offline.
    ///
    /// Set via WAYPOST_OFFLINE_PATH environment variable.
    #[serde(default = "default_offline_path")]
    pub offline_path: String,

    /// Paths fetched into the static container at install.
    ///
    /// Set via WAYPOST_PRECACHE environment variable.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Freshness hint for GET requests no policy matches.
    ///
    /// Set via WAYPOST_DEFAULT_MAX_AGE_SECS environment variable.
    #[serde(default = "default_max_age_secs")]
    pub default_max_age_secs: u64,

    /// Share one network fetch between concurrent reads of the same request.
    ///
    /// Set via WAYPOST_COALESCE_FETCHES environment variable.
    #[serde(default = "default_true")]
    pub coalesce_fetches: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./waypost.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_user_agent() -> String {
    "waypost/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_offline_path() -> String {
    "/offline.html".into()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/offline.html",
        "/manifest.json",
        "/dashboard/classes-v2",
        "/dashboard/classes-v2/containers",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_age_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_version: default_cache_version(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            api_prefix: default_api_prefix(),
            offline_path: default_offline_path(),
            precache: default_precache(),
            default_max_age_secs: default_max_age_secs(),
            coalesce_fetches: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WAYPOST_`
    /// 2. TOML file from `WAYPOST_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("WAYPOST_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("WAYPOST_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

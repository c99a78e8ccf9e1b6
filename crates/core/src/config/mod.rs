//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (NIMBUS_*)
//! 2. TOML config file (if NIMBUS_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::cache::PartitionNames;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (NIMBUS_*)
/// 2. TOML config file (if NIMBUS_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database backing the cache partitions.
    ///
    /// Set via NIMBUS_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Absolute URL the worker controls; relative manifest entries resolve against it.
    ///
    /// Set via NIMBUS_SCOPE environment variable.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Name prefix shared by every partition the application owns.
    ///
    /// Set via NIMBUS_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag embedded in the current partition names.
    ///
    /// Set via NIMBUS_CACHE_VERSION environment variable. Bumping it makes
    /// the next activation evict every partition of the previous version.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Static asset manifest pre-cached at install.
    ///
    /// Set via NIMBUS_PRECACHE environment variable (comma-separated).
    #[serde(default = "default_precache", deserialize_with = "comma_list")]
    pub precache: Vec<String>,

    /// Application shell returned to offline navigations.
    ///
    /// Set via NIMBUS_SHELL_DOCUMENT environment variable.
    #[serde(default = "default_shell_document")]
    pub shell_document: String,

    /// URL substrings that bypass interception entirely.
    ///
    /// Set via NIMBUS_NEVER_CACHE environment variable (comma-separated).
    #[serde(default = "default_never_cache", deserialize_with = "comma_list")]
    pub never_cache: Vec<String>,

    /// User-Agent string for network requests.
    ///
    /// Set via NIMBUS_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    ///
    /// Set via NIMBUS_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body size in bytes.
    ///
    /// Set via NIMBUS_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Title used when a push payload carries none.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,

    /// Body used when a push payload carries none.
    #[serde(default = "default_notification_body")]
    pub notification_body: String,
}

/// Accept either a sequence or a single comma-separated string.
fn comma_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let items = match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    };

    Ok(items
        .iter()
        .flat_map(|item| item.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./nimbus-cache.sqlite")
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_cache_prefix() -> String {
    "weather-app-".into()
}

fn default_cache_version() -> String {
    "v1.2".into()
}

fn default_precache() -> Vec<String> {
    ["./", "./app.html", "./styles.css", "./script.js", "./manifest.json"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_shell_document() -> String {
    "./app.html".into()
}

fn default_never_cache() -> Vec<String> {
    vec!["/api/analytics".into(), "/api/tracking".into()]
}

fn default_user_agent() -> String {
    "nimbus-sw/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_notification_title() -> String {
    "Weather".into()
}

fn default_notification_body() -> String {
    "New weather information is available".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            scope: default_scope(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            precache: default_precache(),
            shell_document: default_shell_document(),
            never_cache: default_never_cache(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            notification_title: default_notification_title(),
            notification_body: default_notification_body(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Partition naming scheme for the configured prefix and version.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the prefix or version is empty.
    pub fn partition_names(&self) -> Result<PartitionNames, ConfigError> {
        PartitionNames::new(&self.cache_prefix, &self.cache_version)
            .map_err(|e| ConfigError::Invalid { field: "cache_prefix".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `NIMBUS_`
    /// 2. TOML file from `NIMBUS_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("NIMBUS_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("NIMBUS_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

//! Proxy configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OUTPOST_*)
//! 2. TOML config file (if OUTPOST_CONFIG_FILE set)
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

/// Proxy configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OUTPOST_*)
/// 2. TOML config file (if OUTPOST_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Tag identifying the store generation this build owns.
    ///
    /// Embedded at build/deploy time; a new tag triggers a fresh
    /// install/activate cycle that supersedes the previous generation.
    #[serde(default = "default_version_tag")]
    pub store_version_tag: String,

    /// Application origin used to resolve relative manifest paths and as the
    /// base for shell requests.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Ordered list of URLs precached at install time.
    ///
    /// Items may be relative to `origin` or absolute (CDN assets).
    #[serde(default)]
    pub manifest: Vec<String>,

    /// Path prefixes routed around the store entirely (ApiPassthrough).
    #[serde(default = "default_api_prefixes")]
    pub api_path_prefixes: Vec<String>,

    /// Regex patterns marking image paths (ImageCacheFirst).
    #[serde(default = "default_image_patterns")]
    pub image_path_patterns: Vec<String>,

    /// Path to the SQLite store database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_version_tag() -> String {
    "dev".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_api_prefixes() -> Vec<String> {
    vec!["/api/".into()]
}

fn default_image_patterns() -> Vec<String> {
    vec!["^/assets/".into()]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./outpost-store.sqlite")
}

fn default_user_agent() -> String {
    "outpost/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            store_version_tag: default_version_tag(),
            origin: default_origin(),
            manifest: Vec::new(),
            api_path_prefixes: default_api_prefixes(),
            image_path_patterns: default_image_patterns(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ProxyConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OUTPOST_`
    /// 2. TOML file from `OUTPOST_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("OUTPOST_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OUTPOST_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PAGEFLOW_*)
//! 2. TOML config file (if PAGEFLOW_CONFIG_FILE set)
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
/// 1. Environment variables (PAGEFLOW_*), nested sections split on `__`
/// 2. TOML config file (if PAGEFLOW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Prefix put in front of every session store key.
    ///
    /// Set via PAGEFLOW_NAMESPACE environment variable.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Path to the SQLite session store. In-memory when unset.
    ///
    /// Set via PAGEFLOW_DB_PATH environment variable.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub geometry: GeometryConfig,

    #[serde(default)]
    pub fetch: FetchSettings,
}

/// Timing knobs for the signature scheduler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// Poll delay used for window boundaries while the page is not rendering.
    ///
    /// Set via PAGEFLOW_SCHEDULER__FALLBACK_POLL_MS.
    #[serde(default = "default_frame_ms")]
    pub fallback_poll_ms: u64,

    /// Paint interval of the built-in interval frame source.
    ///
    /// Set via PAGEFLOW_SCHEDULER__FRAME_INTERVAL_MS.
    #[serde(default = "default_frame_ms")]
    pub frame_interval_ms: u64,
}

/// Viewport extension parameters for the visibility evaluator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeometryConfig {
    /// Fraction of the viewport size added on every side of the viewport.
    #[serde(default = "default_extension")]
    pub viewport_extension: f64,

    /// Fraction of the viewport size added around the extended viewport
    /// to form the outer limit.
    #[serde(default = "default_extension")]
    pub outside_limit_extension: f64,

    /// Minimum outer limit growth in pixels.
    #[serde(default = "default_outside_limit_floor_px")]
    pub outside_limit_floor_px: f64,
}

/// HTTP settings for the fetch client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// User-Agent string for HTTP requests.
    ///
    /// Set via PAGEFLOW_FETCH__USER_AGENT.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_namespace() -> String {
    "pageflow:".into()
}

fn default_frame_ms() -> u64 {
    16
}

fn default_extension() -> f64 {
    0.5
}

fn default_outside_limit_floor_px() -> f64 {
    500.0
}

fn default_user_agent() -> String {
    "pageflow/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { fallback_poll_ms: default_frame_ms(), frame_interval_ms: default_frame_ms() }
    }
}

impl SchedulerConfig {
    pub fn fallback_poll(&self) -> Duration {
        Duration::from_millis(self.fallback_poll_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            viewport_extension: default_extension(),
            outside_limit_extension: default_extension(),
            outside_limit_floor_px: default_outside_limit_floor_px(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self { user_agent: default_user_agent(), max_bytes: default_max_bytes(), timeout_ms: default_timeout_ms() }
    }
}

impl FetchSettings {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            db_path: None,
            scheduler: SchedulerConfig::default(),
            geometry: GeometryConfig::default(),
            fetch: FetchSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PAGEFLOW_`
    /// 2. TOML file from `PAGEFLOW_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PAGEFLOW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("PAGEFLOW_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

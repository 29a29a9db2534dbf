//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `namespace` is empty
    /// - a scheduler interval is 0 or exceeds one second
    /// - a geometry fraction is negative or not finite
    /// - `fetch.max_bytes` is 0 or exceeds 50MB
    /// - `fetch.timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `fetch.user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(invalid("namespace", "must not be empty"));
        }

        for (field, value) in [
            ("scheduler.fallback_poll_ms", self.scheduler.fallback_poll_ms),
            ("scheduler.frame_interval_ms", self.scheduler.frame_interval_ms),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
            if value > 1_000 {
                return Err(invalid(field, "must not exceed 1000ms"));
            }
        }

        for (field, value) in [
            ("geometry.viewport_extension", self.geometry.viewport_extension),
            ("geometry.outside_limit_extension", self.geometry.outside_limit_extension),
            ("geometry.outside_limit_floor_px", self.geometry.outside_limit_floor_px),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, "must be a finite, non-negative number"));
            }
        }

        if self.fetch.max_bytes == 0 {
            return Err(invalid("fetch.max_bytes", "must be greater than 0"));
        }
        if self.fetch.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("fetch.max_bytes", "must not exceed 50MB"));
        }

        if self.fetch.timeout_ms < 100 {
            return Err(invalid("fetch.timeout_ms", "must be at least 100ms"));
        }
        if self.fetch.timeout_ms > 300_000 {
            return Err(invalid("fetch.timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.fetch.user_agent.is_empty() {
            return Err(invalid("fetch.user_agent", "must not be empty"));
        }

        if self.scheduler.fallback_poll_ms > self.scheduler.frame_interval_ms * 4 {
            tracing::warn!(
                fallback_poll_ms = self.scheduler.fallback_poll_ms,
                frame_interval_ms = self.scheduler.frame_interval_ms,
                "Fallback poll is much slower than the frame interval; \
                 background windows will stretch noticeably"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchSettings, GeometryConfig, SchedulerConfig};

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_namespace() {
        let config = AppConfig { namespace: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "namespace"));
    }

    #[test]
    fn test_validate_zero_poll() {
        let config =
            AppConfig { scheduler: SchedulerConfig { fallback_poll_ms: 0, frame_interval_ms: 16 }, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "scheduler.fallback_poll_ms"));
    }

    #[test]
    fn test_validate_negative_extension() {
        let config = AppConfig {
            geometry: GeometryConfig { outside_limit_extension: -0.1, ..Default::default() },
            ..Default::default()
        };
        let result = config.validate();
        assert!(
            matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "geometry.outside_limit_extension")
        );
    }

    #[test]
    fn test_validate_nan_floor() {
        let config = AppConfig {
            geometry: GeometryConfig { outside_limit_floor_px: f64::NAN, ..Default::default() },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { fetch: FetchSettings { max_bytes: 0, ..Default::default() }, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "fetch.max_bytes"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { fetch: FetchSettings { timeout_ms: 50, ..Default::default() }, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "fetch.timeout_ms"));

        let config =
            AppConfig { fetch: FetchSettings { timeout_ms: 301_000, ..Default::default() }, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "fetch.timeout_ms"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig {
            scheduler: SchedulerConfig { fallback_poll_ms: 1, frame_interval_ms: 1 },
            geometry: GeometryConfig { viewport_extension: 0.0, outside_limit_extension: 0.0, outside_limit_floor_px: 0.0 },
            fetch: FetchSettings { max_bytes: 1, timeout_ms: 100, ..Default::default() },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}

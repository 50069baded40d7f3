//! # Configuration
//!
//! Compiler settings loaded from the environment and validated with the
//! `validator` crate.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::errors::{Error, Result};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Route compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CompilerConfig {
    /// Trust domain used to qualify authorization principals
    #[validate(length(min = 1, message = "Trust domain cannot be empty"))]
    pub trust_domain: String,

    /// Inject workload stats headers into inbound responses
    pub enable_stats_headers: bool,

    /// Default log level when `RUST_LOG` is unset
    #[validate(custom(function = "validate_log_level"))]
    pub log_level: String,

    /// Emit logs as JSON
    pub json_logging: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            trust_domain: "cluster.local".to_string(),
            enable_stats_headers: false,
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

impl CompilerConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let trust_domain =
            std::env::var("MESHPLANE_TRUST_DOMAIN").unwrap_or(defaults.trust_domain);

        let enable_stats_headers = match std::env::var("MESHPLANE_ENABLE_STATS_HEADERS") {
            Ok(value) => parse_bool("MESHPLANE_ENABLE_STATS_HEADERS", &value)?,
            Err(_) => defaults.enable_stats_headers,
        };

        let log_level = std::env::var("MESHPLANE_LOG_LEVEL")
            .map(|level| level.to_lowercase())
            .unwrap_or(defaults.log_level);

        let json_logging = match std::env::var("MESHPLANE_JSON_LOGGING") {
            Ok(value) => parse_bool("MESHPLANE_JSON_LOGGING", &value)?,
            Err(_) => defaults.json_logging,
        };

        let config = Self { trust_domain, enable_stats_headers, log_level, json_logging };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::config(format!("Invalid boolean for {}: '{}'", name, other))),
    }
}

fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level) {
        Ok(())
    } else {
        let mut error = ValidationError::new("log_level");
        error.message = Some(format!("Unknown log level '{}'", level).into());
        Err(error)
    }
}

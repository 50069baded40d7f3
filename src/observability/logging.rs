//! # Structured Logging
//!
//! Subscriber setup and span macros for the route compiler, built on the
//! tracing ecosystem.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::CompilerConfig;
use crate::errors::{Error, Result};

/// Create a tracing span around one route compilation.
///
/// ```rust,ignore
/// let span = compile_span!("bookbuyer.default");
/// let span = compile_span!("bookbuyer.default", inbound_ports = 2);
/// ```
#[macro_export]
macro_rules! compile_span {
    ($proxy:expr) => {
        tracing::info_span!("rds_compile", proxy = %$proxy)
    };
    ($proxy:expr, $($field:tt)*) => {
        tracing::info_span!("rds_compile", proxy = %$proxy, $($field)*)
    };
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Fails when a global subscriber
/// is already installed.
pub fn init_logging(config: &CompilerConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::config(format!("Invalid log filter: {}", e)))?;

    let result = if config.json_logging {
        tracing::subscriber::set_global_default(
            FmtSubscriber::builder().with_env_filter(filter).json().finish(),
        )
    } else {
        tracing::subscriber::set_global_default(
            FmtSubscriber::builder().with_env_filter(filter).finish(),
        )
    };

    result.map_err(|e| Error::config(format!("Failed to initialize logging: {}", e)))
}

/// Log configuration at startup
pub fn log_config_info(config: &CompilerConfig) {
    tracing::info!(
        trust_domain = %config.trust_domain,
        stats_headers_enabled = %config.enable_stats_headers,
        log_level = %config.log_level,
        json_logging = %config.json_logging,
        "Route compiler configuration"
    );
}

//! # Observability Infrastructure
//!
//! Structured logging for the route compiler.

pub mod logging;

pub use logging::{init_logging, log_config_info};

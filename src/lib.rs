//! # Meshplane
//!
//! Meshplane compiles service mesh traffic policy into Envoy RDS
//! `RouteConfiguration` resources. Given the policies resolved for one proxy
//! (inbound and outbound per port, ingress, egress per port) it produces the
//! ordered route configurations that proxy should receive.
//!
//! ## Architecture
//!
//! ```text
//! Policy model → Filter builders → Route builders → RoutesBuilder → RDS resources
//!  (domain)     (xds::filters)     (xds::route)   (xds::route_config) (xds::resources)
//! ```
//!
//! Compilation is a pure transform. Invalid policy never fails a build: the
//! affected route or filter is dropped and the problem is logged.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use meshplane::{domain::PolicySnapshot, config::CompilerConfig, xds::route_resources};
//!
//! fn main() -> meshplane::Result<()> {
//!     let config = CompilerConfig::from_env()?;
//!     let snapshot = PolicySnapshot::from_path("snapshot.yaml")?;
//!     let route_configs = snapshot.into_builder(&config).build();
//!     let resources = route_resources(&route_configs);
//!     println!("{} route configurations", resources.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod xds;

// Re-export commonly used types
pub use config::CompilerConfig;
pub use errors::{Error, Result};
pub use observability::init_logging;
pub use xds::RoutesBuilder;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

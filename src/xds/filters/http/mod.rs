//! HTTP filter builders
//!
//! Per-route and per-virtual-host filter configuration is keyed by the
//! canonical Envoy filter name the listener's HTTP connection manager uses.

pub mod local_rate_limit;
pub mod rate_limit;
pub mod rbac;

/// Envoy's canonical RBAC filter name
pub const RBAC_FILTER_NAME: &str = "envoy.filters.http.rbac";

/// Envoy's canonical local rate limit filter name
pub const LOCAL_RATE_LIMIT_FILTER_NAME: &str = "envoy.filters.http.local_ratelimit";

pub use local_rate_limit::{local_rate_limit_any, LocalRateLimitConfig, LOCAL_RATE_LIMIT_TYPE_URL};
pub use rate_limit::{header_matchers, optional_rate_limits, rate_limits};
pub use rbac::{inbound_rbac_for_rule, RbacPerRouteConfig, RBAC_PER_ROUTE_TYPE_URL};

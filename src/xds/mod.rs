//! Envoy xDS route compilation
//!
//! Compiles traffic policies into RDS (Route Discovery Service) resources:
//! - [`route`]: per-route builders shared by every traffic shape
//! - [`route_config`]: the [`RoutesBuilder`] assembling route configurations
//! - [`filters`]: per-route and per-virtual-host HTTP filter configuration
//! - [`resources`]: `Any` encoding and discovery response packaging

pub mod filters;
pub mod resources;
pub mod route;
pub mod route_config;

pub use resources::{
    discovery_response, encode_route_configuration, resources_version, route_resources,
    BuiltResource, ROUTE_CONFIGURATION_TYPE_URL,
};
pub use route::{sanitize_http_methods, RouteContext, RouteShape};
pub use route_config::{
    egress_route_config_name, inbound_route_config_name, outbound_route_config_name,
    RoutesBuilder, INGRESS_ROUTE_CONFIG_NAME,
};

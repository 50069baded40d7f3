//! # Domain Layer
//!
//! The traffic policy model consumed by the route compiler. Types here are
//! read-only inputs: they are built by upstream policy resolution (or loaded
//! from a snapshot file), handed to the compiler and never mutated by it.
//!
//! ## Modules
//!
//! - `route`: route matches, weighted clusters, retry policies and rules
//! - `rate_limit`: local token bucket and global descriptor rate limits
//! - `traffic_policy`: inbound, outbound and egress policies plus merge helpers
//! - `proxy`: the proxy a compilation targets and its stats headers
//! - `snapshot`: serializable bundle of every policy resolved for a proxy

pub mod proxy;
pub mod rate_limit;
pub mod route;
pub mod snapshot;
pub mod traffic_policy;

pub use proxy::{qualify_principal, PodMetadata, Proxy, ServiceIdentity};
pub use rate_limit::{
    DescriptorEntry, GlobalRateLimitSpec, HeaderMatcherSpec, HeaderPredicate, HeaderValue,
    LocalRateLimitSpec, PerRouteRateLimitSpec, RateLimitDescriptor, RateLimitSpec,
};
pub use route::{
    HttpRouteMatch, PathMatchKind, RetryPolicySpec, RouteWeightedClusters, Rule, WeightedCluster,
    REGEX_MATCH_ALL, WILDCARD_HTTP_METHOD, WILDCARD_PRINCIPAL,
};
pub use snapshot::PolicySnapshot;
pub use traffic_policy::{
    merge_inbound_policies, merge_route_weighted_clusters, merge_rules, EgressHttpRouteConfig,
    EgressHttpRoutingRule, InboundTrafficPolicy, OutboundTrafficPolicy,
};

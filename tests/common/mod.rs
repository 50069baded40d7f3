//! Common test utilities for all integration tests.
//!
//! Provides policy fixtures and helpers for inspecting compiled routes.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use envoy_types::pb::envoy::config::route::v3::{
    header_matcher::HeaderMatchSpecifier, route::Action, route_action::ClusterSpecifier,
    route_match::PathSpecifier, Route, RouteConfiguration,
};
use meshplane::domain::{
    EgressHttpRouteConfig, EgressHttpRoutingRule, HttpRouteMatch, InboundTrafficPolicy,
    OutboundTrafficPolicy, RouteWeightedClusters, Rule, WeightedCluster,
};

pub const TRUST_DOMAIN: &str = "cluster.local";

/// Single-cluster route for `path` and `methods`
pub fn route<I, S>(path: &str, methods: I, cluster: &str) -> RouteWeightedClusters
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RouteWeightedClusters::new(
        HttpRouteMatch::regex(path, methods),
        vec![WeightedCluster::new(cluster, 100)],
    )
}

/// The bookstore inbound policy: one `GET /buy` rule open to every caller
pub fn bookstore_inbound() -> InboundTrafficPolicy {
    InboundTrafficPolicy::new(
        "bookstore-v1.default.svc.cluster.local",
        ["bookstore-v1.default.svc.cluster.local"],
    )
    .with_rule(Rule::new(route("/buy", ["GET"], "bookstore-v1|80"), ["*"]))
}

pub fn bookstore_outbound() -> OutboundTrafficPolicy {
    let mut policy = OutboundTrafficPolicy::new(
        "bookstore.default",
        ["bookstore", "bookstore.default", "bookstore.default.svc.cluster.local"],
    );
    policy
        .add_route(
            HttpRouteMatch::wildcard(),
            None,
            vec![
                WeightedCluster::new("default/bookstore-v1|80", 90),
                WeightedCluster::new("default/bookstore-v2|80", 10),
            ],
        )
        .expect("add outbound route");
    policy
}

pub fn github_egress() -> EgressHttpRouteConfig {
    EgressHttpRouteConfig {
        name: "github.com".into(),
        hostnames: vec!["github.com".into()],
        routing_rules: vec![EgressHttpRoutingRule {
            route: route("/repos", ["GET", "POST"], "github.com:443"),
            allowed_destination_ip_ranges: vec!["140.82.112.0/20".into()],
        }],
    }
}

pub fn config_names(configs: &[RouteConfiguration]) -> Vec<&str> {
    configs.iter().map(|config| config.name.as_str()).collect()
}

/// Regex the route matches `:method` against
pub fn method_regex(route: &Route) -> Option<&str> {
    let route_match = route.r#match.as_ref()?;
    route_match.headers.iter().find(|header| header.name == ":method").and_then(|header| {
        match &header.header_match_specifier {
            Some(HeaderMatchSpecifier::SafeRegexMatch(regex)) => Some(regex.regex.as_str()),
            _ => None,
        }
    })
}

/// Path regex of a safe-regex route
pub fn path_regex(route: &Route) -> Option<&str> {
    match route.r#match.as_ref()?.path_specifier.as_ref()? {
        PathSpecifier::SafeRegex(regex) => Some(regex.regex.as_str()),
        _ => None,
    }
}

/// Total weight and cluster names of a weighted-cluster route
#[allow(deprecated)]
pub fn weighted_clusters(route: &Route) -> Option<(u32, Vec<String>)> {
    let Some(Action::Route(action)) = route.action.as_ref() else {
        return None;
    };
    match action.cluster_specifier.as_ref()? {
        ClusterSpecifier::WeightedClusters(weighted) => Some((
            weighted.total_weight.as_ref().map(|total| total.value).unwrap_or_default(),
            weighted.clusters.iter().map(|cluster| cluster.name.clone()).collect(),
        )),
        _ => None,
    }
}

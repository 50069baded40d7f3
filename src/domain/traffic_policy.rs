//! Per-shape traffic policies
//!
//! Each policy becomes one virtual host. Inbound and ingress policies carry
//! authorization rules, outbound policies carry destination routes and egress
//! configs carry routing rules towards destinations outside the mesh.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::rate_limit::RateLimitSpec;
use super::route::{HttpRouteMatch, RetryPolicySpec, RouteWeightedClusters, Rule, WeightedCluster};
use crate::errors::{Error, Result};

/// Policy for traffic arriving at services behind the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundTrafficPolicy {
    pub name: String,

    #[serde(default)]
    pub hostnames: Vec<String>,

    #[serde(default)]
    pub rules: Vec<Rule>,

    /// Limits applied to the whole virtual host
    #[serde(default)]
    pub rate_limit: Option<RateLimitSpec>,
}

impl InboundTrafficPolicy {
    pub fn new<I, S>(name: impl Into<String>, hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            hostnames: hostnames.into_iter().map(Into::into).collect(),
            rules: Vec::new(),
            rate_limit: None,
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitSpec) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }
}

/// Policy for traffic leaving the proxy towards mesh destinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundTrafficPolicy {
    pub name: String,

    #[serde(default)]
    pub hostnames: Vec<String>,

    #[serde(default)]
    pub routes: Vec<RouteWeightedClusters>,
}

impl OutboundTrafficPolicy {
    pub fn new<I, S>(name: impl Into<String>, hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            hostnames: hostnames.into_iter().map(Into::into).collect(),
            routes: Vec::new(),
        }
    }

    /// Add a route for `route_match`.
    ///
    /// Re-adding an existing match with the same clusters only replaces its
    /// retry policy. Re-adding it with different clusters is a conflict.
    pub fn add_route(
        &mut self,
        route_match: HttpRouteMatch,
        retry_policy: Option<RetryPolicySpec>,
        weighted_clusters: Vec<WeightedCluster>,
    ) -> Result<()> {
        let candidate = RouteWeightedClusters::new(route_match, weighted_clusters);

        if let Some(existing) =
            self.routes.iter_mut().find(|route| route.route_match == candidate.route_match)
        {
            if existing.same_clusters(&candidate) {
                existing.retry_policy = retry_policy;
                return Ok(());
            }
            return Err(Error::conflict(format!(
                "route for path '{}' already exists with different clusters in outbound policy '{}'",
                existing.route_match.path, self.name
            )));
        }

        self.routes.push(RouteWeightedClusters { retry_policy, ..candidate });
        Ok(())
    }
}

/// Routing rule for HTTP traffic to a destination outside the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EgressHttpRoutingRule {
    pub route: RouteWeightedClusters,

    /// CIDR ranges the destination may resolve to
    #[serde(default)]
    pub allowed_destination_ip_ranges: Vec<String>,
}

/// HTTP egress configuration for one destination host set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EgressHttpRouteConfig {
    pub name: String,

    #[serde(default)]
    pub hostnames: Vec<String>,

    #[serde(default)]
    pub routing_rules: Vec<EgressHttpRoutingRule>,
}

/// Whether two routes are the same route, comparing clusters as sets
fn same_route(a: &RouteWeightedClusters, b: &RouteWeightedClusters) -> bool {
    a.route_match == b.route_match
        && a.same_clusters(b)
        && a.rate_limit == b.rate_limit
        && a.retry_policy == b.retry_policy
}

/// Merge `latest` into `original` so that each route appears in one rule,
/// allowing the union of the principals of every rule naming it.
pub fn merge_rules(mut original: Vec<Rule>, latest: Vec<Rule>) -> Vec<Rule> {
    for rule in latest {
        match original.iter_mut().find(|existing| same_route(&existing.route, &rule.route)) {
            Some(existing) => existing.allowed_principals.extend(rule.allowed_principals),
            None => original.push(rule),
        }
    }
    original
}

/// Merge `latest` into `original`.
///
/// A latest policy whose hostnames are a subset or superset of an existing
/// policy's hostnames is folded into it: hostnames are unioned and sorted and
/// rules are merged with [`merge_rules`]. Otherwise it is appended.
pub fn merge_inbound_policies(
    mut original: Vec<InboundTrafficPolicy>,
    latest: Vec<InboundTrafficPolicy>,
) -> Vec<InboundTrafficPolicy> {
    for policy in latest {
        let mut merged = false;
        for existing in original.iter_mut() {
            if let Some(hostnames) = union_if_subset(&existing.hostnames, &policy.hostnames) {
                existing.hostnames = hostnames;
                let rules = std::mem::take(&mut existing.rules);
                existing.rules = merge_rules(rules, policy.rules.clone());
                merged = true;
            }
        }
        if !merged {
            original.push(policy);
        }
    }
    original
}

/// Merge `latest` into `original` so that each route match appears once,
/// sending traffic to the union of the clusters of every route naming it.
pub fn merge_route_weighted_clusters(
    mut original: Vec<RouteWeightedClusters>,
    latest: Vec<RouteWeightedClusters>,
) -> Vec<RouteWeightedClusters> {
    for route in latest {
        match original.iter_mut().find(|existing| existing.route_match == route.route_match) {
            Some(existing) => {
                let union: BTreeSet<WeightedCluster> = existing
                    .weighted_clusters
                    .drain(..)
                    .chain(route.weighted_clusters)
                    .collect();
                existing.weighted_clusters = union.into_iter().collect();
            }
            None => original.push(route),
        }
    }
    original
}

fn union_if_subset(first: &[String], second: &[String]) -> Option<Vec<String>> {
    let first: BTreeSet<&String> = first.iter().collect();
    let second: BTreeSet<&String> = second.iter().collect();

    if !(first.is_subset(&second) || second.is_subset(&first)) {
        return None;
    }

    let union: Vec<String> = first.union(&second).map(|host| (*host).clone()).collect();
    if union.is_empty() {
        return None;
    }
    Some(union)
}

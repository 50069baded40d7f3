//! Route builders
//!
//! Turn policy route matches into Envoy `Route` entries. One builder is shared
//! by every traffic shape; [`RouteShape`] decides how a policy expands into
//! routes (method fan-out, forced wildcard matching, authorization).

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use envoy_types::pb::envoy::config::route::v3::{
    header_matcher::HeaderMatchSpecifier, retry_policy::RetryBackOff, route::Action,
    route_action::ClusterSpecifier, route_match::PathSpecifier, weighted_cluster::ClusterWeight,
    HeaderMatcher, RetryPolicy, Route, RouteAction, RouteMatch,
    WeightedCluster as WeightedClusterProto,
};
use envoy_types::pb::envoy::r#type::matcher::v3::regex_matcher::{EngineType, GoogleRe2};
use envoy_types::pb::envoy::r#type::matcher::v3::RegexMatcher;
use envoy_types::pb::google::protobuf::{Any as EnvoyAny, Duration as ProtoDuration, UInt32Value};
use tracing::{debug, error, warn};

use crate::domain::{
    EgressHttpRoutingRule, HttpRouteMatch, PathMatchKind, RetryPolicySpec, RouteWeightedClusters,
    Rule, WeightedCluster, REGEX_MATCH_ALL, WILDCARD_HTTP_METHOD,
};
use crate::xds::filters::http::{
    inbound_rbac_for_rule, local_rate_limit_any, optional_rate_limits,
    LOCAL_RATE_LIMIT_FILTER_NAME, RBAC_FILTER_NAME,
};

/// Pseudo-header matched against the request method
pub const METHOD_HEADER_KEY: &str = ":method";

/// Policy header name that matches the request authority
pub const HOST_HEADER_KEY: &str = "host";

/// Pseudo-header carrying the HTTP host/authority
pub const AUTHORITY_HEADER_KEY: &str = ":authority";

/// Traffic shape a set of routes is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteShape {
    /// Mesh traffic arriving at the proxy's services
    Inbound,
    /// Mesh traffic leaving the proxy
    Outbound,
    /// Traffic entering the mesh through an ingress gateway
    Ingress,
    /// Traffic leaving the mesh for external destinations
    Egress,
}

impl RouteShape {
    /// Prefix of virtual host names of this shape
    pub fn virtual_host_prefix(self) -> &'static str {
        match self {
            Self::Inbound => "inbound_virtual-host",
            Self::Outbound => "outbound_virtual-host",
            Self::Ingress => "ingress_virtual-host",
            Self::Egress => "egress_virtual-host",
        }
    }

    /// Whether routes carry a per-route RBAC policy
    pub fn authorizes_callers(self) -> bool {
        matches!(self, Self::Inbound | Self::Ingress)
    }

    /// Methods to emit one route each for.
    ///
    /// Outbound routes authorize destinations, not methods, so they always use
    /// the wildcard.
    pub fn route_methods(self, route_match: &HttpRouteMatch) -> Vec<String> {
        match self {
            Self::Outbound => vec![WILDCARD_HTTP_METHOD.to_string()],
            _ => sanitize_http_methods(&route_match.methods),
        }
    }

    /// The route as compiled for this shape.
    ///
    /// Outbound routes match every path with no header constraints.
    pub fn effective_route(self, route: &RouteWeightedClusters) -> Cow<'_, RouteWeightedClusters> {
        match self {
            Self::Outbound => Cow::Owned(RouteWeightedClusters {
                route_match: HttpRouteMatch {
                    path: REGEX_MATCH_ALL.to_string(),
                    path_match_kind: PathMatchKind::Regex,
                    methods: vec![WILDCARD_HTTP_METHOD.to_string()],
                    headers: BTreeMap::new(),
                },
                ..route.clone()
            }),
            _ => Cow::Borrowed(route),
        }
    }
}

/// Inputs shared by every route of one virtual host
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    pub shape: RouteShape,
    /// Virtual host name, used in logs
    pub virtual_host: &'a str,
    /// Trust domain qualifying authorization principals
    pub trust_domain: &'a str,
}

impl<'a> RouteContext<'a> {
    pub fn new(shape: RouteShape, virtual_host: &'a str, trust_domain: &'a str) -> Self {
        Self { shape, virtual_host, trust_domain }
    }
}

/// Deduplicate methods preserving first-seen order, skipping empty entries.
///
/// The wildcard method short-circuits to a single wildcard entry.
pub fn sanitize_http_methods(methods: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut sanitized = Vec::new();

    for method in methods.iter().filter(|method| !method.is_empty()) {
        if method == WILDCARD_HTTP_METHOD {
            return vec![WILDCARD_HTTP_METHOD.to_string()];
        }
        if seen.insert(method.as_str()) {
            sanitized.push(method.clone());
        }
    }

    sanitized
}

fn method_regex(method: &str) -> &str {
    if method == WILDCARD_HTTP_METHOD {
        REGEX_MATCH_ALL
    } else {
        method
    }
}

/// RE2 regex matcher with the engine set explicitly
#[allow(deprecated)]
pub(crate) fn safe_regex(regex: &str) -> RegexMatcher {
    RegexMatcher {
        regex: regex.to_string(),
        engine_type: Some(EngineType::GoogleRe2(GoogleRe2::default())),
    }
}

fn safe_regex_header(name: &str, regex: &str) -> HeaderMatcher {
    HeaderMatcher {
        name: name.to_string(),
        header_match_specifier: Some(HeaderMatchSpecifier::SafeRegexMatch(safe_regex(regex))),
        ..Default::default()
    }
}

/// Header matchers for a route: the method first, then the authority when a
/// `host` header is given, then every other header in name order.
pub fn route_headers(method: &str, headers: &BTreeMap<String, String>) -> Vec<HeaderMatcher> {
    let mut matchers = vec![safe_regex_header(METHOD_HEADER_KEY, method_regex(method))];

    if let Some(host) = headers.get(HOST_HEADER_KEY) {
        matchers.push(safe_regex_header(AUTHORITY_HEADER_KEY, host));
    }

    matchers.extend(
        headers
            .iter()
            .filter(|(name, _)| name.as_str() != HOST_HEADER_KEY)
            .map(|(name, regex)| safe_regex_header(name, regex)),
    );

    matchers
}

fn path_specifier(route_match: &HttpRouteMatch) -> PathSpecifier {
    match route_match.path_match_kind {
        PathMatchKind::Regex => PathSpecifier::SafeRegex(safe_regex(&route_match.path)),
        PathMatchKind::Exact => PathSpecifier::Path(route_match.path.clone()),
        PathMatchKind::Prefix => PathSpecifier::Prefix(route_match.path.clone()),
    }
}

/// Encode a set of weighted clusters.
///
/// Clusters are sorted by name then weight with exact duplicates removed.
/// Returns `None` and logs when the total weight is below 1.
pub fn build_weighted_cluster(clusters: &[WeightedCluster]) -> Option<WeightedClusterProto> {
    let unique: BTreeSet<&WeightedCluster> = clusters.iter().collect();
    let total: u64 = unique.iter().map(|cluster| u64::from(cluster.weight)).sum();

    if total < 1 {
        error!(total_weight = total, "Total weight of weighted cluster must be >= 1");
        return None;
    }
    let Ok(total_weight) = u32::try_from(total) else {
        error!(total_weight = total, "Total weight of weighted cluster overflows u32");
        return None;
    };

    let clusters = unique
        .into_iter()
        .map(|cluster| ClusterWeight {
            name: cluster.name.clone(),
            weight: Some(UInt32Value { value: cluster.weight }),
            ..Default::default()
        })
        .collect();

    #[allow(deprecated)]
    let weighted = WeightedClusterProto {
        clusters,
        total_weight: Some(UInt32Value { value: total_weight }),
        ..Default::default()
    };
    Some(weighted)
}

fn duration_from_ms(ms: u64) -> ProtoDuration {
    ProtoDuration { seconds: (ms / 1000) as i64, nanos: ((ms % 1000) * 1_000_000) as i32 }
}

/// Encode a retry policy; absent fields keep Envoy's defaults
pub fn build_retry_policy(spec: Option<&RetryPolicySpec>) -> Option<RetryPolicy> {
    let spec = spec?;

    Some(RetryPolicy {
        retry_on: spec.retry_on.clone(),
        num_retries: spec.num_retries.map(|value| UInt32Value { value }),
        per_try_timeout: spec.per_try_timeout_ms.map(duration_from_ms),
        retry_back_off: spec.backoff_base_interval_ms.map(|ms| RetryBackOff {
            base_interval: Some(duration_from_ms(ms)),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Build one route for `method`.
///
/// Returns `None` when the route's weighted clusters cannot be encoded; the
/// route must then be dropped.
pub fn build_route(route: &RouteWeightedClusters, method: &str) -> Option<Route> {
    let weighted_clusters = build_weighted_cluster(&route.weighted_clusters)?;
    let global_rate_limit = route.rate_limit.as_ref().and_then(|limit| limit.global.as_ref());

    #[allow(deprecated)]
    let action = RouteAction {
        cluster_specifier: Some(ClusterSpecifier::WeightedClusters(weighted_clusters)),
        // Mesh traffic must not inherit Envoy's 15s default timeout
        timeout: Some(ProtoDuration { seconds: 0, nanos: 0 }),
        retry_policy: build_retry_policy(route.retry_policy.as_ref()),
        rate_limits: optional_rate_limits(global_rate_limit),
        ..Default::default()
    };

    Some(Route {
        r#match: Some(RouteMatch {
            path_specifier: Some(path_specifier(&route.route_match)),
            headers: route_headers(method, &route.route_match.headers),
            ..Default::default()
        }),
        action: Some(Action::Route(action)),
        ..Default::default()
    })
}

impl RouteShape {
    /// Compile one policy route into routes of this shape.
    ///
    /// `rule` is consulted only by shapes that authorize callers.
    fn compile(
        self,
        route: &RouteWeightedClusters,
        rule: Option<&Rule>,
        ctx: &RouteContext<'_>,
    ) -> Vec<Route> {
        let route = self.effective_route(route);
        let path = route.route_match.path.as_str();

        let mut per_filter_config: HashMap<String, EnvoyAny> = HashMap::new();

        if self.authorizes_callers() {
            let Some(rule) = rule else {
                error!(
                    virtual_host = %ctx.virtual_host,
                    path = %path,
                    "Route has no authorization rule, skipping route"
                );
                return Vec::new();
            };
            match inbound_rbac_for_rule(rule, ctx.trust_domain) {
                Ok(rbac) => {
                    per_filter_config.insert(RBAC_FILTER_NAME.to_string(), rbac);
                }
                Err(e) => {
                    error!(
                        virtual_host = %ctx.virtual_host,
                        path = %path,
                        error = %e,
                        "Error building RBAC policy for rule, skipping route"
                    );
                    return Vec::new();
                }
            }

            if let Some(local) = route.rate_limit.as_ref().and_then(|limit| limit.local.as_ref()) {
                match local_rate_limit_any(local) {
                    Ok(filter) => {
                        per_filter_config.insert(LOCAL_RATE_LIMIT_FILTER_NAME.to_string(), filter);
                    }
                    Err(e) => error!(
                        virtual_host = %ctx.virtual_host,
                        path = %path,
                        error = %e,
                        "Error applying local rate limiting config for route, ignoring it"
                    ),
                }
            }
        }

        let mut routes = Vec::new();
        for method in self.route_methods(&route.route_match) {
            match build_route(&route, &method) {
                Some(mut envoy_route) => {
                    envoy_route.typed_per_filter_config = per_filter_config.clone();
                    routes.push(envoy_route);
                }
                None => warn!(
                    virtual_host = %ctx.virtual_host,
                    path = %path,
                    method = %method,
                    "Dropping route without a valid weighted cluster action"
                ),
            }
        }

        debug!(
            virtual_host = %ctx.virtual_host,
            path = %path,
            routes = routes.len(),
            "Compiled policy route"
        );
        routes
    }
}

/// Routes for inbound or ingress rules, one per allowed method
pub fn build_inbound_routes(rules: &[Rule], ctx: &RouteContext<'_>) -> Vec<Route> {
    rules.iter().flat_map(|rule| ctx.shape.compile(&rule.route, Some(rule), ctx)).collect()
}

/// Routes for outbound policy routes, one wildcard route each
pub fn build_outbound_routes(
    routes: &[RouteWeightedClusters],
    ctx: &RouteContext<'_>,
) -> Vec<Route> {
    routes.iter().flat_map(|route| ctx.shape.compile(route, None, ctx)).collect()
}

/// Routes for egress routing rules, one per allowed method
pub fn build_egress_routes(
    rules: &[EgressHttpRoutingRule],
    ctx: &RouteContext<'_>,
) -> Vec<Route> {
    rules.iter().flat_map(|rule| ctx.shape.compile(&rule.route, None, ctx)).collect()
}

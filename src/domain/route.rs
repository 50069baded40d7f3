//! Route domain types
//!
//! Pure domain entities describing a single allowed route: how requests are
//! matched, which weighted upstream clusters receive them, and the optional
//! retry and per-route rate limiting behavior attached to them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::rate_limit::PerRouteRateLimitSpec;

/// HTTP method wildcard; matches every method.
pub const WILDCARD_HTTP_METHOD: &str = "*";

/// Regex matching every path or header value.
pub const REGEX_MATCH_ALL: &str = ".*";

/// Principal wildcard; authorizes every caller.
pub const WILDCARD_PRINCIPAL: &str = "*";

/// Path matching strategy for route selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PathMatchKind {
    /// RE2 regular expression over the full path
    #[default]
    Regex,
    /// Exact path match
    Exact,
    /// Path prefix match
    Prefix,
}

/// Criteria a request must satisfy to select a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteMatch {
    /// Path pattern interpreted according to `path_match_kind`
    pub path: String,

    /// How `path` is matched
    #[serde(default)]
    pub path_match_kind: PathMatchKind,

    /// Allowed HTTP methods; `*` allows all
    #[serde(default)]
    pub methods: Vec<String>,

    /// Header name to regex. The `host` header matches the request authority.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl HttpRouteMatch {
    /// Match every path and method.
    pub fn wildcard() -> Self {
        Self {
            path: REGEX_MATCH_ALL.to_string(),
            path_match_kind: PathMatchKind::Regex,
            methods: vec![WILDCARD_HTTP_METHOD.to_string()],
            headers: BTreeMap::new(),
        }
    }

    /// Create a regex path match for the given methods
    pub fn regex<I, S>(path: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(path, PathMatchKind::Regex, methods)
    }

    /// Create an exact path match for the given methods
    pub fn exact<I, S>(path: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(path, PathMatchKind::Exact, methods)
    }

    /// Create a prefix path match for the given methods
    pub fn prefix<I, S>(path: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(path, PathMatchKind::Prefix, methods)
    }

    fn with_kind<I, S>(path: impl Into<String>, kind: PathMatchKind, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            path_match_kind: kind,
            methods: methods.into_iter().map(Into::into).collect(),
            headers: BTreeMap::new(),
        }
    }

    /// Add a header match requirement
    pub fn with_header(mut self, name: impl Into<String>, regex: impl Into<String>) -> Self {
        self.headers.insert(name.into(), regex.into());
        self
    }
}

/// A named upstream cluster with its share of a traffic split.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeightedCluster {
    /// Cluster name as known to CDS, e.g. `default/bookstore-v1|80`
    pub name: String,

    /// Relative weight
    pub weight: u32,
}

impl WeightedCluster {
    pub fn new(name: impl Into<String>, weight: u32) -> Self {
        Self { name: name.into(), weight }
    }
}

/// Retry behavior attached to a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicySpec {
    /// Comma separated Envoy retry conditions, e.g. `5xx,connect-failure`
    pub retry_on: String,

    /// Maximum retries; the proxy defaults to 1
    #[serde(default)]
    pub num_retries: Option<u32>,

    /// Timeout per attempt in milliseconds
    #[serde(default)]
    pub per_try_timeout_ms: Option<u64>,

    /// Base interval for exponential back-off in milliseconds
    #[serde(default)]
    pub backoff_base_interval_ms: Option<u64>,
}

/// A route match together with its destination clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteWeightedClusters {
    pub route_match: HttpRouteMatch,

    /// Destination clusters. Treated as a set; order carries no meaning.
    #[serde(default)]
    pub weighted_clusters: Vec<WeightedCluster>,

    #[serde(default)]
    pub rate_limit: Option<PerRouteRateLimitSpec>,

    #[serde(default)]
    pub retry_policy: Option<RetryPolicySpec>,
}

impl RouteWeightedClusters {
    pub fn new(route_match: HttpRouteMatch, weighted_clusters: Vec<WeightedCluster>) -> Self {
        Self { route_match, weighted_clusters, rate_limit: None, retry_policy: None }
    }

    pub fn with_rate_limit(mut self, rate_limit: PerRouteRateLimitSpec) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicySpec) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }

    /// Sum of the weights of the distinct destination clusters
    pub fn total_clusters_weight(&self) -> u64 {
        self.cluster_set().iter().map(|cluster| u64::from(cluster.weight)).sum()
    }

    /// Destination clusters with set semantics
    pub fn cluster_set(&self) -> BTreeSet<&WeightedCluster> {
        self.weighted_clusters.iter().collect()
    }

    /// Whether both routes send traffic to the same set of clusters
    pub fn same_clusters(&self, other: &Self) -> bool {
        self.cluster_set() == other.cluster_set()
    }
}

/// A route and the callers authorized to use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub route: RouteWeightedClusters,

    /// Caller identities; `*` allows everyone. An empty set authorizes nobody.
    #[serde(default)]
    pub allowed_principals: BTreeSet<String>,
}

impl Rule {
    pub fn new<I, S>(route: RouteWeightedClusters, allowed_principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { route, allowed_principals: allowed_principals.into_iter().map(Into::into).collect() }
    }

    /// Whether any caller is authorized to use this rule
    pub fn is_authorized(&self) -> bool {
        !self.allowed_principals.is_empty()
    }

    /// Whether every caller is authorized to use this rule
    pub fn allows_any_principal(&self) -> bool {
        self.allowed_principals.contains(WILDCARD_PRINCIPAL)
    }
}

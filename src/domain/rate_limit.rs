//! Rate limiting policy types
//!
//! Local limits are enforced by each proxy with a token bucket. Global limits
//! describe descriptors sent to a shared rate limit service.

use serde::{Deserialize, Serialize};

/// Rate limits applied to a whole virtual host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSpec {
    #[serde(default)]
    pub local: Option<LocalRateLimitSpec>,

    #[serde(default)]
    pub global: Option<GlobalRateLimitSpec>,
}

/// Rate limits applied to a single route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PerRouteRateLimitSpec {
    #[serde(default)]
    pub local: Option<LocalRateLimitSpec>,

    #[serde(default)]
    pub global: Option<GlobalRateLimitSpec>,
}

/// Token bucket limit enforced independently by each proxy instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRateLimitSpec {
    /// Requests allowed per `unit`
    pub requests: u32,

    /// Extra requests allowed above `requests` in a burst
    #[serde(default)]
    pub burst: u32,

    /// Fill interval: `second`, `minute` or `hour`
    pub unit: String,

    /// Status returned to limited requests; the proxy defaults to 429
    #[serde(default)]
    pub response_status_code: Option<u32>,

    #[serde(default)]
    pub response_headers_to_add: Vec<HeaderValue>,
}

/// Header name/value pair added to a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderValue {
    pub name: String,
    pub value: String,
}

/// Descriptor based limit enforced by an external rate limit service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GlobalRateLimitSpec {
    #[serde(default)]
    pub descriptors: Vec<RateLimitDescriptor>,
}

/// Ordered entries making up one rate limit descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RateLimitDescriptor {
    #[serde(default)]
    pub entries: Vec<DescriptorEntry>,
}

/// One entry of a descriptor. Each kind maps to exactly one rate limit action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DescriptorEntry {
    /// Static key/value pair
    GenericKey { key: String, value: String },

    /// Caller's remote address
    RemoteAddress,

    /// Value of the named request header, reported under `key`
    RequestHeader { name: String, key: String },

    /// Emitted when the request headers match (or, negated, do not match)
    HeaderValueMatch {
        #[serde(default)]
        key: Option<String>,
        value: String,
        #[serde(default)]
        headers: Vec<HeaderMatcherSpec>,
        #[serde(default, rename = "expectMatch")]
        expect_match: Option<bool>,
    },
}

/// Matches a single request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMatcherSpec {
    pub name: String,

    #[serde(flatten)]
    pub predicate: HeaderPredicate,
}

impl HeaderMatcherSpec {
    pub fn new(name: impl Into<String>, predicate: HeaderPredicate) -> Self {
        Self { name: name.into(), predicate }
    }
}

/// The single predicate a header matcher applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPredicate {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Regex(String),
    Contains(String),
    Present(bool),
}

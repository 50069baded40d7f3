//! Local Rate Limit HTTP filter configuration helpers

use crate::domain::LocalRateLimitSpec;
use crate::xds::filters::{any_from_message, encoding_error, header_value_option, invalid_config};
use envoy_types::pb::envoy::config::core::v3::header_value_option::HeaderAppendAction;
use envoy_types::pb::envoy::config::core::v3::RuntimeFractionalPercent;
use envoy_types::pb::envoy::extensions::filters::http::local_ratelimit::v3::LocalRateLimit;
use envoy_types::pb::envoy::r#type::v3::{
    fractional_percent, FractionalPercent, HttpStatus, TokenBucket,
};
use envoy_types::pb::google::protobuf::{Any as EnvoyAny, Duration as ProtoDuration, UInt32Value};

/// Type URL for the local rate limit filter configuration
pub const LOCAL_RATE_LIMIT_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.http.local_ratelimit.v3.LocalRateLimit";

/// Stat prefix used by every local rate limiter the compiler emits
pub const LOCAL_RATE_LIMIT_STAT_PREFIX: &str = "http_local_rate_limiter";

/// Lightweight representation of Envoy's TokenBucket message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBucketConfig {
    /// Maximum tokens available in the bucket
    pub max_tokens: u32,
    /// Tokens to add during each refill
    pub tokens_per_fill: u32,
    /// Fill interval in milliseconds
    pub fill_interval_ms: u64,
}

impl TokenBucketConfig {
    fn to_proto(&self) -> Result<TokenBucket, crate::Error> {
        if self.fill_interval_ms == 0 {
            return Err(invalid_config(
                "LocalRateLimit token bucket fill_interval_ms must be greater than 0",
            ));
        }

        let seconds = (self.fill_interval_ms / 1000) as i64;
        let nanos = ((self.fill_interval_ms % 1000) * 1_000_000) as i32;

        Ok(TokenBucket {
            max_tokens: self.max_tokens,
            tokens_per_fill: Some(UInt32Value { value: self.tokens_per_fill }),
            fill_interval: Some(ProtoDuration { seconds, nanos }),
        })
    }
}

/// Fill interval in milliseconds for a rate limit unit
pub fn fill_interval_ms(unit: &str) -> Result<u64, crate::Error> {
    match unit {
        "second" => Ok(1_000),
        "minute" => Ok(60_000),
        "hour" => Ok(3_600_000),
        other => {
            Err(encoding_error(format!("invalid unit {:?} for HTTP request rate limiting", other)))
        }
    }
}

/// Local Rate Limit filter configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRateLimitConfig {
    /// Prefix for statistics emitted by the filter
    pub stat_prefix: String,
    pub token_bucket: TokenBucketConfig,
    /// HTTP status returned when the request is rate limited; Envoy defaults to 429
    pub status_code: Option<u32>,
    /// Headers added to rate limited responses, overwriting existing values
    pub response_headers_to_add: Vec<(String, String)>,
}

impl LocalRateLimitConfig {
    /// Build the filter configuration for a policy rate limit.
    ///
    /// `max_tokens` covers the burst on top of the per-interval requests.
    pub fn from_spec(spec: &LocalRateLimitSpec) -> Result<Self, crate::Error> {
        let fill_interval_ms = fill_interval_ms(&spec.unit)?;
        let max_tokens = spec.requests.checked_add(spec.burst).ok_or_else(|| {
            encoding_error(format!(
                "requests ({}) plus burst ({}) overflows the token bucket",
                spec.requests, spec.burst
            ))
        })?;

        Ok(Self {
            stat_prefix: LOCAL_RATE_LIMIT_STAT_PREFIX.to_string(),
            token_bucket: TokenBucketConfig {
                max_tokens,
                tokens_per_fill: spec.requests,
                fill_interval_ms,
            },
            status_code: spec.response_status_code.filter(|code| *code > 0),
            response_headers_to_add: spec
                .response_headers_to_add
                .iter()
                .map(|header| (header.name.clone(), header.value.clone()))
                .collect(),
        })
    }

    /// Default 100% fractional percent config for filter_enabled/filter_enforced.
    fn default_100_percent() -> RuntimeFractionalPercent {
        RuntimeFractionalPercent {
            runtime_key: String::new(),
            default_value: Some(FractionalPercent {
                numerator: 100,
                denominator: fractional_percent::DenominatorType::Hundred as i32,
            }),
        }
    }

    /// Convert into Envoy Any payload
    pub fn to_any(&self) -> Result<EnvoyAny, crate::Error> {
        let mut proto = LocalRateLimit {
            stat_prefix: self.stat_prefix.clone(),
            token_bucket: Some(self.token_bucket.to_proto()?),
            ..Default::default()
        };

        if let Some(code) = self.status_code {
            if !(100..=599).contains(&code) {
                return Err(encoding_error(format!(
                    "invalid response status code {} for HTTP request rate limiting",
                    code
                )));
            }
            proto.status = Some(HttpStatus { code: code as i32 });
        }

        // The filter only enforces limits when both fractions are set
        proto.filter_enabled = Some(Self::default_100_percent());
        proto.filter_enforced = Some(Self::default_100_percent());

        proto.response_headers_to_add = self
            .response_headers_to_add
            .iter()
            .map(|(name, value)| {
                header_value_option(name, value, HeaderAppendAction::OverwriteIfExistsOrAdd)
            })
            .collect();

        Ok(any_from_message(LOCAL_RATE_LIMIT_TYPE_URL, &proto))
    }
}

/// Encode a local rate limit spec as per-filter configuration.
pub fn local_rate_limit_any(spec: &LocalRateLimitSpec) -> Result<EnvoyAny, crate::Error> {
    LocalRateLimitConfig::from_spec(spec)?.to_any()
}

//! Filter utilities for Envoy HTTP filters.
//!
//! Route and virtual host assembly attach per-filter configuration as
//! protobuf `Any` blobs keyed by filter name. The builders in [`http`] turn
//! policy types into those blobs; this module holds the shared encoding
//! helpers.
//!
//! # Available Filters
//!
//! - **RBAC**: Per-route caller authorization
//! - **Local Rate Limit**: Token bucket limiting enforced by each proxy
//! - **Rate Limit**: Descriptor actions for a global rate limit service
//!
//! # Example
//!
//! ```rust,ignore
//! use meshplane::xds::filters::http::local_rate_limit::local_rate_limit_any;
//!
//! let any = local_rate_limit_any(&spec)?;
//! ```

pub mod http;

use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use base64::Engine;
use envoy_types::pb::envoy::config::core::v3::header_value_option::HeaderAppendAction;
use envoy_types::pb::envoy::config::core::v3::{HeaderValue, HeaderValueOption};
use envoy_types::pb::google::protobuf::Any;
use prost::Message;
use serde::{Deserialize, Serialize};

/// Wrapper for binary protobuf payloads serialized as base64 in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Base64Bytes(pub Vec<u8>);

impl Serialize for Base64Bytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let encoded = BASE64_ENGINE.encode(&self.0);
        serializer.serialize_str(&encoded)
    }
}

impl<'de> Deserialize<'de> for Base64Bytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let decoded = BASE64_ENGINE
            .decode(encoded.as_bytes())
            .map_err(|err| serde::de::Error::custom(err.to_string()))?;
        Ok(Base64Bytes(decoded))
    }
}

/// Serializable form of an Envoy `google.protobuf.Any` payload.
///
/// `value` holds the base64 encoded protobuf bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedConfig {
    pub type_url: String,
    #[serde(default)]
    pub value: Base64Bytes,
}

impl TypedConfig {
    /// Creates a typed config from a prost message.
    pub fn from_message<M: Message>(type_url: impl Into<String>, msg: &M) -> Self {
        Self { type_url: type_url.into(), value: Base64Bytes(msg.encode_to_vec()) }
    }

    /// Converts to Envoy `Any` structure for xDS protocol.
    pub fn to_any(&self) -> Any {
        Any { type_url: self.type_url.clone(), value: self.value.0.clone() }
    }
}

impl From<&Any> for TypedConfig {
    fn from(any: &Any) -> Self {
        Self { type_url: any.type_url.clone(), value: Base64Bytes(any.value.clone()) }
    }
}

/// Helper for building Envoy `Any` values from prost messages.
pub fn any_from_message<M: Message>(type_url: impl Into<String>, msg: &M) -> Any {
    TypedConfig::from_message(type_url, msg).to_any()
}

/// Decode an `Any` payload, checking its type URL first.
pub fn message_from_any<M: Message + Default>(any: &Any, type_url: &str) -> crate::Result<M> {
    if any.type_url != type_url {
        return Err(encoding_error(format!(
            "expected type URL '{}', found '{}'",
            type_url, any.type_url
        )));
    }
    M::decode(any.value.as_slice())
        .map_err(|e| encoding_error(format!("failed to decode {}: {}", type_url, e)))
}

/// Build a header to add to a request or response.
pub fn header_value_option(
    key: impl Into<String>,
    value: impl Into<String>,
    append_action: HeaderAppendAction,
) -> HeaderValueOption {
    HeaderValueOption {
        header: Some(HeaderValue { key: key.into(), value: value.into(), raw_value: Vec::new() }),
        #[allow(deprecated)]
        append: None, // Deprecated field, use append_action instead
        append_action: append_action as i32,
        keep_empty_value: false,
    }
}

/// Error helper for invalid filter configuration.
pub fn invalid_config(msg: impl Into<String>) -> crate::Error {
    crate::Error::config(msg.into())
}

/// Error helper for a filter that cannot be encoded.
pub fn encoding_error(msg: impl Into<String>) -> crate::Error {
    crate::Error::encoding(msg.into())
}

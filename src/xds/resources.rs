//! RDS resource packaging
//!
//! Compiled route configurations are encoded into `Any` payloads and wrapped
//! in a `DiscoveryResponse` whose version is derived from the payload bytes.
//! Per-filter config maps are written in filter name order so equal
//! configurations always encode to equal bytes.

use std::collections::{BTreeMap, HashMap};

use envoy_types::pb::envoy::config::route::v3::{Route, RouteConfiguration, VirtualHost};
use envoy_types::pb::envoy::service::discovery::v3::DiscoveryResponse;
use envoy_types::pb::google::protobuf::Any;
use prost::Message;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::xds::filters::TypedConfig;

pub const ROUTE_CONFIGURATION_TYPE_URL: &str =
    "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";

/// Wrapper for a built Envoy resource along with its name.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltResource {
    pub name: String,
    pub resource: Any,
}

impl BuiltResource {
    pub fn into_any(self) -> Any {
        self.resource
    }

    pub fn type_url(&self) -> &str {
        &self.resource.type_url
    }

    /// Serializable form of the encoded payload
    pub fn typed_config(&self) -> TypedConfig {
        TypedConfig::from(&self.resource)
    }
}

/// `typed_per_filter_config` map entry
#[derive(Clone, PartialEq, Message)]
struct FilterConfigEntry {
    #[prost(string, tag = "1")]
    key: String,
    #[prost(message, optional, tag = "2")]
    value: Option<Any>,
}

/// Trailing `RouteConfiguration` fields: encoded virtual hosts and sorted filter configs
#[derive(Clone, PartialEq, Message)]
struct RouteConfigurationTail {
    #[prost(bytes = "vec", repeated, tag = "2")]
    virtual_hosts: Vec<Vec<u8>>,
    #[prost(message, repeated, tag = "16")]
    typed_per_filter_config: Vec<FilterConfigEntry>,
}

/// Trailing `VirtualHost` fields: encoded routes and sorted filter configs
#[derive(Clone, PartialEq, Message)]
struct VirtualHostTail {
    #[prost(bytes = "vec", repeated, tag = "3")]
    routes: Vec<Vec<u8>>,
    #[prost(message, repeated, tag = "15")]
    typed_per_filter_config: Vec<FilterConfigEntry>,
}

/// Trailing `Route` field: sorted filter configs
#[derive(Clone, PartialEq, Message)]
struct RouteTail {
    #[prost(message, repeated, tag = "13")]
    typed_per_filter_config: Vec<FilterConfigEntry>,
}

fn sorted_filter_configs(configs: &HashMap<String, Any>) -> Vec<FilterConfigEntry> {
    configs
        .iter()
        .collect::<BTreeMap<_, _>>()
        .into_iter()
        .map(|(key, value)| FilterConfigEntry { key: key.clone(), value: Some(value.clone()) })
        .collect()
}

fn encode_route(route: &Route) -> Vec<u8> {
    let mut head = route.clone();
    let filter_configs = std::mem::take(&mut head.typed_per_filter_config);

    let mut encoded = head.encode_to_vec();
    let tail = RouteTail { typed_per_filter_config: sorted_filter_configs(&filter_configs) };
    encoded.extend(tail.encode_to_vec());
    encoded
}

fn encode_virtual_host(vhost: &VirtualHost) -> Vec<u8> {
    let mut head = vhost.clone();
    let routes = std::mem::take(&mut head.routes);
    let filter_configs = std::mem::take(&mut head.typed_per_filter_config);

    let mut encoded = head.encode_to_vec();
    let tail = VirtualHostTail {
        routes: routes.iter().map(encode_route).collect(),
        typed_per_filter_config: sorted_filter_configs(&filter_configs),
    };
    encoded.extend(tail.encode_to_vec());
    encoded
}

/// Encode a route configuration canonically.
///
/// Protobuf parsers merge repeated fields that appear later in the message,
/// so the nested virtual hosts, routes and filter config maps are written
/// after the remaining fields. Map entries go in key order.
pub fn encode_route_configuration(config: &RouteConfiguration) -> Vec<u8> {
    let mut head = config.clone();
    let virtual_hosts = std::mem::take(&mut head.virtual_hosts);
    let filter_configs = std::mem::take(&mut head.typed_per_filter_config);

    let mut encoded = head.encode_to_vec();
    let tail = RouteConfigurationTail {
        virtual_hosts: virtual_hosts.iter().map(encode_virtual_host).collect(),
        typed_per_filter_config: sorted_filter_configs(&filter_configs),
    };
    encoded.extend(tail.encode_to_vec());
    encoded
}

/// Encode route configurations, preserving their order
pub fn route_resources(configs: &[RouteConfiguration]) -> Vec<BuiltResource> {
    configs
        .iter()
        .map(|config| {
            let encoded = encode_route_configuration(config);
            debug!(resource = %config.name, bytes = encoded.len(), "Encoded route resource");
            let resource =
                Any { type_url: ROUTE_CONFIGURATION_TYPE_URL.to_string(), value: encoded };
            BuiltResource { name: config.name.clone(), resource }
        })
        .collect()
}

/// Content version of a resource set.
///
/// Hex encoded SHA-256 over every resource's name, type URL and payload, in
/// order. Equal resource sets always share a version.
pub fn resources_version(resources: &[BuiltResource]) -> String {
    let mut hasher = Sha256::new();
    for resource in resources {
        hasher.update(resource.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(resource.resource.type_url.as_bytes());
        hasher.update([0u8]);
        hasher.update((resource.resource.value.len() as u64).to_be_bytes());
        hasher.update(&resource.resource.value);
    }
    hex::encode(hasher.finalize())
}

/// Package route resources as an RDS discovery response
pub fn discovery_response(resources: Vec<BuiltResource>) -> DiscoveryResponse {
    let version_info = resources_version(&resources);

    DiscoveryResponse {
        version_info,
        type_url: ROUTE_CONFIGURATION_TYPE_URL.to_string(),
        resources: resources.into_iter().map(BuiltResource::into_any).collect(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xds::filters::message_from_any;
    use std::collections::BTreeSet;

    fn config(name: &str) -> RouteConfiguration {
        RouteConfiguration { name: name.to_string(), ..Default::default() }
    }

    fn filter_config(type_url: &str) -> Any {
        Any { type_url: type_url.to_string(), value: type_url.as_bytes().to_vec() }
    }

    // Every call builds fresh maps, so each one gets its own hasher seed.
    fn filtered_config() -> RouteConfiguration {
        let filters = || -> HashMap<String, Any> {
            ["envoy.filters.http.rbac", "envoy.filters.http.local_ratelimit", "custom.filter"]
                .into_iter()
                .map(|name| (name.to_string(), filter_config(name)))
                .collect()
        };

        RouteConfiguration {
            name: "rds-inbound.80".into(),
            virtual_hosts: vec![VirtualHost {
                name: "inbound_virtual-host|bookstore".into(),
                domains: vec!["bookstore".into()],
                routes: ["first", "second"]
                    .into_iter()
                    .map(|name| Route {
                        name: name.into(),
                        typed_per_filter_config: filters(),
                        ..Default::default()
                    })
                    .collect(),
                typed_per_filter_config: filters(),
                ..Default::default()
            }],
            validate_clusters: Some(envoy_types::pb::google::protobuf::BoolValue { value: false }),
            ..Default::default()
        }
    }

    #[test]
    fn filter_config_maps_encode_identically_every_time() {
        let encodings: BTreeSet<Vec<u8>> =
            (0..64).map(|_| encode_route_configuration(&filtered_config())).collect();
        assert_eq!(encodings.len(), 1);

        let versions: BTreeSet<String> = (0..64)
            .map(|_| resources_version(&route_resources(&[filtered_config()])))
            .collect();
        assert_eq!(versions.len(), 1);
    }

    #[test]
    fn canonical_encoding_decodes_to_the_same_configuration() {
        let original = filtered_config();
        let decoded = RouteConfiguration::decode(encode_route_configuration(&original).as_slice())
            .expect("decode canonical encoding");

        assert_eq!(decoded, original);
        assert_eq!(decoded.virtual_hosts[0].routes[0].name, "first");
        assert_eq!(decoded.virtual_hosts[0].routes[1].name, "second");
    }

    #[test]
    fn route_resources_round_trip_through_any() {
        let configs = vec![config("rds-inbound.80"), config("rds-egress.443")];
        let resources = route_resources(&configs);

        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].name, "rds-inbound.80");
        assert_eq!(resources[1].type_url(), ROUTE_CONFIGURATION_TYPE_URL);

        let decoded: RouteConfiguration =
            message_from_any(&resources[1].resource, ROUTE_CONFIGURATION_TYPE_URL)
                .expect("decode route configuration");
        assert_eq!(decoded, configs[1]);
    }

    #[test]
    fn version_is_content_derived() {
        let first = route_resources(&[config("rds-inbound.80")]);
        let same = route_resources(&[config("rds-inbound.80")]);
        let other = route_resources(&[config("rds-inbound.90")]);

        assert_eq!(resources_version(&first), resources_version(&same));
        assert_ne!(resources_version(&first), resources_version(&other));
        assert_eq!(resources_version(&first).len(), 64);
    }

    #[test]
    fn discovery_response_carries_type_url_and_version() {
        let resources = route_resources(&[config("rds-inbound.80")]);
        let version = resources_version(&resources);
        let response = discovery_response(resources);

        assert_eq!(response.type_url, ROUTE_CONFIGURATION_TYPE_URL);
        assert_eq!(response.version_info, version);
        assert_eq!(response.resources.len(), 1);
    }

    #[test]
    fn empty_resource_set_still_has_a_version() {
        let response = discovery_response(Vec::new());
        assert!(response.resources.is_empty());
        assert_eq!(response.version_info.len(), 64);
    }
}

//! Policy snapshot
//!
//! The four policy collections resolved for one proxy, in a serializable form
//! so a compilation can be driven from a YAML or JSON file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::proxy::Proxy;
use super::traffic_policy::{EgressHttpRouteConfig, InboundTrafficPolicy, OutboundTrafficPolicy};
use crate::config::CompilerConfig;
use crate::errors::{Error, Result};
use crate::xds::route_config::RoutesBuilder;

/// Policies resolved for one proxy, grouped by destination port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PolicySnapshot {
    #[serde(default)]
    pub proxy: Option<Proxy>,

    #[serde(default)]
    pub inbound: BTreeMap<u16, Vec<InboundTrafficPolicy>>,

    #[serde(default)]
    pub outbound: BTreeMap<u16, Vec<OutboundTrafficPolicy>>,

    #[serde(default)]
    pub ingress: Vec<InboundTrafficPolicy>,

    #[serde(default)]
    pub egress: BTreeMap<u16, Vec<EgressHttpRouteConfig>>,
}

impl PolicySnapshot {
    /// Parse a snapshot from YAML. JSON is accepted too, being a YAML subset.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parse a snapshot from JSON
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a snapshot file, choosing the format from its extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(e, format!("failed to read snapshot {}", path.display())))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Whether the snapshot holds no policy of any shape
    pub fn is_empty(&self) -> bool {
        self.inbound.is_empty()
            && self.outbound.is_empty()
            && self.ingress.is_empty()
            && self.egress.is_empty()
    }

    /// Populate a route builder with this snapshot's policies.
    ///
    /// Stats headers are taken from the proxy when enabled in `config` and a
    /// proxy is present.
    pub fn into_builder(self, config: &CompilerConfig) -> RoutesBuilder {
        let mut builder = RoutesBuilder::new()
            .inbound_port_specific_route_configs(self.inbound)
            .outbound_port_specific_route_configs(self.outbound)
            .ingress_traffic_policies(self.ingress)
            .egress_port_specific_route_configs(self.egress)
            .trust_domain(config.trust_domain.clone());

        if let Some(proxy) = self.proxy {
            if config.enable_stats_headers {
                builder = builder.stats_headers(proxy.stats_headers());
            }
            builder = builder.proxy(proxy);
        }

        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"
proxy:
  identity: bookstore.default
inbound:
  80:
    - name: bookstore-v1.default.svc.cluster.local
      hostnames: [bookstore-v1.default.svc.cluster.local]
      rules:
        - route:
            routeMatch:
              path: /buy
              methods: [GET]
            weightedClusters:
              - name: "default/bookstore-v1|80"
                weight: 100
          allowedPrincipals: ["*"]
egress:
  443:
    - name: github.com
      hostnames: [github.com]
"#;

    #[test]
    fn parses_yaml_snapshot() {
        let snapshot = PolicySnapshot::from_yaml(SNAPSHOT).expect("parse snapshot");
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.inbound[&80].len(), 1);
        assert_eq!(snapshot.inbound[&80][0].rules[0].route.total_clusters_weight(), 100);
        assert_eq!(snapshot.egress[&443][0].name, "github.com");
        assert!(snapshot.ingress.is_empty());
    }

    #[test]
    fn parses_json_snapshot_with_string_port_keys() {
        let json = r#"{"outbound": {"8080": [{"name": "bookstore", "hostnames": ["bookstore"]}]}}"#;
        let snapshot = PolicySnapshot::from_json(json).expect("parse snapshot");
        assert_eq!(snapshot.outbound[&8080][0].name, "bookstore");
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = PolicySnapshot::from_yaml("{}").expect("parse snapshot");
        assert!(snapshot.is_empty());
        assert!(snapshot.proxy.is_none());
    }

    #[test]
    fn from_path_reports_missing_file() {
        let err = PolicySnapshot::from_path("/nonexistent/snapshot.yaml").expect_err("missing");
        assert!(matches!(err, Error::Io { .. }));
    }
}

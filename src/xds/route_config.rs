//! Route configuration assembly
//!
//! [`RoutesBuilder`] collects the policies resolved for one proxy and compiles
//! them into the ordered list of RDS `RouteConfiguration` resources the proxy
//! receives. One resource is emitted per destination port and traffic shape,
//! so a hostname can route differently on different ports.

use std::collections::{BTreeMap, HashMap};

use envoy_types::pb::envoy::config::core::v3::header_value_option::HeaderAppendAction;
use envoy_types::pb::envoy::config::route::v3::{RouteConfiguration, VirtualHost};
use envoy_types::pb::google::protobuf::{Any as EnvoyAny, BoolValue};
use tracing::{debug, error, info, warn};

use crate::domain::{
    EgressHttpRouteConfig, InboundTrafficPolicy, OutboundTrafficPolicy, Proxy, RateLimitSpec,
};
use crate::xds::filters::header_value_option;
use crate::xds::filters::http::{local_rate_limit_any, rate_limits, LOCAL_RATE_LIMIT_FILTER_NAME};
use crate::xds::route::{
    build_egress_routes, build_inbound_routes, build_outbound_routes, RouteContext, RouteShape,
};

/// Name prefix of inbound mesh route configurations
pub const INBOUND_ROUTE_CONFIG_NAME: &str = "rds-inbound";

/// Name prefix of outbound mesh route configurations
pub const OUTBOUND_ROUTE_CONFIG_NAME: &str = "rds-outbound";

/// Name of the single ingress route configuration
pub const INGRESS_ROUTE_CONFIG_NAME: &str = "rds-ingress";

/// Name prefix of egress route configurations
pub const EGRESS_ROUTE_CONFIG_NAME: &str = "rds-egress";

/// Inbound mesh route configuration name for a port
pub fn inbound_route_config_name(port: u16) -> String {
    format!("{}.{}", INBOUND_ROUTE_CONFIG_NAME, port)
}

/// Outbound mesh route configuration name for a port
pub fn outbound_route_config_name(port: u16) -> String {
    format!("{}.{}", OUTBOUND_ROUTE_CONFIG_NAME, port)
}

/// Egress route configuration name for a port
pub fn egress_route_config_name(port: u16) -> String {
    format!("{}.{}", EGRESS_ROUTE_CONFIG_NAME, port)
}

/// Empty route configuration.
///
/// Cluster validation is disabled: RDS may arrive before CDS has the clusters
/// it references, and Envoy would otherwise reject the whole configuration.
pub fn route_configuration_stub(name: impl Into<String>) -> RouteConfiguration {
    RouteConfiguration {
        name: name.into(),
        validate_clusters: Some(BoolValue { value: false }),
        ..Default::default()
    }
}

/// Empty virtual host named `<prefix>|<name>` serving `domains`
pub fn virtual_host_stub(prefix: &str, name: &str, domains: &[String]) -> VirtualHost {
    VirtualHost {
        name: format!("{}|{}", prefix, name),
        domains: domains.to_vec(),
        ..Default::default()
    }
}

/// Attach virtual host level rate limits.
///
/// A local limit that cannot be encoded is logged and omitted; the global
/// limit is attached regardless.
fn apply_virtual_host_rate_limit(virtual_host: &mut VirtualHost, rate_limit: &RateLimitSpec) {
    let mut per_filter_config: HashMap<String, EnvoyAny> = HashMap::new();

    if let Some(local) = &rate_limit.local {
        match local_rate_limit_any(local) {
            Ok(filter) => {
                per_filter_config.insert(LOCAL_RATE_LIMIT_FILTER_NAME.to_string(), filter);
            }
            Err(e) => error!(
                virtual_host = %virtual_host.name,
                error = %e,
                "Error applying local rate limiting config for virtual host, ignoring it"
            ),
        }
    }

    if let Some(global) = &rate_limit.global {
        virtual_host.rate_limits = rate_limits(global);
    }

    virtual_host.typed_per_filter_config = per_filter_config;
}

/// Compiles the policies of one proxy into RDS route configurations.
///
/// Every input is optional; absent inputs produce no resources of that
/// shape. The builder is consumed by [`RoutesBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct RoutesBuilder {
    inbound_port_specific_route_configs: Option<BTreeMap<u16, Vec<InboundTrafficPolicy>>>,
    outbound_port_specific_route_configs: Option<BTreeMap<u16, Vec<OutboundTrafficPolicy>>>,
    ingress_traffic_policies: Vec<InboundTrafficPolicy>,
    egress_port_specific_route_configs: Option<BTreeMap<u16, Vec<EgressHttpRouteConfig>>>,
    proxy: Option<Proxy>,
    stats_headers: BTreeMap<String, String>,
    trust_domain: Option<String>,
}

impl RoutesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inbound_port_specific_route_configs(
        mut self,
        configs: BTreeMap<u16, Vec<InboundTrafficPolicy>>,
    ) -> Self {
        self.inbound_port_specific_route_configs = Some(configs);
        self
    }

    pub fn outbound_port_specific_route_configs(
        mut self,
        configs: BTreeMap<u16, Vec<OutboundTrafficPolicy>>,
    ) -> Self {
        self.outbound_port_specific_route_configs = Some(configs);
        self
    }

    pub fn ingress_traffic_policies(mut self, policies: Vec<InboundTrafficPolicy>) -> Self {
        self.ingress_traffic_policies = policies;
        self
    }

    pub fn egress_port_specific_route_configs(
        mut self,
        configs: BTreeMap<u16, Vec<EgressHttpRouteConfig>>,
    ) -> Self {
        self.egress_port_specific_route_configs = Some(configs);
        self
    }

    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Headers added to every response served through inbound routes
    pub fn stats_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.stats_headers = headers;
        self
    }

    pub fn trust_domain(mut self, trust_domain: impl Into<String>) -> Self {
        self.trust_domain = Some(trust_domain.into());
        self
    }

    /// Compile every configured policy.
    ///
    /// Resources are ordered inbound, outbound, ingress, egress, each by
    /// ascending port. Policy errors drop the affected route or filter and are
    /// logged; they never fail the build.
    pub fn build(self) -> Vec<RouteConfiguration> {
        let proxy = self
            .proxy
            .as_ref()
            .map_or_else(|| "unknown".to_string(), |proxy| proxy.to_string());
        let span = crate::compile_span!(proxy);
        let _guard = span.enter();

        let trust_domain = match self.trust_domain.as_deref() {
            Some(domain) if !domain.is_empty() => domain,
            _ => {
                let authorizes = !self.ingress_traffic_policies.is_empty()
                    || self
                        .inbound_port_specific_route_configs
                        .as_ref()
                        .is_some_and(|configs| !configs.is_empty());
                if authorizes {
                    warn!("No trust domain configured, principals are used unqualified");
                }
                ""
            }
        };

        let mut resources = Vec::new();

        if let Some(configs) = &self.inbound_port_specific_route_configs {
            resources.extend(self.build_inbound_mesh_route_configurations(configs, trust_domain));
        }

        if let Some(configs) = &self.outbound_port_specific_route_configs {
            resources.extend(self.build_outbound_mesh_route_configurations(configs, trust_domain));
        }

        if !self.ingress_traffic_policies.is_empty() {
            resources.push(self.build_ingress_route_configuration(trust_domain));
        }

        if let Some(configs) = &self.egress_port_specific_route_configs {
            resources.extend(self.build_egress_route_configurations(configs, trust_domain));
        }

        info!(route_configurations = resources.len(), "Compiled RDS route configurations");
        resources
    }

    fn build_inbound_mesh_route_configurations(
        &self,
        configs: &BTreeMap<u16, Vec<InboundTrafficPolicy>>,
        trust_domain: &str,
    ) -> Vec<RouteConfiguration> {
        let shape = RouteShape::Inbound;

        configs
            .iter()
            .map(|(port, policies)| {
                let mut route_config = route_configuration_stub(inbound_route_config_name(*port));

                for policy in policies {
                    let mut virtual_host = virtual_host_stub(
                        shape.virtual_host_prefix(),
                        &policy.name,
                        &policy.hostnames,
                    );
                    let ctx = RouteContext::new(shape, &virtual_host.name, trust_domain);
                    let routes = build_inbound_routes(&policy.rules, &ctx);
                    virtual_host.routes = routes;
                    if let Some(rate_limit) = &policy.rate_limit {
                        apply_virtual_host_rate_limit(&mut virtual_host, rate_limit);
                    }
                    route_config.virtual_hosts.push(virtual_host);
                }

                route_config.response_headers_to_add = self
                    .stats_headers
                    .iter()
                    .map(|(key, value)| {
                        header_value_option(key, value, HeaderAppendAction::AppendIfExistsOrAdd)
                    })
                    .collect();

                debug!(
                    route_config = %route_config.name,
                    virtual_hosts = route_config.virtual_hosts.len(),
                    "Built inbound route configuration"
                );
                route_config
            })
            .collect()
    }

    fn build_outbound_mesh_route_configurations(
        &self,
        configs: &BTreeMap<u16, Vec<OutboundTrafficPolicy>>,
        trust_domain: &str,
    ) -> Vec<RouteConfiguration> {
        let shape = RouteShape::Outbound;

        configs
            .iter()
            .map(|(port, policies)| {
                let mut route_config = route_configuration_stub(outbound_route_config_name(*port));

                for policy in policies {
                    let mut virtual_host = virtual_host_stub(
                        shape.virtual_host_prefix(),
                        &policy.name,
                        &policy.hostnames,
                    );
                    let ctx = RouteContext::new(shape, &virtual_host.name, trust_domain);
                    let routes = build_outbound_routes(&policy.routes, &ctx);
                    virtual_host.routes = routes;
                    route_config.virtual_hosts.push(virtual_host);
                }

                route_config
            })
            .collect()
    }

    fn build_ingress_route_configuration(&self, trust_domain: &str) -> RouteConfiguration {
        let shape = RouteShape::Ingress;
        let mut route_config = route_configuration_stub(INGRESS_ROUTE_CONFIG_NAME);

        for policy in &self.ingress_traffic_policies {
            let mut virtual_host =
                virtual_host_stub(shape.virtual_host_prefix(), &policy.name, &policy.hostnames);
            let ctx = RouteContext::new(shape, &virtual_host.name, trust_domain);
            let routes = build_inbound_routes(&policy.rules, &ctx);
            virtual_host.routes = routes;
            route_config.virtual_hosts.push(virtual_host);
        }

        route_config
    }

    fn build_egress_route_configurations(
        &self,
        configs: &BTreeMap<u16, Vec<EgressHttpRouteConfig>>,
        trust_domain: &str,
    ) -> Vec<RouteConfiguration> {
        let shape = RouteShape::Egress;

        configs
            .iter()
            .map(|(port, policies)| {
                let mut route_config = route_configuration_stub(egress_route_config_name(*port));

                for policy in policies {
                    let mut virtual_host = virtual_host_stub(
                        shape.virtual_host_prefix(),
                        &policy.name,
                        &policy.hostnames,
                    );
                    let ctx = RouteContext::new(shape, &virtual_host.name, trust_domain);
                    let routes = build_egress_routes(&policy.routing_rules, &ctx);
                    virtual_host.routes = routes;
                    route_config.virtual_hosts.push(virtual_host);
                }

                route_config
            })
            .collect()
    }
}

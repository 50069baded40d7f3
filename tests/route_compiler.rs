//! End-to-end route compilation tests.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::{
    bookstore_inbound, bookstore_outbound, config_names, github_egress, method_regex, path_regex,
    route, weighted_clusters, TRUST_DOMAIN,
};
use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;
use envoy_types::pb::envoy::extensions::filters::http::rbac::v3::RbacPerRoute;
use meshplane::domain::{
    HttpRouteMatch, InboundTrafficPolicy, LocalRateLimitSpec, PerRouteRateLimitSpec,
    RateLimitSpec, RouteWeightedClusters, Rule, WeightedCluster,
};
use meshplane::xds::filters::http::{
    LOCAL_RATE_LIMIT_FILTER_NAME, RBAC_FILTER_NAME, RBAC_PER_ROUTE_TYPE_URL,
};
use meshplane::xds::filters::message_from_any;
use meshplane::xds::{discovery_response, resources_version, route_resources, RoutesBuilder};
use proptest::prelude::*;

fn compile_inbound(policies: Vec<InboundTrafficPolicy>) -> Vec<RouteConfiguration> {
    RoutesBuilder::new()
        .inbound_port_specific_route_configs(BTreeMap::from([(80, policies)]))
        .trust_domain(TRUST_DOMAIN)
        .build()
}

#[test]
fn bookstore_inbound_policy_compiles_to_single_route() {
    let configs = compile_inbound(vec![bookstore_inbound()]);

    assert_eq!(config_names(&configs), vec!["rds-inbound.80"]);
    let vhost = &configs[0].virtual_hosts[0];
    assert_eq!(vhost.name, "inbound_virtual-host|bookstore-v1.default.svc.cluster.local");
    assert_eq!(vhost.routes.len(), 1);

    let route = &vhost.routes[0];
    assert_eq!(method_regex(route), Some("GET"));
    assert_eq!(path_regex(route), Some("/buy"));
    assert_eq!(weighted_clusters(route), Some((100, vec!["bookstore-v1|80".to_string()])));
    assert!(route.typed_per_filter_config.contains_key(RBAC_FILTER_NAME));
}

#[test]
fn wildcard_method_collapses_to_one_route() {
    let policy = InboundTrafficPolicy::new("bookstore", ["bookstore"])
        .with_rule(Rule::new(route("/buy", ["GET", "POST", "GET", "*"], "bookstore|80"), ["*"]));

    let configs = compile_inbound(vec![policy]);
    let routes = &configs[0].virtual_hosts[0].routes;
    assert_eq!(routes.len(), 1);
    assert_eq!(method_regex(&routes[0]), Some(".*"));
}

#[test]
fn invalid_rate_limit_unit_keeps_route_and_authorization() {
    let limited = route("/buy", ["GET"], "bookstore|80").with_rate_limit(PerRouteRateLimitSpec {
        local: Some(LocalRateLimitSpec {
            requests: 10,
            burst: 0,
            unit: "fortnight".into(),
            response_status_code: None,
            response_headers_to_add: vec![],
        }),
        global: None,
    });
    let policy = InboundTrafficPolicy::new("bookstore", ["bookstore"])
        .with_rule(Rule::new(limited, ["bookbuyer.default"]));

    let configs = compile_inbound(vec![policy]);
    let routes = &configs[0].virtual_hosts[0].routes;
    assert_eq!(routes.len(), 1);
    assert!(routes[0].typed_per_filter_config.contains_key(RBAC_FILTER_NAME));
    assert!(!routes[0].typed_per_filter_config.contains_key(LOCAL_RATE_LIMIT_FILTER_NAME));
}

#[test]
fn principals_are_qualified_with_trust_domain() {
    let policy = InboundTrafficPolicy::new("bookstore", ["bookstore"])
        .with_rule(Rule::new(route("/buy", ["GET"], "bookstore|80"), ["bookbuyer.default"]));

    let configs = compile_inbound(vec![policy]);
    let route = &configs[0].virtual_hosts[0].routes[0];
    let rbac: RbacPerRoute = message_from_any(
        &route.typed_per_filter_config[RBAC_FILTER_NAME],
        RBAC_PER_ROUTE_TYPE_URL,
    )
    .expect("decode rbac");

    let encoded = format!("{:?}", rbac);
    assert!(encoded.contains("bookbuyer.default.cluster.local"));
}

#[test]
fn unauthorized_and_zero_weight_rules_are_dropped() {
    let policy = InboundTrafficPolicy::new("bookstore", ["bookstore"])
        .with_rule(Rule::new(route("/nobody", ["GET"], "bookstore|80"), Vec::<String>::new()))
        .with_rule(Rule::new(
            RouteWeightedClusters::new(
                HttpRouteMatch::regex("/zero", ["GET"]),
                vec![WeightedCluster::new("bookstore|80", 0)],
            ),
            ["*"],
        ))
        .with_rule(Rule::new(route("/ok", ["GET"], "bookstore|80"), ["*"]));

    let configs = compile_inbound(vec![policy]);
    let routes = &configs[0].virtual_hosts[0].routes;
    assert_eq!(routes.len(), 1);
    assert_eq!(path_regex(&routes[0]), Some("/ok"));
}

#[test]
fn every_shape_is_named_and_ordered() {
    let configs = RoutesBuilder::new()
        .inbound_port_specific_route_configs(BTreeMap::from([
            (8080, vec![bookstore_inbound()]),
            (80, vec![bookstore_inbound()]),
        ]))
        .outbound_port_specific_route_configs(BTreeMap::from([(80, vec![bookstore_outbound()])]))
        .ingress_traffic_policies(vec![bookstore_inbound()])
        .egress_port_specific_route_configs(BTreeMap::from([(443, vec![github_egress()])]))
        .trust_domain(TRUST_DOMAIN)
        .build();

    assert_eq!(
        config_names(&configs),
        vec![
            "rds-inbound.80",
            "rds-inbound.8080",
            "rds-outbound.80",
            "rds-ingress",
            "rds-egress.443",
        ]
    );

    let outbound = &configs[2].virtual_hosts[0].routes;
    assert_eq!(outbound.len(), 1);
    assert_eq!(path_regex(&outbound[0]), Some(".*"));
    assert!(outbound[0].typed_per_filter_config.is_empty());
    assert_eq!(
        weighted_clusters(&outbound[0]),
        Some((
            100,
            vec!["default/bookstore-v1|80".to_string(), "default/bookstore-v2|80".to_string()]
        ))
    );

    let egress = &configs[4].virtual_hosts[0].routes;
    assert_eq!(egress.len(), 2);
    assert!(egress.iter().all(|route| route.typed_per_filter_config.is_empty()));
}

#[test]
fn compiled_resources_package_into_discovery_response() {
    let configs = compile_inbound(vec![bookstore_inbound()]);
    let first = discovery_response(route_resources(&configs));
    let second = discovery_response(route_resources(&compile_inbound(vec![bookstore_inbound()])));

    assert_eq!(first.resources.len(), 1);
    assert_eq!(first.version_info, second.version_info);
}

fn per_second(requests: u32, burst: u32) -> LocalRateLimitSpec {
    LocalRateLimitSpec {
        requests,
        burst,
        unit: "second".into(),
        response_status_code: None,
        response_headers_to_add: vec![],
    }
}

fn rate_limited_bookstore() -> InboundTrafficPolicy {
    let limited = route("/buy", ["*"], "bookstore|80")
        .with_rate_limit(PerRouteRateLimitSpec { local: Some(per_second(10, 5)), global: None });
    InboundTrafficPolicy::new("bookstore", ["bookstore"])
        .with_rule(Rule::new(limited, ["*"]))
        .with_rate_limit(RateLimitSpec { local: Some(per_second(100, 0)), global: None })
}

#[test]
fn routes_with_several_filter_configs_keep_one_version() {
    let configs = compile_inbound(vec![rate_limited_bookstore()]);
    let route = &configs[0].virtual_hosts[0].routes[0];
    assert!(route.typed_per_filter_config.contains_key(RBAC_FILTER_NAME));
    assert!(route.typed_per_filter_config.contains_key(LOCAL_RATE_LIMIT_FILTER_NAME));

    let versions: BTreeSet<String> = (0..64)
        .map(|_| {
            let configs = compile_inbound(vec![rate_limited_bookstore()]);
            discovery_response(route_resources(&configs)).version_info
        })
        .collect();
    assert_eq!(versions.len(), 1);
}

fn method_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["GET", "POST", "PUT", "DELETE", "", "*"]).prop_map(String::from)
}

fn rule_strategy() -> impl Strategy<Value = (Vec<String>, Vec<(String, u32)>)> {
    (
        prop::collection::vec(method_strategy(), 0..6),
        prop::collection::vec(("[a-c]", 1u32..50), 1..4),
    )
}

fn expected_route_count(methods: &[String]) -> usize {
    if methods.iter().any(|method| method == "*") {
        return 1;
    }
    let distinct: std::collections::BTreeSet<&String> =
        methods.iter().filter(|method| !method.is_empty()).collect();
    distinct.len()
}

proptest! {
    #[test]
    fn inbound_route_count_follows_methods(rules in prop::collection::vec(rule_strategy(), 0..5)) {
        let mut policy = InboundTrafficPolicy::new("svc", ["svc"]);
        let mut expected = 0;
        for (index, (methods, clusters)) in rules.iter().enumerate() {
            expected += expected_route_count(methods);
            let clusters = clusters
                .iter()
                .map(|(name, weight)| WeightedCluster::new(name.clone(), *weight))
                .collect();
            policy = policy.with_rule(Rule::new(
                RouteWeightedClusters::new(
                    HttpRouteMatch::regex(format!("/r{index}"), methods.clone()),
                    clusters,
                ),
                ["*"],
            ));
        }

        let configs = compile_inbound(vec![policy]);
        prop_assert_eq!(configs[0].virtual_hosts[0].routes.len(), expected);
    }

    #[test]
    fn weighted_cluster_order_does_not_change_output(
        clusters in prop::collection::vec(("[a-d]", 1u32..100), 1..6)
    ) {
        let forward: Vec<WeightedCluster> = clusters
            .iter()
            .map(|(name, weight)| WeightedCluster::new(name.clone(), *weight))
            .collect();
        let mut reversed = forward.clone();
        reversed.reverse();

        let compile = |clusters: Vec<WeightedCluster>| {
            let policy = InboundTrafficPolicy::new("svc", ["svc"]).with_rule(Rule::new(
                RouteWeightedClusters::new(
                    HttpRouteMatch::regex("/", ["GET"]),
                    clusters,
                ),
                ["*"],
            ));
            route_resources(&compile_inbound(vec![policy]))
        };

        prop_assert_eq!(compile(forward), compile(reversed));
    }

    #[test]
    fn repeated_builds_share_a_version(
        rules in prop::collection::vec((rule_strategy(), any::<bool>()), 1..4),
        vhost_limited in any::<bool>(),
    ) {
        let policy = || {
            let mut policy = InboundTrafficPolicy::new("svc", ["svc"]);
            for (index, ((methods, clusters), limited)) in rules.iter().enumerate() {
                let clusters = clusters
                    .iter()
                    .map(|(name, weight)| WeightedCluster::new(name.clone(), *weight))
                    .collect();
                let mut route = RouteWeightedClusters::new(
                    HttpRouteMatch::regex(format!("/r{index}"), methods.clone()),
                    clusters,
                );
                if *limited {
                    route = route.with_rate_limit(PerRouteRateLimitSpec {
                        local: Some(per_second(10, 5)),
                        global: None,
                    });
                }
                policy = policy.with_rule(Rule::new(route, ["svc.default"]));
            }
            if vhost_limited {
                let limit = RateLimitSpec { local: Some(per_second(100, 0)), global: None };
                policy = policy.with_rate_limit(limit);
            }
            policy
        };

        let versions: BTreeSet<String> = (0..8)
            .map(|_| resources_version(&route_resources(&compile_inbound(vec![policy()]))))
            .collect();
        prop_assert_eq!(versions.len(), 1);
    }
}

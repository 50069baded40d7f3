//! RBAC (Role-Based Access Control) HTTP filter configuration
//!
//! Inbound and ingress routes carry a per-route RBAC override that allows
//! exactly the callers named by the route's rule.

use crate::domain::{qualify_principal, Rule, WILDCARD_PRINCIPAL};
use crate::xds::filters::{any_from_message, invalid_config};
use envoy_types::pb::envoy::config::rbac::v3::{
    permission, principal, Permission, Policy, Principal, Rbac as RbacRulesProto,
};
use envoy_types::pb::envoy::extensions::filters::http::rbac::v3::{
    Rbac as RbacProto, RbacPerRoute as RbacPerRouteProto,
};
use envoy_types::pb::envoy::r#type::matcher::v3::{string_matcher::MatchPattern, StringMatcher};
use envoy_types::pb::google::protobuf::Any as EnvoyAny;
use std::collections::{BTreeSet, HashMap};

/// Type URL for per-route RBAC configuration
pub const RBAC_PER_ROUTE_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.http.rbac.v3.RBACPerRoute";

/// Name of the single policy attached to each route
pub const ROUTE_POLICY_NAME: &str = "rbac-for-route";

/// Permission rule for RBAC
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionRule {
    /// Match any request
    Any,
}

impl PermissionRule {
    fn to_proto(&self) -> Permission {
        match self {
            Self::Any => Permission { rule: Some(permission::Rule::Any(true)) },
        }
    }
}

/// Principal rule for RBAC (who is making the request)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalRule {
    /// Match any principal
    Any,
    /// Match an authenticated peer by exact principal name
    Authenticated { principal_name: String },
    /// OR of multiple principals
    OrIds { ids: Vec<PrincipalRule> },
}

impl PrincipalRule {
    fn to_proto(&self) -> Principal {
        let identifier = match self {
            Self::Any => principal::Identifier::Any(true),
            Self::Authenticated { principal_name } => {
                principal::Identifier::Authenticated(principal::Authenticated {
                    principal_name: Some(StringMatcher {
                        match_pattern: Some(MatchPattern::Exact(principal_name.clone())),
                        ignore_case: false,
                    }),
                })
            }
            Self::OrIds { ids } => principal::Identifier::OrIds(principal::Set {
                ids: ids.iter().map(Self::to_proto).collect(),
            }),
        };

        Principal { identifier: Some(identifier) }
    }
}

/// RBAC policy definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbacPolicy {
    /// What actions are allowed
    pub permissions: Vec<PermissionRule>,
    /// Who can perform the actions
    pub principals: Vec<PrincipalRule>,
}

impl RbacPolicy {
    /// Policy allowing any request from the given principals.
    ///
    /// A wildcard principal allows every caller. Otherwise each principal is
    /// qualified with `trust_domain` and becomes its own `or_ids` entry, in
    /// sorted order.
    pub fn for_principals(principals: &BTreeSet<String>, trust_domain: &str) -> Self {
        let principals = if principals.contains(WILDCARD_PRINCIPAL) {
            vec![PrincipalRule::Any]
        } else {
            principals
                .iter()
                .map(|name| PrincipalRule::OrIds {
                    ids: vec![PrincipalRule::Authenticated {
                        principal_name: qualify_principal(name, trust_domain),
                    }],
                })
                .collect()
        };

        Self { permissions: vec![PermissionRule::Any], principals }
    }

    fn to_proto(&self) -> Policy {
        Policy {
            permissions: self.permissions.iter().map(PermissionRule::to_proto).collect(),
            principals: self.principals.iter().map(PrincipalRule::to_proto).collect(),
            condition: None,
            checked_condition: None,
            cel_config: None,
        }
    }
}

/// Per-route RBAC override with a single ALLOW policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbacPerRouteConfig {
    pub policy_name: String,
    pub policy: RbacPolicy,
}

impl RbacPerRouteConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.policy.principals.is_empty() {
            return Err(invalid_config(format!(
                "RBAC policy '{}' has no principals",
                self.policy_name
            )));
        }
        Ok(())
    }

    /// Convert to Envoy Any protobuf
    pub fn to_any(&self) -> Result<EnvoyAny, crate::Error> {
        self.validate()?;

        let mut policies = HashMap::new();
        policies.insert(self.policy_name.clone(), self.policy.to_proto());

        let proto = RbacPerRouteProto {
            rbac: Some(RbacProto {
                rules: Some(RbacRulesProto {
                    // ALLOW
                    action: 0,
                    policies,
                    audit_logging_options: None,
                }),
                rules_stat_prefix: String::new(),
                shadow_rules: None,
                shadow_rules_stat_prefix: String::new(),
                track_per_rule_stats: false,
                matcher: None,
                shadow_matcher: None,
            }),
        };

        Ok(any_from_message(RBAC_PER_ROUTE_TYPE_URL, &proto))
    }
}

/// Build the per-route RBAC filter config for an inbound rule.
///
/// A rule without allowed principals cannot be authorized and is rejected.
pub fn inbound_rbac_for_rule(rule: &Rule, trust_domain: &str) -> Result<EnvoyAny, crate::Error> {
    if !rule.is_authorized() {
        return Err(crate::Error::validation_field(
            format!(
                "rule for path '{}' has no allowed principals",
                rule.route.route_match.path
            ),
            "allowed_principals",
        ));
    }

    RbacPerRouteConfig {
        policy_name: ROUTE_POLICY_NAME.to_string(),
        policy: RbacPolicy::for_principals(&rule.allowed_principals, trust_domain),
    }
    .to_any()
}

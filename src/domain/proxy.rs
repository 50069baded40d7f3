//! Proxy identity
//!
//! The proxy a compilation targets, identified by the service account it runs
//! as. Pod metadata, when known, feeds the stats headers injected into inbound
//! responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::route::WILDCARD_PRINCIPAL;

const UNKNOWN: &str = "unknown";

/// A service account identity of the form `<name>.<namespace>`, or `*`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceIdentity(String);

impl ServiceIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// Identity for a service account in a namespace
    pub fn from_service_account(name: &str, namespace: &str) -> Self {
        Self(format!("{name}.{namespace}"))
    }

    /// The identity matching every caller
    pub fn wildcard() -> Self {
        Self(WILDCARD_PRINCIPAL.to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD_PRINCIPAL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Service account name, the part before the first `.`
    pub fn name(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(name, _)| name)
    }

    /// Namespace, the part after the first `.`
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, namespace)| namespace)
    }

    /// Authenticated principal name under `trust_domain`.
    ///
    /// The wildcard stays a wildcard; an identity already carrying the trust
    /// domain suffix is returned unchanged.
    pub fn to_principal(&self, trust_domain: &str) -> String {
        qualify_principal(&self.0, trust_domain)
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Qualify a principal string with a trust domain
pub fn qualify_principal(principal: &str, trust_domain: &str) -> String {
    if principal == WILDCARD_PRINCIPAL || trust_domain.is_empty() {
        return principal.to_string();
    }
    let suffix = format!(".{trust_domain}");
    if principal.ends_with(&suffix) {
        principal.to_string()
    } else {
        format!("{principal}{suffix}")
    }
}

/// Kubernetes metadata of the pod hosting the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMetadata {
    pub name: String,
    pub namespace: String,

    /// Kind of the controlling owner reference, e.g. `ReplicaSet`
    #[serde(default)]
    pub owner_kind: Option<String>,

    /// Name of the controlling owner reference
    #[serde(default)]
    pub owner_name: Option<String>,
}

impl PodMetadata {
    /// Workload kind and name.
    ///
    /// A ReplicaSet owner is reported as the Deployment that created it, with
    /// the pod template hash suffix removed from the name.
    pub fn workload(&self) -> (String, String) {
        match (&self.owner_kind, &self.owner_name) {
            (Some(kind), Some(name)) if kind == "ReplicaSet" => match name.rsplit_once('-') {
                Some((deployment, _)) => ("Deployment".to_string(), deployment.to_string()),
                None => (kind.clone(), name.clone()),
            },
            (Some(kind), Some(name)) => (kind.clone(), name.clone()),
            _ => (UNKNOWN.to_string(), UNKNOWN.to_string()),
        }
    }
}

/// The proxy routes are compiled for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proxy {
    pub identity: ServiceIdentity,

    #[serde(default)]
    pub pod: Option<PodMetadata>,
}

impl Proxy {
    pub fn new(identity: ServiceIdentity) -> Self {
        Self { identity, pod: None }
    }

    pub fn with_pod(mut self, pod: PodMetadata) -> Self {
        self.pod = Some(pod);
        self
    }

    /// Response headers identifying the workload behind this proxy.
    ///
    /// Missing metadata is reported as `unknown`.
    pub fn stats_headers(&self) -> BTreeMap<String, String> {
        let (namespace, pod_name, (kind, name)) = match &self.pod {
            Some(pod) => (pod.namespace.clone(), pod.name.clone(), pod.workload()),
            None => (
                self.identity.namespace().unwrap_or(UNKNOWN).to_string(),
                UNKNOWN.to_string(),
                (UNKNOWN.to_string(), UNKNOWN.to_string()),
            ),
        };

        BTreeMap::from([
            ("osm-stats-namespace".to_string(), namespace),
            ("osm-stats-kind".to_string(), kind),
            ("osm-stats-name".to_string(), name),
            ("osm-stats-pod".to_string(), pod_name),
        ])
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pod {
            Some(pod) => write!(f, "{} ({}/{})", self.identity, pod.namespace, pod.name),
            None => write!(f, "{}", self.identity),
        }
    }
}

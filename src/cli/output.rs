//! Shared output formatting utilities for CLI commands
//!
//! Compiled resources render as JSON, YAML, or a summary table of virtual
//! hosts and routes.

use anyhow::{Context, Result};
use clap::ValueEnum;
use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;
use serde::Serialize;

use crate::xds::filters::TypedConfig;
use crate::xds::BuiltResource;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Summary,
}

/// One compiled resource as printed by `compile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledResource {
    pub name: String,
    #[serde(flatten)]
    pub config: TypedConfig,
}

impl From<&BuiltResource> for CompiledResource {
    fn from(resource: &BuiltResource) -> Self {
        Self { name: resource.name.clone(), config: resource.typed_config() }
    }
}

/// Serialize data as pretty JSON
pub fn to_json<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data).context("Failed to serialize to JSON")
}

/// Serialize data as YAML
pub fn to_yaml<T: Serialize>(data: &T) -> Result<String> {
    serde_yaml::to_string(data).context("Failed to serialize to YAML")
}

/// Truncate string to maximum length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn table_header(columns: &[(&str, usize)]) -> String {
    let mut header = String::new();
    for (name, width) in columns {
        header.push_str(&format!("{:<width$} ", name, width = width));
    }
    let total_width: usize = columns.iter().map(|(_, w)| w + 1).sum();
    format!("{}\n{}\n", header.trim_end(), "-".repeat(total_width.saturating_sub(1)))
}

/// Table of route configurations with their virtual hosts and route counts.
///
/// The virtual host column is as wide as the longest name; names are never
/// truncated.
pub fn summary_table(configs: &[RouteConfiguration]) -> String {
    let vhost_width = configs
        .iter()
        .flat_map(|config| &config.virtual_hosts)
        .map(|vhost| vhost.name.chars().count())
        .fold("Virtual Host".len(), usize::max);
    let columns =
        [("Route Config", 24), ("Virtual Host", vhost_width), ("Domains", 40), ("Routes", 6)];
    let mut table = table_header(&columns);

    let mut push_row = |config: &str, vhost: &str, domains: &str, routes: usize| {
        table.push_str(&format!(
            "{:<24} {:<vhost_width$} {:<40} {}\n",
            truncate(config, 24),
            vhost,
            truncate(domains, 40),
            routes
        ));
    };

    for config in configs {
        if config.virtual_hosts.is_empty() {
            push_row(&config.name, "-", "-", 0);
            continue;
        }
        for vhost in &config.virtual_hosts {
            push_row(&config.name, &vhost.name, &vhost.domains.join(","), vhost.routes.len());
        }
    }

    table.push_str(&format!("\n{} route configuration(s)", configs.len()));
    table
}

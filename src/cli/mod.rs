//! # Command Line Interface
//!
//! Offline route compilation: read a policy snapshot file, compile it, and
//! print the resulting RDS resources.

pub mod output;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::CompilerConfig;
use crate::domain::PolicySnapshot;
use crate::observability::{init_logging, log_config_info};
use crate::xds::{resources_version, route_resources};
use output::{summary_table, to_json, to_yaml, CompiledResource, OutputFormat};

#[derive(Parser)]
#[command(name = "meshplane")]
#[command(about = "Compile service mesh traffic policy into Envoy route configurations")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Trust domain override
    #[arg(long, global = true)]
    pub trust_domain: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a policy snapshot into route configurations
    Compile {
        /// Snapshot file (YAML, or JSON with a .json extension)
        snapshot: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,

        /// Add proxy stats headers to inbound responses
        #[arg(long)]
        stats_headers: bool,
    },

    /// Print the names of the route configurations a snapshot compiles to
    Names {
        /// Snapshot file (YAML, or JSON with a .json extension)
        snapshot: PathBuf,
    },
}

/// Run CLI commands
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CompilerConfig::from_env().context("Failed to load configuration")?;
    if cli.verbose {
        config.log_level = "debug".to_string();
    }
    if let Some(trust_domain) = cli.trust_domain {
        config.trust_domain = trust_domain;
    }
    config.validate().context("Invalid configuration")?;

    if init_logging(&config).is_err() {
        // Subscriber already set elsewhere (e.g. integration tests); ignore.
    }
    log_config_info(&config);

    let rendered = execute(&cli.command, &config)?;
    println!("{}", rendered);
    Ok(())
}

/// Run one command and return what it prints
pub fn execute(command: &Commands, config: &CompilerConfig) -> anyhow::Result<String> {
    match command {
        Commands::Compile { snapshot, output, stats_headers } => {
            let mut config = config.clone();
            config.enable_stats_headers |= *stats_headers;
            compile(snapshot, *output, &config)
        }
        Commands::Names { snapshot } => {
            let snapshot = load_snapshot(snapshot)?;
            let names: Vec<String> = snapshot
                .into_builder(config)
                .build()
                .into_iter()
                .map(|route_config| route_config.name)
                .collect();
            Ok(names.join("\n"))
        }
    }
}

fn load_snapshot(path: &Path) -> anyhow::Result<PolicySnapshot> {
    PolicySnapshot::from_path(path)
        .with_context(|| format!("Failed to load policy snapshot from {}", path.display()))
}

fn compile(path: &Path, format: OutputFormat, config: &CompilerConfig) -> anyhow::Result<String> {
    let snapshot = load_snapshot(path)?;
    if snapshot.is_empty() {
        info!(snapshot = %path.display(), "Snapshot holds no policy");
    }

    let route_configs = snapshot.into_builder(config).build();
    if format == OutputFormat::Summary {
        return Ok(summary_table(&route_configs));
    }

    let resources = route_resources(&route_configs);
    let compiled: Vec<CompiledResource> = resources.iter().map(CompiledResource::from).collect();
    info!(
        resources = compiled.len(),
        version = %resources_version(&resources),
        "Compiled route resources"
    );

    if format == OutputFormat::Yaml {
        to_yaml(&compiled)
    } else {
        to_json(&compiled)
    }
}

//! meshplan CLI - Backhaul and channel planning for mesh access points
//!
//! Reads one fleet telemetry snapshot, runs a planning cycle and writes the
//! controller plan and visualization graphs.

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use meshplan::MergePolicy;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::PlanOptions;

/// meshplan - Mesh backhaul planner
#[derive(Parser)]
#[command(name = "meshplan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Plan mesh backhaul topology and radio channels from fleet telemetry")]
#[command(long_about = r#"
meshplan turns a snapshot of link observations from a fleet of access points
into a backhaul tree, optional backup links and a per-radio channel plan.

Examples:
  meshplan plan snapshot.json                      # Plan and print a summary
  meshplan plan snapshot.json -o plan.json         # Write the controller plan
  meshplan plan snapshot.json --channels 36,40,44  # Plan on 5 GHz channels
  meshplan schema                                  # Print the snapshot JSON Schema
"#)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one planning cycle over a snapshot file
    Plan {
        /// Fleet telemetry snapshot (JSON)
        snapshot: PathBuf,

        /// How two directional readings of a link are merged
        #[arg(long, value_parser = parse_policy)]
        policy: Option<MergePolicy>,

        /// Skip the backup link search
        #[arg(long)]
        no_backup: bool,

        /// Seed for channel tie-breaks
        #[arg(long, env = "MESHPLAN_SEED")]
        seed: Option<u64>,

        /// Assignable channels, comma separated
        #[arg(long)]
        channels: Option<String>,

        /// Write the plan report (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the plan visualization graph (JSON)
        #[arg(long)]
        viz: Option<PathBuf>,

        /// Write every possible link as a visualization graph (JSON)
        #[arg(long)]
        connectivity_viz: Option<PathBuf>,
    },

    /// Print the JSON Schema of the snapshot format
    Schema,

    /// Configuration management
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Set a configuration value (key=value)
        #[arg(long)]
        set: Option<String>,
    },
}

fn parse_policy(value: &str) -> std::result::Result<MergePolicy, String> {
    value.parse().map_err(|e: meshplan::MeshPlanError| e.to_string())
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("meshplan={},warn", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let mut config = config::Config::load()?;

    match cli.command {
        Commands::Plan {
            snapshot,
            policy,
            no_backup,
            seed,
            channels,
            output,
            viz,
            connectivity_viz,
        } => {
            let options = PlanOptions {
                snapshot,
                policy,
                no_backup,
                seed,
                channels,
                output,
                viz,
                connectivity_viz,
            };
            commands::plan(&config, &options)?;
        }
        Commands::Schema => {
            commands::schema()?;
        }
        Commands::Config { show, set } => {
            if show {
                commands::show_config(&config)?;
            } else if let Some(kv) = set {
                commands::set_config(&mut config, &kv)?;
            } else {
                commands::show_config(&config)?;
            }
        }
    }

    Ok(())
}

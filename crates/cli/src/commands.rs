//! CLI subcommand handlers

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use meshplan::{
    Diagnostic, FleetSnapshot, InvariantViolation, MergePolicy, MeshPlanError, MeshPlanner,
    PlanSummary, PlannerConfig, PushPlan, VisualGraph,
};
use serde::Serialize;

use crate::{
    config::{self, Config},
    output::OutputHandler,
};

/// Command-line overrides for one planning run
#[derive(Debug, Default, Clone)]
pub struct PlanOptions {
    pub snapshot: PathBuf,
    pub policy: Option<MergePolicy>,
    pub no_backup: bool,
    pub seed: Option<u64>,
    pub channels: Option<String>,
    pub output: Option<PathBuf>,
    pub viz: Option<PathBuf>,
    pub connectivity_viz: Option<PathBuf>,
}

/// Everything written by `meshplan plan --output`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanReport<'a> {
    summary: PlanSummary,
    push: &'a PushPlan,
    diagnostics: &'a [Diagnostic],
    notices: &'a [InvariantViolation],
}

/// File settings with command-line flags applied on top
pub fn effective_planner_config(config: &Config, options: &PlanOptions) -> Result<PlannerConfig> {
    let mut planner = config.planner.clone();

    if let Some(policy) = options.policy {
        planner = planner.with_merge_policy(policy);
    }
    if options.no_backup {
        planner.survivability = false;
    }
    if let Some(seed) = options.seed {
        planner.seed = seed;
    }
    if let Some(channels) = &options.channels {
        planner = planner.with_channels(config::parse_channels(channels)?);
    }

    planner.validate()?;
    Ok(planner)
}

/// Run one planning cycle over a snapshot file
pub fn plan(config: &Config, options: &PlanOptions) -> Result<()> {
    let output = OutputHandler::new(config.output.show_links);

    tracing::debug!(snapshot = %options.snapshot.display(), "Loading snapshot");
    let content = std::fs::read_to_string(&options.snapshot)
        .with_context(|| format!("failed to read snapshot {}", options.snapshot.display()))?;
    let snapshot = FleetSnapshot::from_json(&content)
        .with_context(|| format!("failed to parse snapshot {}", options.snapshot.display()))?;

    let planner_config = effective_planner_config(config, options)?;
    tracing::debug!(
        policy = planner_config.merge_policy.as_str(),
        survivability = planner_config.survivability,
        seed = planner_config.seed,
        "Effective planner settings"
    );
    let planner = MeshPlanner::new(planner_config)?;
    let outcome = match planner.plan(&snapshot) {
        Ok(outcome) => outcome,
        Err(MeshPlanError::Connectivity { message, unreached }) => {
            output.print_error(&message);
            for node in &unreached {
                println!("  {} {}", "unreached".dimmed(), node);
            }
            anyhow::bail!("planning failed: the fleet is not connected");
        }
        Err(e) => return Err(e).context("planning failed"),
    };

    let push = outcome.plan.push_plan().context("failed to build the controller plan")?;

    let summary = outcome.summary();
    output.print_summary(&summary);
    output.print_links(&push);
    output.print_diagnostics(&outcome.diagnostics, &outcome.notices);

    if let Some(path) = &options.output {
        let report = PlanReport {
            summary,
            push: &push,
            diagnostics: &outcome.diagnostics,
            notices: &outcome.notices,
        };
        write_json(path, &report, config.output.pretty)?;
        output.print_success(&format!("Plan written to {}", path.display()));
    }
    if let Some(path) = &options.viz {
        write_json(path, &outcome.plan.visualization(), config.output.pretty)?;
        output.print_success(&format!("Visualization written to {}", path.display()));
    }
    if let Some(path) = &options.connectivity_viz {
        write_json(path, &VisualGraph::connectivity(&outcome.connectivity), config.output.pretty)?;
        output.print_success(&format!("Connectivity graph written to {}", path.display()));
    }

    Ok(())
}

/// Print the JSON Schema of the snapshot format
pub fn schema() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&FleetSnapshot::json_schema())?);
    Ok(())
}

pub fn show_config(config: &Config) -> Result<()> {
    let output = OutputHandler::new(false);
    output.print_header("Configuration");

    println!(
        "  {} {}",
        "Config file:".dimmed(),
        Config::config_path().display()
    );
    println!();
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

pub fn set_config(config: &mut Config, kv: &str) -> Result<()> {
    let output = OutputHandler::new(false);

    let (key, value) = kv
        .split_once('=')
        .with_context(|| format!("expected key=value, got '{}'", kv))?;
    config.set(key.trim(), value.trim())?;
    config.save()?;

    output.print_success(&format!("Set {} = {}", key.trim(), value.trim()));
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    tracing::debug!(path = %path.display(), "Writing JSON");
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

//! Mesh planner - runs one planning cycle end to end
//!
//! ingest -> merge -> spanning tree -> backup links -> channels -> validation

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::PlannerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::plan::{Plan, PlanSummary};
use crate::telemetry::FleetSnapshot;
use crate::topology::channels::{ChannelPlanner, DeviceChannelUsage, GlobalChannelUsage};
use crate::topology::graph::{DirectedMeshGraph, MeshGraph};
use crate::topology::invariants::{InvariantViolation, PlanValidator};
use crate::topology::merge::GraphMerger;
use crate::topology::spanning::TopologyPlanner;
use crate::topology::survival::SurvivabilityPlanner;
use crate::Result;

/// Result of a successful planning cycle
#[derive(Debug, Clone)]
pub struct PlanningOutcome {
    pub plan: Plan,
    /// The merged graph the plan was grown from
    pub connectivity: MeshGraph,
    /// Non-fatal warnings collected during the cycle
    pub diagnostics: Vec<Diagnostic>,
    /// Informational validator findings
    pub notices: Vec<InvariantViolation>,
}

impl PlanningOutcome {
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            diagnostics: self.diagnostics.len(),
            ..self.plan.summary()
        }
    }
}

/// Entry point of the planning engine
#[derive(Debug, Clone)]
pub struct MeshPlanner {
    config: PlannerConfig,
}

impl MeshPlanner {
    pub fn new(config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan from a telemetry snapshot
    pub fn plan(&self, snapshot: &FleetSnapshot) -> Result<PlanningOutcome> {
        let mut sink = DiagnosticsSink::new();
        let directed = snapshot.to_directed_graph(&self.config, &mut sink)?;
        self.run(&directed, sink)
    }

    /// Plan from an already assembled directed graph
    pub fn plan_directed(&self, directed: &DirectedMeshGraph) -> Result<PlanningOutcome> {
        self.run(directed, DiagnosticsSink::new())
    }

    /// Merge a snapshot into its connectivity graph without planning
    pub fn connectivity(&self, snapshot: &FleetSnapshot) -> Result<(MeshGraph, Vec<Diagnostic>)> {
        let mut sink = DiagnosticsSink::new();
        let directed = snapshot.to_directed_graph(&self.config, &mut sink)?;
        let graph = GraphMerger::new(self.config.merge_policy).merge(&directed, &mut sink)?;
        Ok((graph, sink.into_entries()))
    }

    fn run(&self, directed: &DirectedMeshGraph, mut sink: DiagnosticsSink) -> Result<PlanningOutcome> {
        let config = &self.config;
        tracing::info!(
            seed = config.seed,
            policy = config.merge_policy.as_str(),
            survivability = config.survivability,
            "Starting planning cycle"
        );

        let connectivity = GraphMerger::new(config.merge_policy).merge(directed, &mut sink)?;

        let mut tree = TopologyPlanner::new(&connectivity, &config.bandwidth).build_tree()?;

        if config.survivability {
            SurvivabilityPlanner::new(&connectivity, &config.bandwidth)
                .add_backup_links(&mut tree, &mut sink)?;
        }

        let palette = config.assignable_channels.clone();
        let mut usage = GlobalChannelUsage::new(&palette);
        let mut devices = DeviceChannelUsage::new();
        let mut rng = StdRng::seed_from_u64(config.seed);
        ChannelPlanner::new(&connectivity, &palette).assign(&mut tree, &mut usage, &mut devices, &mut rng)?;

        let plan = Plan::new(tree, palette, usage, devices, config.seed);
        let notices = PlanValidator::new().validate(&plan)?;

        tracing::info!(
            links = plan.primary_links().count(),
            backups = plan.backup_links().count(),
            diagnostics = sink.len(),
            "Planning cycle complete"
        );

        Ok(PlanningOutcome {
            plan,
            connectivity,
            diagnostics: sink.into_entries(),
            notices,
        })
    }
}

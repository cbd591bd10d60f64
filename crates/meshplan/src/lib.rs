//! # meshplan - Backhaul planning for controller-managed mesh access points
//!
//! Turns one snapshot of noisy, asymmetric link telemetry from a fleet of
//! access points into a backhaul topology and a per-radio channel plan.
//!
//! ## Pipeline
//!
//! - **Graph Merger**: folds directional observations into one undirected
//!   connectivity graph, dropping links only one side has reported
//! - **Topology Planner**: greedy spanning-tree growth with edge scores that are
//!   recomputed against the partial tree after every addition
//! - **Survivability Planner**: simulates each link failing and adds the best
//!   crossing link as a backup
//! - **Channel Planner**: colors channel groups with an interference-minimizing
//!   election and a seeded tie-break
//! - **Plan Validator**: structural and capacity invariants checked before a
//!   plan may leave the engine
//!
//! Each planning cycle is a synchronous batch computation owning its own graph.

pub mod config;
pub mod diagnostics;
pub mod plan;
pub mod planner;
pub mod telemetry;
pub mod topology;

pub use config::{MergePolicy, PlannerConfig};
pub use diagnostics::{Diagnostic, DiagnosticsSink};
pub use plan::{
    ChannelCount, ConnectionKind, LinkEndpoint, LinkRole, LinkState, Plan, PlanSummary, PushLink,
    PushPlan, RadioAssignment, VisualGraph, VisualLink, VisualNode, VisualNodeKind,
};
pub use planner::{MeshPlanner, PlanningOutcome};
pub use telemetry::{DeviceInventory, FleetSnapshot, ForeignSighting, LinkObservation, RadioInventory};
pub use topology::{
    bandwidth::{estimate_bandwidth, BandwidthSegment, BandwidthTable},
    channels::{ChannelPlanner, DeviceChannelUsage, GlobalChannelUsage},
    engine::TopologyEngine,
    graph::{
        ChannelGroup, ChannelId, DirectedMeshGraph, Edge, EdgeKey, EdgeKind, MeshGraph, Node,
        NodeId, NodeKind, RadioBand, RealLink,
    },
    invariants::{InvariantViolation, PlanValidator, ViolationSeverity},
    merge::GraphMerger,
    spanning::{EdgeScorer, TopologyPlanner, VIRTUAL_EDGE_SCORE},
    survival::SurvivabilityPlanner,
};

/// Errors that abort a planning cycle
#[derive(Debug, thiserror::Error)]
pub enum MeshPlanError {
    #[error("Connectivity error: {message}")]
    Connectivity {
        message: String,
        unreached: Vec<NodeId>,
    },

    #[error("Inconsistent data: {0}")]
    InconsistentData(String),

    #[error("Plan validation failed: {}", .0.message)]
    Validation(Box<InvariantViolation>),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MeshPlanError {
    pub(crate) fn connectivity(message: impl Into<String>, unreached: Vec<NodeId>) -> Self {
        Self::Connectivity {
            message: message.into(),
            unreached,
        }
    }
}

pub type Result<T> = std::result::Result<T, MeshPlanError>;

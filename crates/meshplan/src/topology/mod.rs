//! Topology module - Connectivity model and the planning stages built on it

pub mod bandwidth;
pub mod channels;
pub mod engine;
pub mod graph;
pub mod invariants;
pub mod merge;
pub mod spanning;
pub mod survival;

pub use bandwidth::BandwidthTable;
pub use channels::{ChannelPlanner, DeviceChannelUsage, GlobalChannelUsage};
pub use engine::TopologyEngine;
pub use graph::{ChannelGroup, ChannelId, DirectedMeshGraph, Edge, EdgeKey, MeshGraph, Node, NodeId};
pub use invariants::PlanValidator;
pub use merge::GraphMerger;
pub use spanning::{EdgeScorer, TopologyPlanner};
pub use survival::SurvivabilityPlanner;

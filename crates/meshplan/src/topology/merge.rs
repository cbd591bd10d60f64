//! Graph merger - folds directional observations into one undirected graph

use super::graph::{DirectedMeshGraph, Edge, EdgeKey, MeshGraph};
use crate::config::MergePolicy;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::{MeshPlanError, Result};

/// Merges a [`DirectedMeshGraph`] into an undirected [`MeshGraph`]
pub struct GraphMerger {
    policy: MergePolicy,
}

impl GraphMerger {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    /// Keep every link both sides reported, combining the two readings with
    /// the merge policy; one-sided links are dropped and recorded.
    pub fn merge(&self, directed: &DirectedMeshGraph, sink: &mut DiagnosticsSink) -> Result<MeshGraph> {
        tracing::info!(
            policy = self.policy.as_str(),
            observations = directed.observation_count(),
            "Converting directed graph to undirected graph"
        );

        let mut graph = MeshGraph::new();
        for node in directed.nodes() {
            graph.add_node(node.clone());
        }

        for module in directed.nodes().filter(|n| n.is_module()) {
            if let Some(owner) = module.owner() {
                graph.add_edge(Edge::virtual_link(owner, &module.id))?;
            }
        }

        for (source, dest, forward) in directed.observations() {
            let key = EdgeKey::new(source, dest);
            if graph.contains_edge(&key) {
                continue;
            }

            let source_owner = graph.owner_of(source);
            if source_owner.is_some() && source_owner == graph.owner_of(dest) {
                // Reported once per direction; keep a single diagnostic per pair
                if source < dest || directed.observation(dest, source).is_none() {
                    sink.record(Diagnostic::SameDeviceObservation {
                        source: source.clone(),
                        dest: dest.clone(),
                        device: source_owner.cloned().unwrap_or_else(|| source.clone()),
                    });
                }
                continue;
            }

            match directed.observation(dest, source) {
                Some(reverse) => {
                    let snr = self.policy.combine(forward, reverse);
                    tracing::debug!(%key, forward, reverse, snr, "merged link");
                    let observed = directed
                        .observed_channel(source, dest)
                        .or_else(|| directed.observed_channel(dest, source));
                    graph.add_edge(Edge::real(source, dest, snr).with_observed_channel(observed))?;
                }
                None => sink.record(Diagnostic::OneSidedLink {
                    source: source.clone(),
                    dest: dest.clone(),
                }),
            }
        }

        if graph.real_edge_count() == 0 {
            tracing::error!("No usable links after merging; the access points don't see each other");
            return Err(MeshPlanError::connectivity(
                "no bidirectional links between radios of different devices",
                graph.node_ids().cloned().collect(),
            ));
        }

        tracing::info!(
            links = graph.real_edge_count(),
            dropped = sink.len(),
            "Merged connectivity graph"
        );
        Ok(graph)
    }
}

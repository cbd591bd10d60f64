//! Topology planner - greedy maximum-score spanning tree with dynamic edge scores
//!
//! Edge scores depend on the tree grown so far: a link gets cheaper to take
//! the less loaded its two radio chains are and the fewer active radios it
//! would share airtime with. Scores are therefore recomputed for every
//! frontier candidate after each addition, which rules out a static
//! Kruskal/Prim over fixed weights.

use indexmap::{IndexMap, IndexSet};

use super::bandwidth::BandwidthTable;
use super::engine::TopologyEngine;
use super::graph::{EdgeKey, MeshGraph, NodeId};
use crate::{MeshPlanError, Result};

/// Score of a device-to-module edge; above anything a real link can reach
pub const VIRTUAL_EDGE_SCORE: f64 = f64::INFINITY;

/// Scores candidate links against a partially built tree
pub struct EdgeScorer<'a> {
    connectivity: &'a MeshGraph,
    bandwidth: &'a BandwidthTable,
}

impl<'a> EdgeScorer<'a> {
    pub fn new(connectivity: &'a MeshGraph, bandwidth: &'a BandwidthTable) -> Self {
        Self {
            connectivity,
            bandwidth,
        }
    }

    /// `bandwidth(snr) / busy(a, b) / interfering(a, b)` for real links,
    /// with both divisors clamped to at least one
    pub fn score(&self, tree: &MeshGraph, key: &EdgeKey) -> f64 {
        let Some(edge) = self.connectivity.get_edge(key) else {
            return 0.0;
        };
        if !edge.is_real() {
            return VIRTUAL_EDGE_SCORE;
        }

        let (a, b) = key.endpoints();
        let busy = TopologyEngine::connected_module_edge_count(tree, a)
            + TopologyEngine::connected_module_edge_count(tree, b);
        let interfering = self.interfering_module_count(tree, a, b);

        self.bandwidth.estimate(edge.snr()) / busy.max(1) as f64 / interfering.max(1) as f64
    }

    /// Radios other than `a` and `b` that can hear either endpoint, already
    /// carry a tree link, and sit on the radio chain of `a` or `b`
    pub fn interfering_module_count(&self, tree: &MeshGraph, a: &NodeId, b: &NodeId) -> usize {
        let audible: IndexSet<&NodeId> = [a, b]
            .into_iter()
            .flat_map(|endpoint| self.connectivity.module_neighbors(endpoint))
            .filter(|m| *m != a && *m != b && tree.is_in_use(m))
            .collect();
        if audible.is_empty() {
            return 0;
        }

        let chain = TopologyEngine::module_reach(tree, [a, b]);
        audible.iter().filter(|m| chain.modules.contains(**m)).count()
    }
}

/// A frontier entry: an edge from the visited set to `target`
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub key: EdgeKey,
    pub target: NodeId,
    pub snr: f64,
    pub score: f64,
}

/// Highest score wins, then higher raw SNR, then the earliest entry
pub(crate) fn best_candidate<'c, I>(candidates: I) -> Option<&'c Candidate>
where
    I: IntoIterator<Item = &'c Candidate>,
{
    let mut best: Option<&Candidate> = None;
    for candidate in candidates {
        let better = match best {
            None => true,
            Some(current) => {
                candidate.score > current.score
                    || (candidate.score == current.score && candidate.snr > current.snr)
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

/// Grows the backhaul tree over a merged connectivity graph
pub struct TopologyPlanner<'a> {
    connectivity: &'a MeshGraph,
    scorer: EdgeScorer<'a>,
}

impl<'a> TopologyPlanner<'a> {
    pub fn new(connectivity: &'a MeshGraph, bandwidth: &'a BandwidthTable) -> Self {
        Self {
            connectivity,
            scorer: EdgeScorer::new(connectivity, bandwidth),
        }
    }

    /// Build a spanning tree containing every node and `node_count - 1` edges
    pub fn build_tree(&self) -> Result<MeshGraph> {
        tracing::info!(
            nodes = self.connectivity.node_count(),
            edges = self.connectivity.edge_count(),
            "Calculating spanning tree"
        );

        let root = self
            .connectivity
            .devices()
            .next()
            .map(|d| d.id.clone())
            .ok_or_else(|| {
                MeshPlanError::connectivity("the connectivity graph has no devices", Vec::new())
            })?;

        let mut tree = self.connectivity.nodes_only();
        let mut visited: IndexSet<NodeId> = IndexSet::new();
        let mut frontier: IndexMap<EdgeKey, Candidate> = IndexMap::new();

        visited.insert(root.clone());
        self.extend_frontier(&tree, &visited, &mut frontier, &root);

        loop {
            // Keep only productive edges
            frontier.retain(|_, c| !visited.contains(&c.target));

            if frontier.is_empty() {
                if visited.len() != self.connectivity.node_count() {
                    let unreached: Vec<NodeId> = self
                        .connectivity
                        .node_ids()
                        .filter(|id| !visited.contains(*id))
                        .cloned()
                        .collect();
                    tracing::error!(
                        unreached = unreached.len(),
                        "Could not connect all nodes; the access points are partitioned"
                    );
                    return Err(MeshPlanError::connectivity(
                        format!(
                            "{} of {} nodes cannot be reached from {}",
                            unreached.len(),
                            self.connectivity.node_count(),
                            root
                        ),
                        unreached,
                    ));
                }
                break;
            }

            let Some(best) = best_candidate(frontier.values()).cloned() else {
                break;
            };

            visited.insert(best.target.clone());
            if let Some(edge) = self.connectivity.get_edge(&best.key) {
                tree.add_edge(edge.clone())?;
            }
            tracing::debug!(edge = %best.key, score = best.score, "added tree edge");

            self.extend_frontier(&tree, &visited, &mut frontier, &best.target);
            frontier.shift_remove(&best.key);

            // Load and interference counters are tree-global, so every real
            // candidate is rescored, not only those touching the new node
            for candidate in frontier.values_mut() {
                if candidate.score != VIRTUAL_EDGE_SCORE {
                    candidate.score = self.scorer.score(&tree, &candidate.key);
                }
            }
        }

        tracing::info!(
            edges = tree.edge_count(),
            links = tree.real_edge_count(),
            "Spanning tree complete"
        );
        Ok(tree)
    }

    fn extend_frontier(
        &self,
        tree: &MeshGraph,
        visited: &IndexSet<NodeId>,
        frontier: &mut IndexMap<EdgeKey, Candidate>,
        from: &NodeId,
    ) {
        for neighbor in self.connectivity.neighbors(from) {
            if visited.contains(neighbor) {
                continue;
            }
            let key = EdgeKey::new(from, neighbor);
            let Some(edge) = self.connectivity.get_edge(&key) else {
                continue;
            };
            let candidate = Candidate {
                score: self.scorer.score(tree, &key),
                snr: edge.snr(),
                target: neighbor.clone(),
                key: key.clone(),
            };
            frontier.entry(key).or_insert(candidate);
        }
    }
}

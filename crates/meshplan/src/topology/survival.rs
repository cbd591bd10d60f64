//! Survivability planner - best-effort backup links for single link failures

use indexmap::IndexSet;

use super::bandwidth::BandwidthTable;
use super::engine::TopologyEngine;
use super::graph::{EdgeKey, MeshGraph, NodeId};
use super::spanning::{best_candidate, Candidate, EdgeScorer};
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::{MeshPlanError, Result};

/// Adds a backup link for every primary link whose failure would split the tree
pub struct SurvivabilityPlanner<'a> {
    connectivity: &'a MeshGraph,
    scorer: EdgeScorer<'a>,
}

impl<'a> SurvivabilityPlanner<'a> {
    pub fn new(connectivity: &'a MeshGraph, bandwidth: &'a BandwidthTable) -> Self {
        Self {
            connectivity,
            scorer: EdgeScorer::new(connectivity, bandwidth),
        }
    }

    /// Simulate each primary real link failing and, where the tree splits,
    /// add the best crossing link from the connectivity graph as a backup.
    ///
    /// Returns the number of backup links added. Links without any crossing
    /// candidate are recorded as [`Diagnostic::BackupNotFound`].
    pub fn add_backup_links(&self, tree: &mut MeshGraph, sink: &mut DiagnosticsSink) -> Result<usize> {
        let primaries: Vec<EdgeKey> = tree
            .real_edges()
            .filter(|e| !e.is_backup())
            .map(|e| e.key.clone())
            .collect();

        tracing::info!(links = primaries.len(), "Searching backup links");

        let mut added = 0;
        for key in primaries {
            let Some((index, removed)) = tree.take_edge(&key) else {
                continue;
            };
            let outcome = self.back_up(tree, &key, sink);
            tree.restore_edge(index, removed);
            if outcome? {
                added += 1;
            }
        }

        tracing::info!(added, "Backup search complete");
        Ok(added)
    }

    /// Runs with `key` already removed from `tree`; true if a backup was added
    fn back_up(&self, tree: &mut MeshGraph, key: &EdgeKey, sink: &mut DiagnosticsSink) -> Result<bool> {
        let (a, b) = key.endpoints();
        if TopologyEngine::path_exists(tree, a, b) {
            tracing::debug!(link = %key, "link already has an alternate path");
            return Ok(false);
        }

        let side_a = TopologyEngine::component_of(tree, a);
        let side_b = TopologyEngine::component_of(tree, b);
        if side_a.len() + side_b.len() != tree.node_count() {
            tracing::error!(
                link = %key,
                side_a = side_a.len(),
                side_b = side_b.len(),
                nodes = tree.node_count(),
                "Removing a link did not split the plan into two components"
            );
            return Err(MeshPlanError::InconsistentData(format!(
                "removing {} split the plan into more than two components; the plan is not a spanning tree",
                key
            )));
        }

        let candidates = self.crossing_candidates(tree, key, &side_a, &side_b);
        let Some(best) = best_candidate(&candidates) else {
            sink.record(Diagnostic::BackupNotFound { link: key.clone() });
            return Ok(false);
        };

        let Some(edge) = self.connectivity.get_edge(&best.key) else {
            return Ok(false);
        };
        tracing::debug!(link = %key, backup = %best.key, score = best.score, "added backup link");
        tree.add_edge(edge.clone().with_backup(true))?;
        Ok(true)
    }

    fn crossing_candidates(
        &self,
        tree: &MeshGraph,
        removed: &EdgeKey,
        side_a: &IndexSet<NodeId>,
        side_b: &IndexSet<NodeId>,
    ) -> Vec<Candidate> {
        self.connectivity
            .real_edges()
            .filter(|edge| &edge.key != removed && !tree.contains_edge(&edge.key))
            .filter_map(|edge| {
                let (x, y) = edge.key.endpoints();
                let crosses = (side_a.contains(x) && side_b.contains(y))
                    || (side_b.contains(x) && side_a.contains(y));
                crosses.then(|| Candidate {
                    key: edge.key.clone(),
                    target: y.clone(),
                    snr: edge.snr(),
                    score: self.scorer.score(tree, &edge.key),
                })
            })
            .collect()
    }
}

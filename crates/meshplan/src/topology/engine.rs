//! Topology engine - Traversal primitives shared by every planning stage

use super::graph::{ChannelGroup, EdgeKey, MeshGraph, NodeId};
use indexmap::IndexSet;
use std::collections::VecDeque;

/// Engine for graph traversals
pub struct TopologyEngine;

impl TopologyEngine {
    /// Breadth-first walk from `starts` that hops only from module to module
    /// over real edges, collecting every module and real edge it touches.
    ///
    /// This is the one walk behind channel groups, radio-chain load and
    /// interference reach.
    pub fn module_reach<'a, I>(graph: &MeshGraph, starts: I) -> ChannelGroup
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        let mut group = ChannelGroup::default();
        let mut queue = VecDeque::new();

        for start in starts {
            if graph.is_module(start) && group.modules.insert(start.clone()) {
                queue.push_back(start.clone());
            }
        }

        while let Some(module) = queue.pop_front() {
            for neighbor in graph.module_neighbors(&module) {
                group.edges.insert(EdgeKey::new(&module, neighbor));
                if group.modules.insert(neighbor.clone()) {
                    queue.push_back(neighbor.clone());
                }
            }
        }

        group
    }

    /// The channel group containing the edge `key`
    pub fn channel_group_of(graph: &MeshGraph, key: &EdgeKey) -> ChannelGroup {
        let (a, b) = key.endpoints();
        Self::module_reach(graph, [a, b])
    }

    /// Number of real edges on the radio chain `module` belongs to
    pub fn connected_module_edge_count(graph: &MeshGraph, module: &NodeId) -> usize {
        Self::module_reach(graph, [module]).edges.len()
    }

    /// Nodes reachable from `start` over any edge
    pub fn component_of(graph: &MeshGraph, start: &NodeId) -> IndexSet<NodeId> {
        let mut component = IndexSet::new();
        if !graph.contains_node(start) {
            return component;
        }

        let mut queue = VecDeque::new();
        component.insert(start.clone());
        queue.push_back(start.clone());

        while let Some(node_id) = queue.pop_front() {
            for neighbor in graph.neighbors(&node_id) {
                if component.insert(neighbor.clone()) {
                    queue.push_back(neighbor.clone());
                }
            }
        }

        component
    }

    /// Check if a path exists between two nodes
    pub fn path_exists(graph: &MeshGraph, from: &NodeId, to: &NodeId) -> bool {
        if from == to {
            return graph.contains_node(from);
        }

        let mut visited = IndexSet::new();
        let mut queue = VecDeque::new();
        visited.insert(from.clone());
        queue.push_back(from.clone());

        while let Some(node_id) = queue.pop_front() {
            for neighbor in graph.neighbors(&node_id) {
                if neighbor == to {
                    return true;
                }
                if visited.insert(neighbor.clone()) {
                    queue.push_back(neighbor.clone());
                }
            }
        }

        false
    }

    /// Find connected components in the graph
    pub fn connected_components(graph: &MeshGraph) -> Vec<IndexSet<NodeId>> {
        let mut components: Vec<IndexSet<NodeId>> = Vec::new();
        let mut seen: IndexSet<NodeId> = IndexSet::new();

        for node_id in graph.node_ids() {
            if seen.contains(node_id) {
                continue;
            }
            let component = Self::component_of(graph, node_id);
            seen.extend(component.iter().cloned());
            components.push(component);
        }

        components
    }

    pub fn is_connected(graph: &MeshGraph) -> bool {
        match graph.node_ids().next() {
            Some(first) => Self::component_of(graph, first).len() == graph.node_count(),
            None => true,
        }
    }
}

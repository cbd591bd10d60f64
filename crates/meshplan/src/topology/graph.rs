//! Graph model for the mesh connectivity snapshot

use indexmap::{IndexMap, IndexSet};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{MeshPlanError, Result};

/// Opaque, stable identifier of a device or radio module (usually a MAC)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An RF channel number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ChannelId(pub u16);

impl ChannelId {
    pub fn number(self) -> u16 {
        self.0
    }

    /// Channels up to 14 live in the 2.4 GHz band, everything above in 5 GHz
    pub fn band(self) -> RadioBand {
        if self.0 <= 14 {
            RadioBand::TwoPointFourGhz
        } else {
            RadioBand::FiveGhz
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for ChannelId {
    fn from(channel: u16) -> Self {
        Self(channel)
    }
}

/// Frequency band a radio has to be switched to for its channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadioBand {
    #[serde(rename = "2.4GHz")]
    TwoPointFourGhz,
    #[serde(rename = "5GHz")]
    FiveGhz,
}

impl RadioBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoPointFourGhz => "2.4GHz",
            Self::FiveGhz => "5GHz",
        }
    }

    /// Band selector value understood by the controller's AP configuration table
    pub fn controller_code(&self) -> u8 {
        match self {
            Self::TwoPointFourGhz => 1,
            Self::FiveGhz => 2,
        }
    }
}

/// Device or radio module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NodeKind {
    /// An access point owning `module_capacity` physical radios
    Device { module_capacity: usize },
    /// One radio interface of `owner`
    Module { owner: NodeId, interface: u8 },
}

/// A node in the connectivity graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    pub channel: Option<ChannelId>,
    /// Foreign-network sightings, one entry per sighting
    pub seen_channels: Vec<ChannelId>,
}

impl Node {
    pub fn device(id: impl Into<NodeId>, label: impl Into<String>, module_capacity: usize) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: NodeKind::Device { module_capacity },
            channel: None,
            seen_channels: Vec::new(),
        }
    }

    /// A radio module; labelled `WLAN-<n>` with `n` counted from one
    pub fn module(id: impl Into<NodeId>, owner: impl Into<NodeId>, interface: u8) -> Self {
        Self {
            id: id.into(),
            label: interface_name(interface),
            kind: NodeKind::Module {
                owner: owner.into(),
                interface,
            },
            channel: None,
            seen_channels: Vec::new(),
        }
    }

    pub fn with_seen_channels(mut self, channels: Vec<ChannelId>) -> Self {
        self.seen_channels = channels;
        self
    }

    pub fn with_channel(mut self, channel: ChannelId) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn is_module(&self) -> bool {
        matches!(self.kind, NodeKind::Module { .. })
    }

    pub fn is_device(&self) -> bool {
        matches!(self.kind, NodeKind::Device { .. })
    }

    pub fn owner(&self) -> Option<&NodeId> {
        match &self.kind {
            NodeKind::Module { owner, .. } => Some(owner),
            NodeKind::Device { .. } => None,
        }
    }

    pub fn interface(&self) -> Option<u8> {
        match self.kind {
            NodeKind::Module { interface, .. } => Some(interface),
            NodeKind::Device { .. } => None,
        }
    }

    pub fn module_capacity(&self) -> Option<usize> {
        match self.kind {
            NodeKind::Device { module_capacity } => Some(module_capacity),
            NodeKind::Module { .. } => None,
        }
    }

    /// Number of foreign sightings on `channel`
    pub fn seen_count(&self, channel: ChannelId) -> usize {
        self.seen_channels.iter().filter(|c| **c == channel).count()
    }
}

/// Controller-facing interface name for a zero-based radio index
pub fn interface_name(interface: u8) -> String {
    format!("WLAN-{}", u16::from(interface) + 1)
}

/// Undirected edge identity; endpoints are stored in sorted order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeKey {
    a: NodeId,
    b: NodeId,
}

impl EdgeKey {
    pub fn new(x: &NodeId, y: &NodeId) -> Self {
        if x <= y {
            Self { a: x.clone(), b: y.clone() }
        } else {
            Self { a: y.clone(), b: x.clone() }
        }
    }

    pub fn endpoints(&self) -> (&NodeId, &NodeId) {
        (&self.a, &self.b)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        &self.a == id || &self.b == id
    }

    /// The endpoint opposite to `id`
    pub fn other(&self, id: &NodeId) -> Option<&NodeId> {
        if &self.a == id {
            Some(&self.b)
        } else if &self.b == id {
            Some(&self.a)
        } else {
            None
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.a, self.b)
    }
}

/// Attributes of a wireless module-to-module link
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealLink {
    pub snr: f64,
    pub channel: Option<ChannelId>,
    pub is_backup: bool,
    /// Channel the link was heard on when telemetry was collected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_channel: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EdgeKind {
    /// Fixed device-to-own-module connection; never removed, never colored
    Virtual,
    /// Wireless link between modules of two different devices
    Real(RealLink),
}

/// An undirected edge in the connectivity graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub key: EdgeKey,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn virtual_link(device: &NodeId, module: &NodeId) -> Self {
        Self {
            key: EdgeKey::new(device, module),
            kind: EdgeKind::Virtual,
        }
    }

    pub fn real(a: &NodeId, b: &NodeId, snr: f64) -> Self {
        Self {
            key: EdgeKey::new(a, b),
            kind: EdgeKind::Real(RealLink {
                snr,
                channel: None,
                is_backup: false,
                observed_channel: None,
            }),
        }
    }

    pub fn with_observed_channel(mut self, channel: Option<ChannelId>) -> Self {
        if let EdgeKind::Real(link) = &mut self.kind {
            link.observed_channel = channel;
        }
        self
    }

    pub fn with_backup(mut self, is_backup: bool) -> Self {
        if let EdgeKind::Real(link) = &mut self.kind {
            link.is_backup = is_backup;
        }
        self
    }

    pub fn with_channel(mut self, channel: ChannelId) -> Self {
        if let EdgeKind::Real(link) = &mut self.kind {
            link.channel = Some(channel);
        }
        self
    }

    pub fn is_real(&self) -> bool {
        matches!(self.kind, EdgeKind::Real(_))
    }

    pub fn real_link(&self) -> Option<&RealLink> {
        match &self.kind {
            EdgeKind::Real(link) => Some(link),
            EdgeKind::Virtual => None,
        }
    }

    pub fn real_link_mut(&mut self) -> Option<&mut RealLink> {
        match &mut self.kind {
            EdgeKind::Real(link) => Some(link),
            EdgeKind::Virtual => None,
        }
    }

    /// Raw link quality; virtual edges carry none and report zero
    pub fn snr(&self) -> f64 {
        self.real_link().map_or(0.0, |l| l.snr)
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.real_link().and_then(|l| l.channel)
    }

    pub fn is_backup(&self) -> bool {
        self.real_link().is_some_and(|l| l.is_backup)
    }

    pub fn observed_channel(&self) -> Option<ChannelId> {
        self.real_link().and_then(|l| l.observed_channel)
    }
}

/// Real edges and modules that must share one channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelGroup {
    pub modules: IndexSet<NodeId>,
    pub edges: IndexSet<EdgeKey>,
}

impl ChannelGroup {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }
}

/// Undirected connectivity graph of devices and modules
#[derive(Debug, Clone, Default)]
pub struct MeshGraph {
    nodes: IndexMap<NodeId, Node>,
    edges: IndexMap<EdgeKey, Edge>,
    adjacency: IndexMap<NodeId, IndexSet<NodeId>>,
}

impl MeshGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, replacing any node with the same id
    pub fn add_node(&mut self, node: Node) {
        self.adjacency.entry(node.id.clone()).or_default();
        self.nodes.insert(node.id.clone(), node);
    }

    /// Add an edge between two existing nodes
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        let (a, b) = edge.key.endpoints();
        if a == b {
            return Err(MeshPlanError::InconsistentData(format!(
                "edge {} is a self-loop",
                edge.key
            )));
        }
        for endpoint in [a, b] {
            if !self.nodes.contains_key(endpoint) {
                return Err(MeshPlanError::InconsistentData(format!(
                    "edge {} references unknown node {}",
                    edge.key, endpoint
                )));
            }
        }
        self.link(a.clone(), b.clone());
        self.edges.insert(edge.key.clone(), edge);
        Ok(())
    }

    fn link(&mut self, a: NodeId, b: NodeId) {
        self.adjacency.entry(a.clone()).or_default().insert(b.clone());
        self.adjacency.entry(b).or_default().insert(a);
    }

    fn unlink(&mut self, a: &NodeId, b: &NodeId) {
        if let Some(set) = self.adjacency.get_mut(a) {
            set.shift_remove(b);
        }
        if let Some(set) = self.adjacency.get_mut(b) {
            set.shift_remove(a);
        }
    }

    /// Remove an edge, returning it together with its position in edge order
    pub fn take_edge(&mut self, key: &EdgeKey) -> Option<(usize, Edge)> {
        let (index, _, edge) = self.edges.shift_remove_full(key)?;
        let (a, b) = key.endpoints();
        self.unlink(a, b);
        Some((index, edge))
    }

    /// Put an edge taken with [`MeshGraph::take_edge`] back at its old position
    pub fn restore_edge(&mut self, index: usize, edge: Edge) {
        let (a, b) = edge.key.endpoints();
        self.link(a.clone(), b.clone());
        let index = index.min(self.edges.len());
        self.edges.shift_insert(index, edge.key.clone(), edge);
    }

    pub fn remove_edge(&mut self, key: &EdgeKey) -> Option<Edge> {
        self.take_edge(key).map(|(_, edge)| edge)
    }

    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get_edge(&self, key: &EdgeKey) -> Option<&Edge> {
        self.edges.get(key)
    }

    pub fn get_edge_mut(&mut self, key: &EdgeKey) -> Option<&mut Edge> {
        self.edges.get_mut(key)
    }

    pub fn find_edge(&self, a: &NodeId, b: &NodeId) -> Option<&Edge> {
        self.edges.get(&EdgeKey::new(a, b))
    }

    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    pub fn has_edge(&self, a: &NodeId, b: &NodeId) -> bool {
        self.find_edge(a, b).is_some()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn real_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values().filter(|e| e.is_real())
    }

    pub fn devices(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.is_device())
    }

    pub fn modules(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.is_module())
    }

    /// Modules owned by `device`, in insertion order
    pub fn modules_of<'a>(&'a self, device: &'a NodeId) -> impl Iterator<Item = &'a Node> + 'a {
        self.modules().filter(move |m| m.owner() == Some(device))
    }

    pub fn neighbors<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.adjacency.get(id).into_iter().flatten()
    }

    /// Neighbors reached over real edges; only module-to-module edges are real
    pub fn module_neighbors<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = &'a NodeId> + 'a {
        let from_module = self.is_module(id);
        self.neighbors(id)
            .filter(move |n| from_module && self.is_module(n))
    }

    pub fn is_module(&self, id: &NodeId) -> bool {
        self.nodes.get(id).is_some_and(Node::is_module)
    }

    pub fn owner_of(&self, id: &NodeId) -> Option<&NodeId> {
        self.nodes.get(id).and_then(Node::owner)
    }

    /// A module is in use once it terminates at least one real edge
    pub fn is_in_use(&self, module: &NodeId) -> bool {
        self.module_neighbors(module).next().is_some()
    }

    /// Position of `id` in node insertion order
    pub fn node_index(&self, id: &NodeId) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn real_edge_count(&self) -> usize {
        self.real_edges().count()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Copy of this graph with every node but no edges
    pub fn nodes_only(&self) -> Self {
        let mut graph = Self::new();
        for node in self.nodes.values() {
            graph.add_node(node.clone());
        }
        graph
    }
}

/// Pre-merge graph holding one-directional link observations
///
/// Structural device-to-module links are implied by each module's owner.
#[derive(Debug, Clone, Default)]
pub struct DirectedMeshGraph {
    nodes: IndexMap<NodeId, Node>,
    observations: IndexMap<(NodeId, NodeId), f64>,
    observed_channels: IndexMap<(NodeId, NodeId), ChannelId>,
}

impl DirectedMeshGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&mut self, node: Node) -> Result<()> {
        if !node.is_device() {
            return Err(MeshPlanError::InvalidSnapshot(format!(
                "{} is not a device",
                node.id
            )));
        }
        self.insert_unique(node)
    }

    /// Add a module; its owning device must already be present
    pub fn add_module(&mut self, node: Node) -> Result<()> {
        let owner = node.owner().ok_or_else(|| {
            MeshPlanError::InvalidSnapshot(format!("{} is not a module", node.id))
        })?;
        if !self.nodes.get(owner).is_some_and(Node::is_device) {
            return Err(MeshPlanError::InvalidSnapshot(format!(
                "module {} references unknown device {}",
                node.id, owner
            )));
        }
        self.insert_unique(node)
    }

    fn insert_unique(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(MeshPlanError::InvalidSnapshot(format!(
                "duplicate node id {}",
                node.id
            )));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Record `source` seeing `dest` with quality `snr`; a repeated
    /// observation in the same direction replaces the earlier one
    pub fn observe(&mut self, source: &NodeId, dest: &NodeId, snr: f64) -> Result<()> {
        if source == dest {
            return Err(MeshPlanError::InvalidSnapshot(format!(
                "module {} observes itself",
                source
            )));
        }
        for endpoint in [source, dest] {
            if !self.nodes.get(endpoint).is_some_and(Node::is_module) {
                return Err(MeshPlanError::InvalidSnapshot(format!(
                    "observation {} -> {} references unknown module {}",
                    source, dest, endpoint
                )));
            }
        }
        let key = (source.clone(), dest.clone());
        self.observed_channels.shift_remove(&key);
        self.observations.insert(key, snr);
        Ok(())
    }

    /// Note the channel an existing observation was made on
    pub fn observed_on(&mut self, source: &NodeId, dest: &NodeId, channel: ChannelId) {
        let key = (source.clone(), dest.clone());
        if self.observations.contains_key(&key) {
            self.observed_channels.insert(key, channel);
        }
    }

    pub fn observed_channel(&self, source: &NodeId, dest: &NodeId) -> Option<ChannelId> {
        self.observed_channels
            .get(&(source.clone(), dest.clone()))
            .copied()
    }

    pub fn observation(&self, source: &NodeId, dest: &NodeId) -> Option<f64> {
        self.observations
            .get(&(source.clone(), dest.clone()))
            .copied()
    }

    pub fn observations(&self) -> impl Iterator<Item = (&NodeId, &NodeId, f64)> {
        self.observations
            .iter()
            .map(|((source, dest), snr)| (source, dest, *snr))
    }

    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_device_graph() -> MeshGraph {
        let mut graph = MeshGraph::new();
        graph.add_node(Node::device("d1", "AP-1", 1));
        graph.add_node(Node::device("d2", "AP-2", 1));
        graph.add_node(Node::module("m1", "d1", 0));
        graph.add_node(Node::module("m2", "d2", 0));
        graph
            .add_edge(Edge::virtual_link(&"d1".into(), &"m1".into()))
            .unwrap();
        graph
            .add_edge(Edge::virtual_link(&"d2".into(), &"m2".into()))
            .unwrap();
        graph
            .add_edge(Edge::real(&"m1".into(), &"m2".into(), 50.0))
            .unwrap();
        graph
    }

    #[test]
    fn test_edge_key_is_order_independent() {
        let a = NodeId::from("aa");
        let b = NodeId::from("bb");
        assert_eq!(EdgeKey::new(&a, &b), EdgeKey::new(&b, &a));
        assert_eq!(EdgeKey::new(&b, &a).other(&a), Some(&b));
    }

    #[test]
    fn test_neighbors_and_module_neighbors() {
        let graph = two_device_graph();
        let m1 = NodeId::from("m1");

        let neighbors: Vec<_> = graph.neighbors(&m1).cloned().collect();
        assert_eq!(neighbors.len(), 2);

        let modules: Vec<_> = graph.module_neighbors(&m1).cloned().collect();
        assert_eq!(modules, vec![NodeId::from("m2")]);
        assert!(graph.module_neighbors(&"d1".into()).next().is_none());
        assert!(graph.is_in_use(&m1));
    }

    #[test]
    fn test_take_and_restore_keeps_edge_order() {
        let mut graph = two_device_graph();
        let key = EdgeKey::new(&"d2".into(), &"m2".into());
        let before: Vec<_> = graph.edges().map(|e| e.key.clone()).collect();

        let (index, edge) = graph.take_edge(&key).unwrap();
        assert!(!graph.has_edge(&"d2".into(), &"m2".into()));
        assert_eq!(graph.neighbors(&"d2".into()).count(), 0);

        graph.restore_edge(index, edge);
        let after: Vec<_> = graph.edges().map(|e| e.key.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(graph.neighbors(&"d2".into()).count(), 1);
    }

    #[test]
    fn test_add_edge_rejects_unknown_endpoint() {
        let mut graph = two_device_graph();
        let result = graph.add_edge(Edge::real(&"m1".into(), &"ghost".into(), 10.0));
        assert!(matches!(result, Err(MeshPlanError::InconsistentData(_))));
    }

    #[test]
    fn test_channel_band() {
        assert_eq!(ChannelId(11).band(), RadioBand::TwoPointFourGhz);
        assert_eq!(ChannelId(36).band(), RadioBand::FiveGhz);
        assert_eq!(ChannelId(36).band().controller_code(), 2);
    }

    #[test]
    fn test_directed_graph_rejects_orphan_module() {
        let mut directed = DirectedMeshGraph::new();
        let result = directed.add_module(Node::module("m1", "nowhere", 0));
        assert!(matches!(result, Err(MeshPlanError::InvalidSnapshot(_))));
    }
}

//! Plan - the finished topology and channel assignment of one cycle
//!
//! A [`Plan`] is handed to the controller push collaborator through
//! [`Plan::push_plan`] and to the visualization collaborator through
//! [`Plan::visualization`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_rs::TS;

use crate::topology::channels::{DeviceChannelUsage, GlobalChannelUsage};
use crate::topology::graph::{interface_name, ChannelId, Edge, MeshGraph, NodeId, RadioBand};
use crate::{MeshPlanError, Result};

/// Priority of the first link written to the controller
const FIRST_LINK_PRIORITY: u32 = 1000;

/// Drawing strength of structural device-to-radio links
const VIRTUAL_LINK_STRENGTH: f64 = 200.0;

/// The spanning tree plus backup links, every real link colored
#[derive(Debug, Clone)]
pub struct Plan {
    pub graph: MeshGraph,
    pub palette: Vec<ChannelId>,
    pub channel_usage: GlobalChannelUsage,
    pub device_usage: DeviceChannelUsage,
    pub seed: u64,
    pub generated_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(
        graph: MeshGraph,
        palette: Vec<ChannelId>,
        channel_usage: GlobalChannelUsage,
        device_usage: DeviceChannelUsage,
        seed: u64,
    ) -> Self {
        Self {
            graph,
            palette,
            channel_usage,
            device_usage,
            seed,
            generated_at: Utc::now(),
        }
    }

    pub fn primary_links(&self) -> impl Iterator<Item = &Edge> {
        self.graph.real_edges().filter(|e| !e.is_backup())
    }

    pub fn backup_links(&self) -> impl Iterator<Item = &Edge> {
        self.graph.real_edges().filter(|e| e.is_backup())
    }

    pub fn channel_of(&self, module: &NodeId) -> Option<ChannelId> {
        self.graph.get_node(module).and_then(|n| n.channel)
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            generated_at: self.generated_at,
            seed: self.seed,
            devices: self.graph.devices().count(),
            modules: self.graph.modules().count(),
            primary_links: self.primary_links().count(),
            backup_links: self.backup_links().count(),
            channel_usage: self
                .channel_usage
                .iter()
                .map(|(channel, groups)| ChannelCount { channel, groups })
                .collect(),
            diagnostics: 0,
        }
    }

    /// Controller-facing write list: primary links in tree order, then
    /// backups, followed by the per-radio channel settings
    pub fn push_plan(&self) -> Result<PushPlan> {
        let radios = self.radio_assignments()?;

        let mut links = Vec::new();
        let ordered = self
            .primary_links()
            .map(|e| (e, LinkRole::Primary))
            .chain(self.backup_links().map(|e| (e, LinkRole::Backup)));
        for (priority, (edge, role)) in (FIRST_LINK_PRIORITY..).zip(ordered) {
            links.push(self.push_link(edge, role, priority)?);
        }

        tracing::debug!(links = links.len(), radios = radios.len(), "built push plan");
        Ok(PushPlan { links, radios })
    }

    fn push_link(&self, edge: &Edge, role: LinkRole, priority: u32) -> Result<PushLink> {
        let channel = edge.channel().ok_or_else(|| {
            MeshPlanError::InconsistentData(format!("link {} has no channel", edge.key))
        })?;
        let (a, b) = edge.key.endpoints();
        let (source, dest) = (self.endpoint(a)?, self.endpoint(b)?);

        Ok(PushLink {
            priority,
            role,
            channel,
            snr: edge.snr(),
            source,
            dest,
        })
    }

    fn endpoint(&self, module: &NodeId) -> Result<LinkEndpoint> {
        let node = self.graph.get_node(module).ok_or_else(|| {
            MeshPlanError::InconsistentData(format!("link references unknown radio {}", module))
        })?;
        let (owner, interface) = match (node.owner(), node.interface()) {
            (Some(owner), Some(interface)) => (owner, interface),
            _ => {
                return Err(MeshPlanError::InconsistentData(format!(
                    "link endpoint {} is not a radio",
                    module
                )))
            }
        };
        let device_name = self
            .graph
            .get_node(owner)
            .map(|d| d.label.clone())
            .unwrap_or_else(|| owner.to_string());

        Ok(LinkEndpoint {
            device: owner.clone(),
            device_name,
            module: module.clone(),
            interface_name: interface_name(interface),
        })
    }

    /// One entry per radio carrying a link; every radio must map to exactly
    /// one channel across all its links
    fn radio_assignments(&self) -> Result<Vec<RadioAssignment>> {
        let mut radios = Vec::new();

        for module in self.graph.modules() {
            let link_channels: Vec<ChannelId> = self
                .graph
                .real_edges()
                .filter(|e| e.key.contains(&module.id))
                .filter_map(Edge::channel)
                .collect();

            let channel = match module.channel {
                Some(channel) => channel,
                None if link_channels.is_empty() => continue,
                None => {
                    return Err(MeshPlanError::InconsistentData(format!(
                        "radio {} carries links but has no channel",
                        module.id
                    )))
                }
            };
            if let Some(other) = link_channels.iter().find(|c| **c != channel) {
                return Err(MeshPlanError::InconsistentData(format!(
                    "radio {} is set to channel {} but one of its links uses {}",
                    module.id, channel, other
                )));
            }

            let endpoint = self.endpoint(&module.id)?;
            radios.push(RadioAssignment {
                device: endpoint.device,
                device_name: endpoint.device_name,
                module: endpoint.module,
                interface_name: endpoint.interface_name,
                channel,
                band: channel.band(),
                band_code: channel.band().controller_code(),
            });
        }

        Ok(radios)
    }

    pub fn visualization(&self) -> VisualGraph {
        VisualGraph::from_graph(&self.graph, |edge| {
            if edge.is_backup() {
                LinkState::Backup
            } else {
                LinkState::Primary
            }
        })
    }
}

/// Headline numbers of a plan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    pub devices: usize,
    pub modules: usize,
    pub primary_links: usize,
    pub backup_links: usize,
    pub channel_usage: Vec<ChannelCount>,
    pub diagnostics: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCount {
    pub channel: ChannelId,
    pub groups: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRole {
    Primary,
    Backup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkEndpoint {
    pub device: NodeId,
    pub device_name: String,
    pub module: NodeId,
    pub interface_name: String,
}

/// One topology entry to write to the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushLink {
    pub priority: u32,
    pub role: LinkRole,
    pub channel: ChannelId,
    pub snr: f64,
    pub source: LinkEndpoint,
    pub dest: LinkEndpoint,
}

/// Channel setting of one radio
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioAssignment {
    pub device: NodeId,
    pub device_name: String,
    pub module: NodeId,
    pub interface_name: String,
    pub channel: ChannelId,
    pub band: RadioBand,
    /// Band selector as the controller's AP table expects it
    pub band_code: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPlan {
    pub links: Vec<PushLink>,
    pub radios: Vec<RadioAssignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum VisualNodeKind {
    Device,
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum LinkState {
    Primary,
    Backup,
    Unassigned,
    Structural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ConnectionKind {
    Real,
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct VisualNode {
    pub index: usize,
    pub id: String,
    pub label: String,
    pub kind: VisualNodeKind,
    pub channel: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VisualLink {
    pub source: usize,
    pub target: usize,
    pub strength: f64,
    pub state: LinkState,
    pub connection: ConnectionKind,
    pub channel: Option<u16>,
    /// Channel the link was heard on
    pub observed_channel: Option<u16>,
}

/// Node-link graph for the topology viewer
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct VisualGraph {
    pub nodes: Vec<VisualNode>,
    pub links: Vec<VisualLink>,
}

impl VisualGraph {
    /// Every possible link of a merged connectivity graph, drawn unassigned
    pub fn connectivity(graph: &MeshGraph) -> Self {
        Self::from_graph(graph, |_| LinkState::Unassigned)
    }

    fn from_graph(graph: &MeshGraph, real_state: impl Fn(&Edge) -> LinkState) -> Self {
        let nodes: Vec<VisualNode> = graph
            .nodes()
            .enumerate()
            .map(|(index, node)| VisualNode {
                index,
                id: node.id.to_string(),
                label: node.label.clone(),
                kind: if node.is_module() {
                    VisualNodeKind::Module
                } else {
                    VisualNodeKind::Device
                },
                channel: node.channel.map(ChannelId::number),
            })
            .collect();

        let links = graph
            .edges()
            .filter_map(|edge| {
                let (a, b) = edge.key.endpoints();
                let (source, target) = (graph.node_index(a)?, graph.node_index(b)?);
                let link = if edge.is_real() {
                    VisualLink {
                        source,
                        target,
                        strength: edge.snr(),
                        state: real_state(edge),
                        connection: ConnectionKind::Real,
                        channel: edge.channel().map(ChannelId::number),
                        observed_channel: edge.observed_channel().map(ChannelId::number),
                    }
                } else {
                    VisualLink {
                        source,
                        target,
                        strength: VIRTUAL_LINK_STRENGTH,
                        state: LinkState::Structural,
                        connection: ConnectionKind::Virtual,
                        channel: None,
                        observed_channel: None,
                    }
                };
                Some(link)
            })
            .collect();

        Self { nodes, links }
    }
}

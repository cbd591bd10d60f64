//! Plan invariants - Rules a plan must satisfy before it leaves the engine
//!
//! Checks run in a fixed order; the first error-level violation aborts the
//! planning cycle.

use serde::Serialize;

use super::graph::{EdgeKey, NodeId};
use crate::plan::Plan;
use crate::{MeshPlanError, Result};

/// A violation of a plan invariant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvariantViolation {
    pub invariant_name: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub affected_nodes: Vec<NodeId>,
    pub affected_edges: Vec<EdgeKey>,
    pub suggested_fix: Option<String>,
}

/// Severity levels for invariant violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    /// Informational - the plan is usable as is
    Info,
    /// Error - the plan must not be pushed to the controller
    Error,
}

/// Read-only checker for finished plans
#[derive(Debug, Default)]
pub struct PlanValidator;

impl PlanValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run every check, in order, and return all violations found
    pub fn check_all(&self, plan: &Plan) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        violations.extend(self.check_link_channels(plan));
        violations.extend(self.check_no_same_device_links(plan));
        violations.extend(self.check_virtual_links(plan));
        violations.extend(self.check_module_capacity(plan));
        violations.extend(self.check_idle_modules(plan));

        violations
    }

    /// Fail on the first error-level violation; informational ones are returned
    pub fn validate(&self, plan: &Plan) -> Result<Vec<InvariantViolation>> {
        let violations = self.check_all(plan);
        if let Some(error) = violations
            .iter()
            .find(|v| v.severity == ViolationSeverity::Error)
        {
            tracing::error!(
                invariant = %error.invariant_name,
                "Plan validation failed: {}",
                error.message
            );
            return Err(MeshPlanError::Validation(Box::new(error.clone())));
        }

        Ok(violations)
    }

    /// Every real link carries a channel from the palette
    fn check_link_channels(&self, plan: &Plan) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        for edge in plan.graph.real_edges() {
            let (a, b) = edge.key.endpoints();
            let problem = match edge.channel() {
                None => format!("Link {} has no channel", edge.key),
                Some(channel) if !plan.palette.contains(&channel) => format!(
                    "Link {} uses channel {} outside the assignable palette",
                    edge.key, channel
                ),
                Some(_) => continue,
            };

            violations.push(InvariantViolation {
                invariant_name: "assigned_palette_channel".to_string(),
                severity: ViolationSeverity::Error,
                message: problem,
                affected_nodes: vec![a.clone(), b.clone()],
                affected_edges: vec![edge.key.clone()],
                suggested_fix: Some("Re-run channel assignment with the current palette".to_string()),
            });
        }

        violations
    }

    fn check_no_same_device_links(&self, plan: &Plan) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        for edge in plan.graph.real_edges() {
            let (a, b) = edge.key.endpoints();
            let owner = plan.graph.owner_of(a);
            if owner.is_some() && owner == plan.graph.owner_of(b) {
                violations.push(InvariantViolation {
                    invariant_name: "no_same_device_links".to_string(),
                    severity: ViolationSeverity::Error,
                    message: format!(
                        "Link {} connects two radios of device {}",
                        edge.key,
                        owner.map(NodeId::as_str).unwrap_or_default()
                    ),
                    affected_nodes: vec![a.clone(), b.clone()],
                    affected_edges: vec![edge.key.clone()],
                    suggested_fix: Some("Drop observations between radios of one device".to_string()),
                });
            }
        }

        violations
    }

    /// Every module keeps the structural link to its owner
    fn check_virtual_links(&self, plan: &Plan) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        for module in plan.graph.modules() {
            let Some(owner) = module.owner() else {
                continue;
            };
            let present = plan
                .graph
                .find_edge(owner, &module.id)
                .is_some_and(|e| !e.is_real());
            if !present {
                violations.push(InvariantViolation {
                    invariant_name: "module_attached_to_owner".to_string(),
                    severity: ViolationSeverity::Error,
                    message: format!("Radio {} is detached from its device {}", module.id, owner),
                    affected_nodes: vec![module.id.clone(), owner.clone()],
                    affected_edges: vec![EdgeKey::new(owner, &module.id)],
                    suggested_fix: None,
                });
            }
        }

        violations
    }

    /// A device cannot run more distinct channels than it has radios
    fn check_module_capacity(&self, plan: &Plan) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        for device in plan.graph.devices() {
            let capacity = device.module_capacity().unwrap_or(0);
            let channels = plan.device_usage.channels_of(&device.id);
            if channels.len() > capacity {
                violations.push(InvariantViolation {
                    invariant_name: "module_capacity".to_string(),
                    severity: ViolationSeverity::Error,
                    message: format!(
                        "Device {} needs {} channels ({}) but has {} radios",
                        device.id,
                        channels.len(),
                        channels
                            .iter()
                            .map(|c| c.to_string())
                            .collect::<Vec<_>>()
                            .join(", "),
                        capacity
                    ),
                    affected_nodes: vec![device.id.clone()],
                    affected_edges: plan
                        .graph
                        .real_edges()
                        .filter(|e| {
                            let (a, b) = e.key.endpoints();
                            plan.graph.owner_of(a) == Some(&device.id)
                                || plan.graph.owner_of(b) == Some(&device.id)
                        })
                        .map(|e| e.key.clone())
                        .collect(),
                    suggested_fix: Some(
                        "Merge the device's channel groups or widen its radio inventory".to_string(),
                    ),
                });
            }
        }

        violations
    }

    fn check_idle_modules(&self, plan: &Plan) -> Vec<InvariantViolation> {
        plan.graph
            .modules()
            .filter(|m| !plan.graph.is_in_use(&m.id))
            .map(|m| InvariantViolation {
                invariant_name: "idle_module".to_string(),
                severity: ViolationSeverity::Info,
                message: format!("Radio {} carries no backhaul link", m.id),
                affected_nodes: vec![m.id.clone()],
                affected_edges: vec![],
                suggested_fix: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::channels::{DeviceChannelUsage, GlobalChannelUsage};
    use crate::topology::graph::{ChannelId, Edge, MeshGraph, Node};

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn palette() -> Vec<ChannelId> {
        vec![ChannelId(1), ChannelId(6), ChannelId(11)]
    }

    /// Hub device d1 with `hub_radios` radios, linked to one single-radio
    /// device per entry of `links` on the given channel
    fn create_plan(hub_capacity: usize, links: &[u16]) -> Plan {
        let mut graph = MeshGraph::new();
        graph.add_node(Node::device("d1", "hub", hub_capacity));
        for (i, channel) in links.iter().enumerate() {
            let hub_radio = format!("h{}", i);
            let peer = format!("p{}", i);
            let peer_radio = format!("r{}", i);
            graph.add_node(Node::module(hub_radio.as_str(), "d1", i as u8));
            graph.add_node(Node::device(peer.as_str(), peer.as_str(), 1));
            graph.add_node(Node::module(peer_radio.as_str(), peer.as_str(), 0));
            graph
                .add_edge(Edge::virtual_link(&id("d1"), &id(&hub_radio)))
                .unwrap();
            graph
                .add_edge(Edge::virtual_link(&id(&peer), &id(&peer_radio)))
                .unwrap();
            graph
                .add_edge(
                    Edge::real(&id(&hub_radio), &id(&peer_radio), 60.0)
                        .with_channel(ChannelId(*channel)),
                )
                .unwrap();
        }
        let device_usage = DeviceChannelUsage::tally(&graph);
        Plan::new(graph, palette(), GlobalChannelUsage::new(&palette()), device_usage, 0)
    }

    #[test]
    fn test_valid_plan_passes() {
        let plan = create_plan(2, &[1, 6]);
        let violations = PlanValidator::new().validate(&plan).unwrap();
        assert!(violations.is_empty());
    }

    #[test]
    fn test_capacity_exceeded_fails() {
        let plan = create_plan(2, &[1, 6, 11]);
        let result = PlanValidator::new().validate(&plan);

        match result {
            Err(MeshPlanError::Validation(violation)) => {
                assert_eq!(violation.invariant_name, "module_capacity");
                assert_eq!(violation.affected_nodes, vec![id("d1")]);
                assert_eq!(violation.affected_edges.len(), 3);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_channel_outside_palette_fails_first() {
        let plan = create_plan(1, &[36, 6]);
        let violations = PlanValidator::new().check_all(&plan);

        assert_eq!(violations[0].invariant_name, "assigned_palette_channel");
        assert!(violations
            .iter()
            .any(|v| v.invariant_name == "module_capacity"));

        let error = PlanValidator::new().validate(&plan).unwrap_err();
        assert!(error.to_string().contains("outside the assignable palette"));
    }

    #[test]
    fn test_missing_virtual_link_fails() {
        let mut plan = create_plan(1, &[1]);
        plan.graph.remove_edge(&EdgeKey::new(&id("p0"), &id("r0")));

        let violations = PlanValidator::new().check_all(&plan);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant_name, "module_attached_to_owner");
    }

    #[test]
    fn test_same_device_link_fails() {
        let mut plan = create_plan(2, &[1]);
        plan.graph.add_node(Node::module("h9", "d1", 1));
        plan.graph
            .add_edge(Edge::virtual_link(&id("d1"), &id("h9")))
            .unwrap();
        plan.graph
            .add_edge(Edge::real(&id("h0"), &id("h9"), 90.0).with_channel(ChannelId(1)))
            .unwrap();

        let violations = PlanValidator::new().check_all(&plan);
        assert!(violations
            .iter()
            .any(|v| v.invariant_name == "no_same_device_links"));
    }

    #[test]
    fn test_idle_module_is_informational() {
        let mut plan = create_plan(2, &[1]);
        plan.graph.add_node(Node::module("h1", "d1", 1));
        plan.graph
            .add_edge(Edge::virtual_link(&id("d1"), &id("h1")))
            .unwrap();

        let violations = PlanValidator::new().validate(&plan).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, ViolationSeverity::Info);
    }
}

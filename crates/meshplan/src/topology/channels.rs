//! Channel planner - colors channel groups from a fixed palette
//!
//! Every real link of a channel group transits a shared radio chain, so the
//! whole group gets one channel. The election minimizes interference seen from
//! our own radios plus foreign-network sightings, then prefers the channel used
//! least across the fleet, then draws from an injected seeded source.

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use super::engine::TopologyEngine;
use super::graph::{ChannelGroup, ChannelId, EdgeKey, MeshGraph, NodeId};
use crate::{MeshPlanError, Result};

/// Fleet-wide count of channel groups assigned per channel in one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalChannelUsage {
    counts: IndexMap<ChannelId, usize>,
}

impl GlobalChannelUsage {
    /// Zeroed counters for every channel of `palette`
    pub fn new(palette: &[ChannelId]) -> Self {
        Self {
            counts: palette.iter().map(|c| (*c, 0)).collect(),
        }
    }

    pub fn get(&self, channel: ChannelId) -> usize {
        self.counts.get(&channel).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, channel: ChannelId) {
        *self.counts.entry(channel).or_insert(0) += 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, usize)> + '_ {
        self.counts.iter().map(|(c, n)| (*c, *n))
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Per-device tally of channels carried by its colored real links
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceChannelUsage {
    tallies: IndexMap<NodeId, IndexMap<ChannelId, usize>>,
}

impl DeviceChannelUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recount from the colored real edges of `graph`
    pub fn tally(graph: &MeshGraph) -> Self {
        let mut usage = Self::new();
        for edge in graph.real_edges() {
            let Some(channel) = edge.channel() else {
                continue;
            };
            let (a, b) = edge.key.endpoints();
            for module in [a, b] {
                if let Some(device) = graph.owner_of(module) {
                    usage.record(device, channel);
                }
            }
        }
        usage
    }

    pub fn record(&mut self, device: &NodeId, channel: ChannelId) {
        *self
            .tallies
            .entry(device.clone())
            .or_default()
            .entry(channel)
            .or_insert(0) += 1;
    }

    /// Channels with a non-zero tally on `device`, in first-use order
    pub fn channels_of(&self, device: &NodeId) -> Vec<ChannelId> {
        self.tallies
            .get(device)
            .map(|t| t.iter().filter(|(_, n)| **n > 0).map(|(c, _)| *c).collect())
            .unwrap_or_default()
    }

    pub fn distinct_channels(&self, device: &NodeId) -> usize {
        self.channels_of(device).len()
    }

    pub fn count(&self, device: &NodeId, channel: ChannelId) -> usize {
        self.tallies
            .get(device)
            .and_then(|t| t.get(&channel))
            .copied()
            .unwrap_or(0)
    }

    pub fn devices(&self) -> impl Iterator<Item = &NodeId> {
        self.tallies.keys()
    }
}

/// Interference counters of one channel group against the palette
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InterferenceCounters {
    pub internal: IndexMap<ChannelId, usize>,
    pub external: IndexMap<ChannelId, usize>,
}

impl InterferenceCounters {
    fn score(&self, channel: ChannelId) -> usize {
        self.internal.get(&channel).copied().unwrap_or(0)
            + self.external.get(&channel).copied().unwrap_or(0)
    }
}

/// Assigns one channel per channel group of a plan graph
pub struct ChannelPlanner<'a> {
    connectivity: &'a MeshGraph,
    palette: &'a [ChannelId],
}

impl<'a> ChannelPlanner<'a> {
    pub fn new(connectivity: &'a MeshGraph, palette: &'a [ChannelId]) -> Self {
        Self {
            connectivity,
            palette,
        }
    }

    /// Color every uncolored real edge of `plan`, one channel group at a time.
    ///
    /// Returns the number of channel groups colored.
    pub fn assign<R>(
        &self,
        plan: &mut MeshGraph,
        usage: &mut GlobalChannelUsage,
        devices: &mut DeviceChannelUsage,
        rng: &mut R,
    ) -> Result<usize>
    where
        R: Rng + ?Sized,
    {
        tracing::info!(palette = ?self.palette, "Assigning channels");

        let keys: Vec<EdgeKey> = plan.real_edges().map(|e| e.key.clone()).collect();
        let mut groups = 0;

        for key in keys {
            if plan.get_edge(&key).and_then(|e| e.channel()).is_some() {
                continue;
            }

            let group = TopologyEngine::channel_group_of(plan, &key);
            let channel = self.elect(plan, &group, usage, rng)?;
            self.apply(plan, &group, channel, devices)?;
            usage.increment(channel);
            groups += 1;

            tracing::debug!(
                %channel,
                modules = group.modules.len(),
                links = group.edges.len(),
                "colored channel group"
            );
        }

        tracing::info!(groups, "Channel assignment complete");
        Ok(groups)
    }

    /// Count interference for each palette channel over the modules of `group`
    pub(crate) fn interference(&self, plan: &MeshGraph, group: &ChannelGroup) -> InterferenceCounters {
        let mut internal: IndexMap<ChannelId, usize> = self.palette.iter().map(|c| (*c, 0)).collect();
        let mut external = internal.clone();

        for module in &group.modules {
            for neighbor in self.connectivity.module_neighbors(module) {
                let Some(assigned) = plan.get_node(neighbor).and_then(|n| n.channel) else {
                    continue;
                };
                if let Some(count) = internal.get_mut(&assigned) {
                    *count += 1;
                }
            }
            if let Some(node) = plan.get_node(module) {
                for seen in &node.seen_channels {
                    if let Some(count) = external.get_mut(seen) {
                        *count += 1;
                    }
                }
            }
        }

        InterferenceCounters { internal, external }
    }

    fn elect<R>(
        &self,
        plan: &MeshGraph,
        group: &ChannelGroup,
        usage: &GlobalChannelUsage,
        rng: &mut R,
    ) -> Result<ChannelId>
    where
        R: Rng + ?Sized,
    {
        let counters = self.interference(plan, group);

        let least_interference = self.palette.iter().map(|c| counters.score(*c)).min();
        let quiet: Vec<ChannelId> = self
            .palette
            .iter()
            .copied()
            .filter(|c| Some(counters.score(*c)) == least_interference)
            .collect();
        if let [only] = quiet.as_slice() {
            return Ok(*only);
        }

        let least_used = quiet.iter().map(|c| usage.get(*c)).min();
        let idle: Vec<ChannelId> = quiet
            .into_iter()
            .filter(|c| Some(usage.get(*c)) == least_used)
            .collect();
        if let [only] = idle.as_slice() {
            return Ok(*only);
        }

        idle.choose(rng)
            .copied()
            .ok_or_else(|| MeshPlanError::Config("the assignable channel palette is empty".to_string()))
    }

    fn apply(
        &self,
        plan: &mut MeshGraph,
        group: &ChannelGroup,
        channel: ChannelId,
        devices: &mut DeviceChannelUsage,
    ) -> Result<()> {
        for module in &group.modules {
            let Some(node) = plan.get_node_mut(module) else {
                continue;
            };
            match node.channel {
                Some(existing) if existing != channel => {
                    tracing::error!(%module, %existing, %channel, "Module assigned two channels");
                    return Err(MeshPlanError::InconsistentData(format!(
                        "module {} already uses channel {} but its channel group elected {}",
                        module, existing, channel
                    )));
                }
                _ => node.channel = Some(channel),
            }
        }

        for key in &group.edges {
            let Some(link) = plan.get_edge_mut(key).and_then(|e| e.real_link_mut()) else {
                continue;
            };
            link.channel = Some(channel);

            let (a, b) = key.endpoints();
            for module in [a, b] {
                if let Some(device) = plan.owner_of(module) {
                    devices.record(device, channel);
                }
            }
        }

        Ok(())
    }
}

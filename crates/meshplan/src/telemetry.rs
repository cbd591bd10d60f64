//! Fleet telemetry snapshot - the input boundary of a planning cycle
//!
//! A snapshot is assembled by the telemetry collector before planning starts
//! and is immutable for the duration of the cycle.

use indexmap::map::Entry;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::PlannerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::topology::graph::{ChannelId, DirectedMeshGraph, Node, NodeId};
use crate::{MeshPlanError, Result};

/// One radio interface of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RadioInventory {
    pub id: NodeId,
    /// Zero-based interface index on the device
    pub interface: u8,
}

/// An access point and its radios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInventory {
    pub id: NodeId,
    pub name: String,
    /// Physical radio count; defaults to the number of listed radios
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio_count: Option<usize>,
    pub radios: Vec<RadioInventory>,
}

/// `source` heard `dest` with the given signal strength
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkObservation {
    pub source: NodeId,
    pub dest: NodeId,
    /// SNR-style link quality, normalized to 0..=100
    pub signal_strength: f64,
    /// Channel the link was heard on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_secs: Option<u64>,
}

/// A foreign network heard by one of our radios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForeignSighting {
    pub module: NodeId,
    pub channel: ChannelId,
}

/// Everything one planning cycle consumes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FleetSnapshot {
    pub devices: Vec<DeviceInventory>,
    #[serde(default)]
    pub observations: Vec<LinkObservation>,
    #[serde(default)]
    pub foreign_sightings: Vec<ForeignSighting>,
}

impl FleetSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// JSON Schema of the snapshot format
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(FleetSnapshot)
    }

    pub fn radio_count(&self) -> usize {
        self.devices.iter().map(|d| d.radios.len()).sum()
    }

    /// Build the directed pre-merge graph.
    ///
    /// Malformed inventory is fatal. Observations that cannot become links
    /// (unknown radios, stale readings, two radios of one device) are skipped
    /// and recorded in `sink`.
    pub fn to_directed_graph(
        &self,
        config: &PlannerConfig,
        sink: &mut DiagnosticsSink,
    ) -> Result<DirectedMeshGraph> {
        let mut directed = DirectedMeshGraph::new();

        let mut sightings: IndexMap<&NodeId, Vec<ChannelId>> = IndexMap::new();
        for sighting in &self.foreign_sightings {
            sightings.entry(&sighting.module).or_default().push(sighting.channel);
        }

        for device in &self.devices {
            let capacity = device.radio_count.unwrap_or(device.radios.len());
            if device.radios.is_empty() || capacity == 0 {
                return Err(MeshPlanError::InvalidSnapshot(format!(
                    "device {} has no radios",
                    device.id
                )));
            }

            directed.add_device(Node::device(device.id.clone(), device.name.as_str(), capacity))?;
            for radio in &device.radios {
                let seen = sightings.shift_remove(&radio.id).unwrap_or_default();
                directed.add_module(
                    Node::module(radio.id.clone(), device.id.clone(), radio.interface)
                        .with_seen_channels(seen),
                )?;
            }
        }

        for (module, channels) in sightings {
            for _ in channels {
                sink.record(Diagnostic::UnknownSightingRadio {
                    module: module.clone(),
                });
            }
        }

        for ((source, dest), reading) in self.usable_observations(&directed, config, sink)? {
            directed.observe(&source, &dest, reading.snr)?;
            if let Some(channel) = reading.channel {
                directed.observed_on(&source, &dest, channel);
            }
        }

        tracing::info!(
            devices = self.devices.len(),
            radios = self.radio_count(),
            observations = directed.observation_count(),
            "Loaded fleet snapshot"
        );
        Ok(directed)
    }

    /// Freshest usable reading per direction, in first-seen order
    fn usable_observations(
        &self,
        directed: &DirectedMeshGraph,
        config: &PlannerConfig,
        sink: &mut DiagnosticsSink,
    ) -> Result<IndexMap<(NodeId, NodeId), Reading>> {
        let mut freshest: IndexMap<(NodeId, NodeId), Reading> = IndexMap::new();

        for observation in &self.observations {
            let LinkObservation {
                source,
                dest,
                signal_strength,
                channel,
                age_secs,
            } = observation;

            if !signal_strength.is_finite() {
                return Err(MeshPlanError::InvalidSnapshot(format!(
                    "observation {} -> {} has signal strength {}",
                    source, dest, signal_strength
                )));
            }

            let owners = (
                directed.get_node(source).and_then(Node::owner),
                directed.get_node(dest).and_then(Node::owner),
            );
            let (Some(source_owner), Some(dest_owner)) = owners else {
                sink.record(Diagnostic::UnknownRadio {
                    source: source.clone(),
                    dest: dest.clone(),
                });
                continue;
            };

            if let (Some(max), Some(age)) = (config.max_observation_age_secs, *age_secs) {
                if age > max {
                    sink.record(Diagnostic::StaleObservation {
                        source: source.clone(),
                        dest: dest.clone(),
                        age_secs: age,
                    });
                    continue;
                }
            }

            if source_owner == dest_owner {
                sink.record(Diagnostic::SameDeviceObservation {
                    source: source.clone(),
                    dest: dest.clone(),
                    device: source_owner.clone(),
                });
                continue;
            }

            let reading = Reading {
                snr: *signal_strength,
                channel: *channel,
                age: age_secs.unwrap_or(0),
            };
            match freshest.entry((source.clone(), dest.clone())) {
                Entry::Occupied(mut kept) => {
                    if reading.age <= kept.get().age {
                        kept.insert(reading);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(reading);
                }
            }
        }

        Ok(freshest)
    }
}

/// The reading kept for one direction of a link
#[derive(Debug, Clone, Copy)]
struct Reading {
    snr: f64,
    channel: Option<ChannelId>,
    age: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn observation(source: &str, dest: &str, snr: f64, age: Option<u64>) -> LinkObservation {
        LinkObservation {
            source: id(source),
            dest: id(dest),
            signal_strength: snr,
            channel: None,
            age_secs: age,
        }
    }

    fn create_snapshot() -> FleetSnapshot {
        let json = r#"{
            "devices": [
                { "id": "ap-1", "name": "Lobby", "radios": [
                    { "id": "ap-1/0", "interface": 0 },
                    { "id": "ap-1/1", "interface": 1 }
                ] },
                { "id": "ap-2", "name": "Hall", "radioCount": 3, "radios": [
                    { "id": "ap-2/0", "interface": 0 }
                ] }
            ],
            "foreignSightings": [
                { "module": "ap-1/0", "channel": 6 },
                { "module": "ap-1/0", "channel": 6 }
            ]
        }"#;
        FleetSnapshot::from_json(json).unwrap()
    }

    #[test]
    fn test_inventory_becomes_nodes() {
        let snapshot = create_snapshot();
        let mut sink = DiagnosticsSink::new();
        let directed = snapshot
            .to_directed_graph(&PlannerConfig::default(), &mut sink)
            .unwrap();

        let lobby = directed.get_node(&id("ap-1")).unwrap();
        assert_eq!(lobby.module_capacity(), Some(2));
        assert_eq!(lobby.label, "Lobby");
        assert_eq!(directed.get_node(&id("ap-2")).unwrap().module_capacity(), Some(3));

        let radio = directed.get_node(&id("ap-1/1")).unwrap();
        assert_eq!(radio.owner(), Some(&id("ap-1")));
        assert_eq!(radio.label, "WLAN-2");
        assert_eq!(directed.get_node(&id("ap-1/0")).unwrap().seen_count(ChannelId(6)), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_filtered_observations_are_recorded() {
        let mut snapshot = create_snapshot();
        snapshot.observations = vec![
            observation("ap-1/0", "ap-2/0", 50.0, Some(5)),
            observation("ap-1/0", "ghost", 50.0, None),
            observation("ap-2/0", "ap-1/0", 40.0, Some(900)),
            observation("ap-1/0", "ap-1/1", 90.0, None),
        ];
        let config = PlannerConfig {
            max_observation_age_secs: Some(300),
            ..PlannerConfig::default()
        };

        let mut sink = DiagnosticsSink::new();
        let directed = snapshot.to_directed_graph(&config, &mut sink).unwrap();

        assert_eq!(directed.observation_count(), 1);
        let codes: Vec<&str> = sink.entries().iter().map(|d| d.code()).collect();
        assert_eq!(codes, vec!["unknown_radio", "stale_observation", "same_device_observation"]);
    }

    #[test]
    fn test_freshest_reading_wins() {
        let mut snapshot = create_snapshot();
        snapshot.observations = vec![
            observation("ap-1/0", "ap-2/0", 30.0, Some(20)),
            observation("ap-1/0", "ap-2/0", 45.0, Some(2)),
            observation("ap-1/0", "ap-2/0", 60.0, Some(10)),
            observation("ap-1/0", "ap-2/0", 55.0, Some(2)),
        ];

        let directed = snapshot
            .to_directed_graph(&PlannerConfig::default(), &mut DiagnosticsSink::new())
            .unwrap();
        assert_eq!(directed.observation(&id("ap-1/0"), &id("ap-2/0")), Some(55.0));
    }

    #[test]
    fn test_observed_channel_follows_freshest_reading() {
        let mut snapshot = create_snapshot();
        let mut stale = observation("ap-1/0", "ap-2/0", 30.0, Some(20));
        stale.channel = Some(ChannelId(1));
        let mut fresh = observation("ap-1/0", "ap-2/0", 45.0, Some(2));
        fresh.channel = Some(ChannelId(11));
        snapshot.observations = vec![
            stale,
            fresh,
            observation("ap-2/0", "ap-1/0", 40.0, None),
            observation("ap-1/1", "ap-2/0", 20.0, None),
        ];

        let directed = snapshot
            .to_directed_graph(&PlannerConfig::default(), &mut DiagnosticsSink::new())
            .unwrap();
        assert_eq!(
            directed.observed_channel(&id("ap-1/0"), &id("ap-2/0")),
            Some(ChannelId(11))
        );
        assert_eq!(directed.observed_channel(&id("ap-2/0"), &id("ap-1/0")), None);
        assert_eq!(directed.observed_channel(&id("ap-1/1"), &id("ap-2/0")), None);
    }

    #[test]
    fn test_malformed_inventory_is_rejected() {
        let mut snapshot = create_snapshot();
        snapshot.devices[1].radios.clear();
        let result = snapshot.to_directed_graph(&PlannerConfig::default(), &mut DiagnosticsSink::new());
        assert!(matches!(result, Err(MeshPlanError::InvalidSnapshot(_))));

        let mut snapshot = create_snapshot();
        snapshot.devices[1].radios[0].id = id("ap-1/0");
        let result = snapshot.to_directed_graph(&PlannerConfig::default(), &mut DiagnosticsSink::new());
        assert!(matches!(result, Err(MeshPlanError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_unknown_sighting_is_recorded() {
        let mut snapshot = create_snapshot();
        snapshot.foreign_sightings.push(ForeignSighting {
            module: id("ap-9/0"),
            channel: ChannelId(11),
        });
        let mut sink = DiagnosticsSink::new();
        snapshot
            .to_directed_graph(&PlannerConfig::default(), &mut sink)
            .unwrap();
        assert_eq!(
            sink.entries(),
            &[Diagnostic::UnknownSightingRadio { module: id("ap-9/0") }]
        );
    }

    #[test]
    fn test_schema_names_snapshot_fields() {
        let schema = serde_json::to_string(&FleetSnapshot::json_schema()).unwrap();
        assert!(schema.contains("foreignSightings"));
        assert!(schema.contains("signalStrength"));
    }
}

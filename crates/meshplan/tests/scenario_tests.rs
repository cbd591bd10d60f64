//! End-to-end planning scenarios

use meshplan::{
    BandwidthTable, ChannelId, ChannelPlanner, DeviceChannelUsage, DeviceInventory, Diagnostic,
    DiagnosticsSink, DirectedMeshGraph, Edge, EdgeKey, FleetSnapshot, GlobalChannelUsage,
    GraphMerger, LinkObservation, MergePolicy, MeshGraph, MeshPlanError, MeshPlanner, Node, NodeId,
    Plan, PlanValidator, PlannerConfig, RadioInventory, TopologyPlanner,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

/// `ap<n>` devices with a single radio `m<n>` each
fn single_radio_fleet(count: usize) -> Vec<DeviceInventory> {
    (1..=count)
        .map(|n| DeviceInventory {
            id: NodeId::new(format!("ap{}", n)),
            name: format!("AP {}", n),
            radio_count: None,
            radios: vec![RadioInventory {
                id: NodeId::new(format!("m{}", n)),
                interface: 0,
            }],
        })
        .collect()
}

fn both_ways(a: &str, b: &str, snr: f64) -> [LinkObservation; 2] {
    let one_way = |source: &str, dest: &str| LinkObservation {
        source: id(source),
        dest: id(dest),
        signal_strength: snr,
        channel: None,
        age_secs: None,
    };
    [one_way(a, b), one_way(b, a)]
}

fn snapshot(devices: usize, links: &[(&str, &str, f64)]) -> FleetSnapshot {
    FleetSnapshot {
        devices: single_radio_fleet(devices),
        observations: links
            .iter()
            .flat_map(|(a, b, snr)| both_ways(a, b, *snr))
            .collect(),
        foreign_sightings: vec![],
    }
}

#[test]
fn test_scenario_a_two_devices_single_channel() {
    let config = PlannerConfig::default().with_channels([6]);
    let outcome = MeshPlanner::new(config)
        .unwrap()
        .plan(&snapshot(2, &[("m1", "m2", 50.0)]))
        .unwrap();

    let merged = outcome.connectivity.find_edge(&id("m1"), &id("m2")).unwrap();
    assert_eq!(outcome.connectivity.real_edge_count(), 1);
    assert_eq!(merged.snr(), 50.0);

    let plan = &outcome.plan;
    assert_eq!(plan.graph.real_edge_count(), 1);
    assert_eq!(plan.channel_of(&id("m1")), Some(ChannelId(6)));
    assert_eq!(plan.channel_of(&id("m2")), Some(ChannelId(6)));

    // The only link is a bridge with nothing to back it up
    assert_eq!(
        outcome.diagnostics,
        vec![Diagnostic::BackupNotFound {
            link: EdgeKey::new(&id("m1"), &id("m2"))
        }]
    );
}

#[test]
fn test_scenario_b_spanning_tree_skips_weak_link() {
    let snapshot = snapshot(3, &[("m1", "m2", 80.0), ("m2", "m3", 80.0), ("m1", "m3", 10.0)]);
    let config = PlannerConfig::default();
    let mut sink = DiagnosticsSink::new();
    let directed = snapshot.to_directed_graph(&config, &mut sink).unwrap();
    let connectivity = GraphMerger::new(MergePolicy::Lower)
        .merge(&directed, &mut sink)
        .unwrap();

    let tree = TopologyPlanner::new(&connectivity, &config.bandwidth)
        .build_tree()
        .unwrap();

    assert_eq!(tree.edge_count(), 5);
    assert!(tree.has_edge(&id("m1"), &id("m2")));
    assert!(tree.has_edge(&id("m2"), &id("m3")));
    assert!(!tree.has_edge(&id("m1"), &id("m3")));
}

#[test]
fn test_scenario_c_backup_links() {
    let outcome = MeshPlanner::new(PlannerConfig::default())
        .unwrap()
        .plan(&snapshot(
            4,
            &[
                ("m1", "m2", 80.0),
                ("m2", "m3", 80.0),
                ("m1", "m3", 30.0),
                ("m3", "m4", 60.0),
            ],
        ))
        .unwrap();

    let plan = &outcome.plan;
    let backups: Vec<&EdgeKey> = plan.backup_links().map(|e| &e.key).collect();
    assert_eq!(backups, vec![&EdgeKey::new(&id("m1"), &id("m3"))]);
    assert_eq!(plan.primary_links().count(), 3);

    assert_eq!(
        outcome.diagnostics,
        vec![Diagnostic::BackupNotFound {
            link: EdgeKey::new(&id("m3"), &id("m4"))
        }]
    );

    // Backup links still get a channel and are written after the primaries
    let push = plan.push_plan().unwrap();
    assert_eq!(push.links.len(), 4);
    assert_eq!(push.links[3].priority, 1003);
    assert_eq!(push.links[3].source.module, id("m1"));
    assert_eq!(push.links[3].dest.module, id("m3"));
}

/// Two radio chains on one hub that cannot hear each other
fn two_group_graph() -> MeshGraph {
    let mut graph = MeshGraph::new();
    graph.add_node(Node::device("hub", "Hub", 2));
    graph.add_node(Node::device("east", "East", 1));
    graph.add_node(Node::device("west", "West", 1));
    for (module, device, interface) in [("hub.0", "hub", 0), ("hub.1", "hub", 1), ("east.0", "east", 0), ("west.0", "west", 0)] {
        graph.add_node(Node::module(module, device, interface));
        graph
            .add_edge(Edge::virtual_link(&id(device), &id(module)))
            .unwrap();
    }
    graph
        .add_edge(Edge::real(&id("hub.0"), &id("east.0"), 60.0))
        .unwrap();
    graph
        .add_edge(Edge::real(&id("hub.1"), &id("west.0"), 60.0))
        .unwrap();
    graph
}

fn color(graph: &MeshGraph, palette: &[ChannelId], seed: u64) -> (Option<ChannelId>, Option<ChannelId>) {
    let mut plan = graph.clone();
    let mut usage = GlobalChannelUsage::new(palette);
    let mut devices = DeviceChannelUsage::new();
    let mut rng = StdRng::seed_from_u64(seed);
    ChannelPlanner::new(graph, palette)
        .assign(&mut plan, &mut usage, &mut devices, &mut rng)
        .unwrap();
    (
        plan.get_node(&id("hub.0")).unwrap().channel,
        plan.get_node(&id("hub.1")).unwrap().channel,
    )
}

#[test]
fn test_scenario_d_seeded_tie_break() {
    let graph = two_group_graph();
    let palette = vec![ChannelId(1), ChannelId(6), ChannelId(11)];

    let mut outcomes = std::collections::HashSet::new();
    for seed in 0..32 {
        let first = color(&graph, &palette, seed);
        assert_eq!(first, color(&graph, &palette, seed));

        // Global usage steers the second group away from the first channel
        let (east, west) = first;
        assert!(east.is_some() && west.is_some());
        assert_ne!(east, west);
        outcomes.insert(first);
    }
    assert!(outcomes.len() > 1);
}

#[test]
fn test_scenario_e_capacity_violation() {
    let mut graph = MeshGraph::new();
    graph.add_node(Node::device("hub", "Hub", 2));
    for (n, channel) in [(0u8, 1u16), (1, 6), (2, 11)] {
        let radio = format!("hub.{}", n);
        let peer = format!("peer{}", n);
        let peer_radio = format!("peer{}.0", n);
        graph.add_node(Node::module(radio.as_str(), "hub", n));
        graph.add_node(Node::device(peer.as_str(), peer.as_str(), 1));
        graph.add_node(Node::module(peer_radio.as_str(), peer.as_str(), 0));
        graph
            .add_edge(Edge::virtual_link(&id("hub"), &id(&radio)))
            .unwrap();
        graph
            .add_edge(Edge::virtual_link(&id(&peer), &id(&peer_radio)))
            .unwrap();
        graph
            .add_edge(Edge::real(&id(&radio), &id(&peer_radio), 50.0).with_channel(ChannelId(channel)))
            .unwrap();
    }

    let palette = vec![ChannelId(1), ChannelId(6), ChannelId(11)];
    let devices = DeviceChannelUsage::tally(&graph);
    assert_eq!(devices.distinct_channels(&id("hub")), 3);

    let plan = Plan::new(graph, palette.clone(), GlobalChannelUsage::new(&palette), devices, 0);
    match PlanValidator::new().validate(&plan) {
        Err(MeshPlanError::Validation(violation)) => {
            assert_eq!(violation.invariant_name, "module_capacity");
            assert_eq!(violation.affected_nodes, vec![id("hub")]);
        }
        other => panic!("expected a validation failure, got {:?}", other),
    }
}

#[test]
fn test_one_sided_link_is_reported_not_planned() {
    let mut snapshot = snapshot(3, &[("m1", "m2", 70.0), ("m2", "m3", 70.0)]);
    snapshot.observations.push(LinkObservation {
        source: id("m3"),
        dest: id("m1"),
        signal_strength: 95.0,
        channel: None,
        age_secs: None,
    });

    let outcome = MeshPlanner::new(PlannerConfig::default())
        .unwrap()
        .plan(&snapshot)
        .unwrap();

    assert!(!outcome.connectivity.has_edge(&id("m1"), &id("m3")));
    assert!(outcome.diagnostics.contains(&Diagnostic::OneSidedLink {
        source: id("m3"),
        dest: id("m1"),
    }));
}

#[test]
fn test_saturated_table_falls_back_to_snr() {
    // A table that saturates early makes every link equal on bandwidth, so
    // the raw SNR tie-break decides
    let table = BandwidthTable {
        scale: 1.0,
        segments: vec![],
        saturation: 10.0,
    };
    let mut directed = DirectedMeshGraph::new();
    for n in 1..=3 {
        directed
            .add_device(Node::device(format!("ap{}", n), format!("AP {}", n), 1))
            .unwrap();
        directed
            .add_module(Node::module(format!("m{}", n), format!("ap{}", n), 0))
            .unwrap();
    }
    for (a, b, snr) in [("m1", "m2", 40.0), ("m1", "m3", 45.0), ("m2", "m3", 90.0)] {
        directed.observe(&id(a), &id(b), snr).unwrap();
        directed.observe(&id(b), &id(a), snr).unwrap();
    }

    let config = PlannerConfig::default()
        .with_bandwidth(table)
        .with_survivability(false);
    let outcome = MeshPlanner::new(config).unwrap().plan_directed(&directed).unwrap();

    assert!(outcome.plan.graph.has_edge(&id("m1"), &id("m3")));
    assert!(!outcome.plan.graph.has_edge(&id("m1"), &id("m2")));
}

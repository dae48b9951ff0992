//! Integration tests for gossip map replication over the mock network.

use std::sync::Arc;

use parking_lot::Mutex;

use intent_store_core::prelude::*;
use intent_store_net::prelude::*;
use intent_store_net::{MockNetwork, StaticCluster};

type PendingMap = GossipMap<IntentKey, IntentRecord, RecordVersionClock>;
type CurrentMap = GossipMap<IntentKey, IntentRecord, LogicalRecordClock>;

fn node(id: &str) -> NodeId {
    NodeId::new(id)
}

fn record(key: &str, state: IntentState, millis: u64) -> IntentRecord {
    IntentRecord::new(
        Intent::new(IntentKey::new(key), "org.test", vec![1]),
        state,
        Some(WallClockTimestamp::new(millis, 0, node("n1"))),
    )
}

/// Peer selector that always gossips to every other member.
fn broadcast(members: Vec<NodeId>) -> PeerSelector<IntentKey, IntentRecord> {
    Arc::new(move |_key: &IntentKey, _value: &IntentRecord| members.clone())
}

fn pending_map(network: &Arc<MockNetwork>, local: &str, members: &[&str]) -> PendingMap {
    let members: Vec<NodeId> = members.iter().map(|m| node(m)).collect();
    selective_map(network, local, &members, broadcast(members.clone()))
}

fn selective_map(
    network: &Arc<MockNetwork>,
    local: &str,
    members: &[NodeId],
    peers: PeerSelector<IntentKey, IntentRecord>,
) -> PendingMap {
    GossipMap::new(
        "intent-pending",
        Arc::new(StaticCluster::new(node(local), members)),
        network.endpoint(node(local)),
        RecordVersionClock,
        peers,
    )
}

fn recorder(map: &impl ReplicatedRecordMap<IntentKey, IntentRecord>) -> Arc<Mutex<Vec<MapEventKind>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    map.add_listener(Arc::new(move |event: &MapEvent<IntentKey, IntentRecord>| {
        sink.lock().push(event.kind);
    }));
    seen
}

#[test]
fn put_reaches_selected_peer() {
    let network = MockNetwork::new();
    let a = pending_map(&network, "n1", &["n1", "n2"]);
    let b = pending_map(&network, "n2", &["n1", "n2"]);
    let seen = recorder(&b);

    a.put(IntentKey::new("x"), record("x", IntentState::InstallReq, 10));
    assert!(b.get(&IntentKey::new("x")).is_none());

    network.deliver_all();

    assert_eq!(b.get(&IntentKey::new("x")).map(|r| r.state()), Some(IntentState::InstallReq));
    assert_eq!(seen.lock().as_slice(), &[MapEventKind::Put]);
}

#[test]
fn older_remote_entry_is_dropped() {
    let network = MockNetwork::new();
    let a = pending_map(&network, "n1", &["n1", "n2"]);
    let b = pending_map(&network, "n2", &["n1", "n2"]);

    a.put(IntentKey::new("x"), record("x", IntentState::InstallReq, 10));
    b.put(IntentKey::new("x"), record("x", IntentState::WithdrawReq, 20));
    network.deliver_all();

    for map in [&a, &b] {
        let stored = map.get(&IntentKey::new("x")).unwrap();
        assert_eq!(stored.state(), IntentState::WithdrawReq);
    }
}

#[test]
fn removal_wins_over_equal_timestamp_and_stays_removed() {
    let network = MockNetwork::new();
    let a = pending_map(&network, "n1", &["n1", "n2"]);
    let b = pending_map(&network, "n2", &["n1", "n2"]);
    let submitted = record("x", IntentState::InstallReq, 10);

    a.put(IntentKey::new("x"), submitted.clone());
    network.deliver_all();

    let processed = submitted.clone().with_state(IntentState::Installed);
    assert!(b.remove(&IntentKey::new("x"), &processed));
    network.deliver_all();

    assert!(a.get(&IntentKey::new("x")).is_none());
    assert_eq!(a.size(), 0);

    // late duplicate of the removed revision must not revive it
    a.receive(
        &node("n2"),
        &GossipEnvelope::pack(
            "intent-pending",
            node("n2"),
            &[GossipEntry {
                key: IntentKey::new("x"),
                value: submitted.clone(),
                removed: false,
                timestamp: submitted.version().cloned(),
            }],
        )
        .unwrap()
        .serialize()
        .unwrap(),
    );
    assert!(a.get(&IntentKey::new("x")).is_none());
}

#[test]
fn remove_requires_matching_revision() {
    let network = MockNetwork::new();
    let a = pending_map(&network, "n1", &["n1"]);
    a.put(IntentKey::new("x"), record("x", IntentState::InstallReq, 10));

    assert!(!a.remove(&IntentKey::new("x"), &record("x", IntentState::InstallReq, 11)));
    assert_eq!(a.size(), 1);
}

#[test]
fn anti_entropy_repairs_lost_gossip() {
    let network = MockNetwork::new();
    let a = pending_map(&network, "n1", &["n1", "n2"]);
    let b = pending_map(&network, "n2", &["n1", "n2"]);

    a.put(IntentKey::new("x"), record("x", IntentState::InstallReq, 10));
    assert_eq!(network.drop_all(), 1);
    assert!(b.get(&IntentKey::new("x")).is_none());

    a.anti_entropy();
    network.deliver_all();
    assert!(b.get(&IntentKey::new("x")).is_some());
}

#[test]
fn rewrites_by_different_writers_converge() {
    let network = MockNetwork::new();
    let members = vec![node("n1"), node("n2")];
    let current = |local: &str| -> CurrentMap {
        GossipMap::new(
            "intent-current",
            Arc::new(StaticCluster::new(node(local), &members)),
            network.endpoint(node(local)),
            LogicalRecordClock::new(node(local)),
            broadcast(members.clone()),
        )
    };
    let a = current("n1");
    let b = current("n2");

    a.put(IntentKey::new("x"), record("x", IntentState::Installing, 10));
    b.put(IntentKey::new("x"), record("x", IntentState::Installed, 10));
    network.deliver_all();

    let left = a.get(&IntentKey::new("x")).unwrap().state();
    let right = b.get(&IntentKey::new("x")).unwrap().state();
    assert_eq!(left, right);
}

#[test]
fn anti_entropy_reaches_members_no_selector_picks() {
    let network = MockNetwork::new();
    let members = vec![node("n1"), node("n2"), node("n3")];
    let to_n2 = |local: &str| {
        let peers: PeerSelector<IntentKey, IntentRecord> =
            Arc::new(|_: &IntentKey, _: &IntentRecord| vec![node("n2")]);
        selective_map(&network, local, &members, peers)
    };
    let a = to_n2("n1");
    let b = to_n2("n2");
    let c = to_n2("n3");

    a.put(IntentKey::new("x"), record("x", IntentState::InstallReq, 10));
    network.deliver_all();
    assert!(b.get(&IntentKey::new("x")).is_some());
    assert!(c.get(&IntentKey::new("x")).is_none());

    for _ in 0..64 {
        for map in [&a, &b] {
            assert!(map.anti_entropy().is_some());
        }
        network.deliver_all();
        if c.get(&IntentKey::new("x")).is_some() {
            break;
        }
    }
    assert_eq!(c.get(&IntentKey::new("x")).map(|r| r.state()), Some(IntentState::InstallReq));
}

#[test]
fn anti_entropy_never_targets_the_local_node() {
    let network = MockNetwork::new();
    let a = pending_map(&network, "n1", &["n1", "n2"]);
    let alone = pending_map(&network, "n3", &["n3"]);

    for _ in 0..16 {
        assert_eq!(a.anti_entropy(), Some(node("n2")));
    }
    assert_eq!(alone.anti_entropy(), None);
}

#[test]
fn local_restate_is_sent_again() {
    let network = MockNetwork::new();
    let a = pending_map(&network, "n1", &["n1", "n2"]);
    let seen = recorder(&a);
    let submitted = record("x", IntentState::InstallReq, 10);

    a.put(IntentKey::new("x"), submitted.clone());
    assert_eq!(network.drop_all(), 1);

    a.put(IntentKey::new("x"), submitted.clone());
    assert_eq!(network.pending(), 1);
    assert_eq!(seen.lock().as_slice(), &[MapEventKind::Put, MapEventKind::Put]);

    // a retired revision stays retired
    assert!(a.remove(&IntentKey::new("x"), &submitted));
    network.drop_all();
    a.put(IntentKey::new("x"), submitted);
    assert!(a.get(&IntentKey::new("x")).is_none());
    assert_eq!(network.pending(), 0);
}

#[test]
fn destroyed_map_ignores_gossip() {
    let network = MockNetwork::new();
    let a = pending_map(&network, "n1", &["n1", "n2"]);
    let b = pending_map(&network, "n2", &["n1", "n2"]);
    let seen = recorder(&b);

    b.destroy();
    a.put(IntentKey::new("x"), record("x", IntentState::InstallReq, 10));
    network.deliver_all();

    assert_eq!(b.size(), 0);
    assert!(seen.lock().is_empty());
}

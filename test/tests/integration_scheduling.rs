// Integration tests for the server's scheduling decisions: relevancy,
// priority under a byte budget, saturation and dormancy

use replicore_client::{DespawnEvent, SpawnEvent};
use replicore_server::ServerConfig;
use replicore_shared::{CloseReason, ConnectionId, NetDormancy, NetObject, NetVector, Viewer};
use replicore_test::{test_config, Pickup, TestHarness};

fn far_viewer(connection: ConnectionId) -> Viewer {
    Viewer::new(
        connection,
        NetVector::new(100_000.0, 0.0, 0.0),
        NetVector::new(1.0, 0.0, 0.0),
    )
}

/// An object beyond the cull distance gets no channel until a viewer comes close
#[test]
fn distant_object_is_not_replicated() {
    let mut harness = TestHarness::new(1);
    let pickup = NetObject::new(Pickup::new(3, 20_000.0, 0.0));
    let guid = harness.server.add_object(&pickup).expect("pickup should be added");

    let stats = harness.step(0.1);
    assert_eq!(stats.considered, 1);
    assert_eq!(stats.relevant, 0);
    assert!(!harness.server.has_channel(&pickup, ConnectionId(1)));

    let viewer = Viewer::new(
        ConnectionId(1),
        NetVector::new(19_000.0, 0.0, 0.0),
        NetVector::new(1.0, 0.0, 0.0),
    );
    harness
        .server
        .set_viewers(ConnectionId(1), vec![viewer])
        .expect("connection is known");
    harness.step(0.1);

    assert!(harness.server.has_channel(&pickup, ConnectionId(1)));
    let kind = harness
        .client(ConnectionId(1))
        .with_object(guid, |pickup: &Pickup| pickup.kind);
    assert_eq!(kind, Some(3));
}

/// A channel outlives relevancy by the timeout, then closes and the client
/// drops its copy
#[test]
fn irrelevant_channel_closes_after_timeout() {
    let mut harness = TestHarness::new(1);
    let pickup = NetObject::new(Pickup::new(1, 100.0, 0.0));
    let guid = harness.server.add_object(&pickup).expect("pickup should be added");
    harness.step(0.1);
    assert!(harness.server.has_channel(&pickup, ConnectionId(1)));

    harness
        .server
        .set_viewers(ConnectionId(1), vec![far_viewer(ConnectionId(1))])
        .expect("connection is known");

    // still inside the grace window
    for _ in 0..20 {
        harness.step(0.1);
    }
    assert!(harness.server.has_channel(&pickup, ConnectionId(1)));

    for _ in 0..60 {
        harness.step(0.1);
    }
    assert!(!harness.server.has_channel(&pickup, ConnectionId(1)));

    let mut events = harness.client(ConnectionId(1)).take_events();
    let despawned: Vec<_> = events.read::<DespawnEvent>().collect();
    assert_eq!(despawned, vec![(guid, CloseReason::NotRelevant)]);
    assert_eq!(harness.client(ConnectionId(1)).client.object_count(), 0);
}

/// Forced relevancy opens a channel for one update even for a distant object
#[test]
fn forced_relevancy_opens_channel() {
    let mut harness = TestHarness::new(1);
    let pickup = NetObject::new(Pickup::new(1, 50_000.0, 0.0));
    harness.server.add_object(&pickup).expect("pickup should be added");
    harness.step(0.1);
    assert!(!harness.server.has_channel(&pickup, ConnectionId(1)));

    harness
        .server
        .force_relevant_next_update(&pickup)
        .expect("pickup is replicated");
    let stats = harness.step(0.1);
    assert_eq!(stats.channels_opened, 1);
    assert!(harness.server.has_channel(&pickup, ConnectionId(1)));
}

/// With room for one bunch per tick the object in front of the viewer goes
/// first, the rest follow on later ticks in a stable order
#[test]
fn budget_spends_on_highest_priority_first() {
    let config = ServerConfig {
        max_bytes_per_connection_tick: 1,
        ..test_config()
    };
    let mut harness = TestHarness::with_config(config, 1);
    let behind = NetObject::new(Pickup::new(1, -100.0, 0.0));
    let beside = NetObject::new(Pickup::new(2, 0.0, 100.0));
    let ahead = NetObject::new(Pickup::new(3, 100.0, 0.0));
    let behind_guid = harness.server.add_object(&behind).expect("added");
    let beside_guid = harness.server.add_object(&beside).expect("added");
    let ahead_guid = harness.server.add_object(&ahead).expect("added");

    let mut spawn_order = Vec::new();
    for _ in 0..3 {
        let stats = harness.step(0.1);
        assert_eq!(stats.replicated, 1);
        let mut events = harness.client(ConnectionId(1)).take_events();
        spawn_order.extend(events.read::<SpawnEvent>().map(|(guid, _)| guid));
    }
    assert_eq!(spawn_order, vec![ahead_guid, behind_guid, beside_guid]);
}

/// A saturated connection gets nothing and its objects are retried as soon
/// as it drains
#[test]
fn saturated_connection_defers_objects() {
    let mut harness = TestHarness::new(1);
    let pickup = NetObject::new(Pickup::new(1, 100.0, 0.0));
    let guid = harness.server.add_object(&pickup).expect("pickup should be added");

    harness.transport.set_saturated(ConnectionId(1), true);
    let stats = harness.step(0.1);
    assert_eq!(stats.saturated_connections, 1);
    assert_eq!(stats.replicated, 0);

    harness.transport.set_saturated(ConnectionId(1), false);
    let stats = harness.step(0.1);
    assert_eq!(stats.replicated, 1);
    assert!(harness.client(ConnectionId(1)).client.object(guid).is_some());
}

/// A dormant object stops being considered for the connection until
/// dormancy is flushed, and the change made while dormant then arrives
#[test]
fn dormant_object_wakes_on_flush() {
    let mut harness = TestHarness::new(1);
    let pickup = NetObject::new(Pickup::new(1, 100.0, 0.0));
    pickup.settings_mut().dormancy = NetDormancy::DormantAll;
    let guid = harness.server.add_object(&pickup).expect("pickup should be added");

    harness.step(0.1);
    assert!(!harness.server.is_dormant(&pickup, ConnectionId(1)));
    harness.step(0.1);
    assert!(harness.server.is_dormant(&pickup, ConnectionId(1)));

    pickup.with_mut(|pickup: &mut Pickup| pickup.kind = 9).expect("pickup state");
    let stats = harness.step(0.1);
    assert_eq!(stats.dormant, 1);
    assert_eq!(stats.replicated, 0);
    let kind = harness
        .client(ConnectionId(1))
        .with_object(guid, |pickup: &Pickup| pickup.kind);
    assert_eq!(kind, Some(1));

    harness.server.flush_dormancy(&pickup).expect("pickup is replicated");
    let stats = harness.step(0.1);
    assert_eq!(stats.replicated, 1);
    let kind = harness
        .client(ConnectionId(1))
        .with_object(guid, |pickup: &Pickup| pickup.kind);
    assert_eq!(kind, Some(9));

    harness.step(0.1);
    assert!(harness.server.is_dormant(&pickup, ConnectionId(1)));
}

/// Objects that never allow dormancy keep being considered
#[test]
fn awake_object_never_goes_dormant() {
    let mut harness = TestHarness::new(1);
    let pickup = NetObject::new(Pickup::new(1, 100.0, 0.0));
    harness.server.add_object(&pickup).expect("pickup should be added");
    for _ in 0..10 {
        let stats = harness.step(0.1);
        assert_eq!(stats.dormant, 0);
    }
    assert!(!harness.server.is_dormant(&pickup, ConnectionId(1)));
}

// Integration tests for property replication between a server and its clients:
// initial state, loss recovery, shared comparisons and conditional fields

use replicore_client::{SpawnEvent, UpdateEvent};
use replicore_shared::{ConnectionId, NetObject};
use replicore_test::{protocol, Delivery, Pawn, TestClient, TestHarness};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A spawned object arrives with every field that differs from its defaults
#[test]
fn spawn_carries_initial_state() {
    init_logging();
    let mut harness = TestHarness::new(1);
    let mut state = Pawn::new(100);
    state.name = "Alpha".to_string();
    let pawn = NetObject::new(state);
    let guid = harness.server.add_object(&pawn).expect("pawn should be added");
    assert!(guid.is_dynamic());

    let stats = harness.step(0.1);
    assert_eq!(stats.channels_opened, 1);
    assert_eq!(stats.replicated, 1);

    let client = harness.client(ConnectionId(1));
    let mut events = client.take_events();
    let spawned: Vec<_> = events.read::<SpawnEvent>().map(|(guid, _)| guid).collect();
    assert_eq!(spawned, vec![guid]);

    let (health, name) = client
        .with_object(guid, |pawn: &Pawn| (pawn.health, pawn.name.clone()))
        .expect("pawn should exist on the client");
    assert_eq!(health, 100);
    assert_eq!(name, "Alpha");
    assert!(client.errors.is_empty(), "client errors: {:?}", client.errors);
}

/// Health goes 100 -> 80, the packet carrying 80 is lost, and the next
/// update sends 80 again
#[test]
fn lost_update_is_resent() {
    init_logging();
    let mut harness = TestHarness::new(1);
    let pawn = NetObject::new(Pawn::new(100));
    let guid = harness.server.add_object(&pawn).expect("pawn should be added");
    harness.step(0.1);

    pawn.with_mut(|pawn: &mut Pawn| pawn.health = 80).expect("pawn state");
    let stats = harness.tick(0.1);
    assert_eq!(stats.replicated, 1);
    harness.deliver_filtered(|_| Delivery::Drop);
    harness.tick_clients();

    let health = harness
        .client(ConnectionId(1))
        .with_object(guid, |pawn: &Pawn| pawn.health);
    assert_eq!(health, Some(100), "the update was lost");

    let stats = harness.step(0.1);
    assert_eq!(stats.replicated, 1, "the lost field should be sent again");
    let health = harness
        .client(ConnectionId(1))
        .with_object(guid, |pawn: &Pawn| pawn.health);
    assert_eq!(health, Some(80));

    // acknowledged, so nothing more until health changes again
    for _ in 0..3 {
        let stats = harness.step(0.1);
        assert_eq!(stats.replicated, 0);
    }
}

/// Nothing is written for an object whose fields didn't change
#[test]
fn unchanged_object_sends_nothing() {
    let mut harness = TestHarness::new(1);
    let pawn = NetObject::new(Pawn::new(100));
    harness.server.add_object(&pawn).expect("pawn should be added");
    harness.step(0.1);

    for _ in 0..5 {
        let stats = harness.step(0.1);
        assert_eq!(stats.replicated, 0);
        assert_eq!(stats.bytes_sent, 0);
    }
}

/// Two connections replicating the same object in one frame share one
/// comparison, and both still receive the change
#[test]
fn connections_share_one_comparison_per_frame() {
    let mut harness = TestHarness::new(2);
    let pawn = NetObject::new(Pawn::new(100));
    let guid = harness.server.add_object(&pawn).expect("pawn should be added");
    harness.step(0.1);

    let before = harness
        .server
        .changelists(&pawn)
        .expect("pawn has changelists")
        .compare_count();
    pawn.with_mut(|pawn: &mut Pawn| pawn.health = 42).expect("pawn state");
    harness.step(0.1);
    let after = harness
        .server
        .changelists(&pawn)
        .expect("pawn has changelists")
        .compare_count();
    assert_eq!(after - before, 1);

    for connection in [ConnectionId(1), ConnectionId(2)] {
        let health = harness
            .client(connection)
            .with_object(guid, |pawn: &Pawn| pawn.health);
        assert_eq!(health, Some(42), "{:?} should see the change", connection);
    }
}

/// Owner-only fields reach the owning connection and nobody else
#[test]
fn owner_only_field_reaches_owner() {
    let mut harness = TestHarness::new(2);
    let mut state = Pawn::new(100);
    state.ammo = 30;
    let pawn = NetObject::new(state);
    pawn.set_owner(Some(ConnectionId(1)));
    let guid = harness.server.add_object(&pawn).expect("pawn should be added");
    harness.step(0.1);

    let owner_ammo = harness
        .client(ConnectionId(1))
        .with_object(guid, |pawn: &Pawn| pawn.ammo);
    let other_ammo = harness
        .client(ConnectionId(2))
        .with_object(guid, |pawn: &Pawn| pawn.ammo);
    assert_eq!(owner_ammo, Some(30));
    assert_eq!(other_ammo, Some(0));
    assert!(harness.client(ConnectionId(1)).client.is_owner(guid));
    assert!(!harness.client(ConnectionId(2)).client.is_owner(guid));
}

/// A notifying field runs its notification on the receiver once per change
#[test]
fn notifications_follow_changes() {
    let mut harness = TestHarness::new(1);
    let pawn = NetObject::new(Pawn::new(100));
    let guid = harness.server.add_object(&pawn).expect("pawn should be added");
    harness.step(0.1);

    pawn.with_mut(|pawn: &mut Pawn| pawn.health = 60).expect("pawn state");
    harness.step(0.1);

    let client = harness.client(ConnectionId(1));
    let notified = client
        .with_object(guid, |pawn: &Pawn| pawn.notified.clone())
        .expect("pawn should exist on the client");
    assert_eq!(notified, vec![Pawn::HEALTH, Pawn::HEALTH]);

    let mut events = client.take_events();
    let updated: Vec<_> = events.read::<UpdateEvent>().map(|(_, field)| field).collect();
    assert_eq!(updated, vec!["health", "health"]);
}

/// A connection joining late gets the full current state, not the history
#[test]
fn late_joiner_receives_current_state() {
    let mut harness = TestHarness::new(1);
    let pawn = NetObject::new(Pawn::new(100));
    let guid = harness.server.add_object(&pawn).expect("pawn should be added");
    for health in [90, 80, 70] {
        pawn.with_mut(|pawn: &mut Pawn| pawn.health = health).expect("pawn state");
        harness.step(0.1);
    }

    harness.server.add_connection(ConnectionId(2));
    harness
        .clients
        .push(TestClient::new(ConnectionId(2), protocol()));
    harness.step(0.1);

    let health = harness
        .client(ConnectionId(2))
        .with_object(guid, |pawn: &Pawn| pawn.health);
    assert_eq!(health, Some(70));
}

/// A channel open the transport refused is written again, header included
#[test]
fn refused_open_is_sent_again() {
    let mut harness = TestHarness::new(1);
    let pawn = NetObject::new(Pawn::new(100));
    let guid = harness.server.add_object(&pawn).expect("pawn should be added");

    harness.transport.set_failing(ConnectionId(1), true);
    let stats = harness.step(0.1);
    assert_eq!(stats.replicated, 0);
    assert!(harness.client(ConnectionId(1)).client.object(guid).is_none());

    harness.transport.set_failing(ConnectionId(1), false);
    let stats = harness.step(0.1);
    assert_eq!(stats.replicated, 1);
    let client = harness.client(ConnectionId(1));
    assert!(client.errors.is_empty(), "client errors: {:?}", client.errors);
    let health = client.with_object(guid, |pawn: &Pawn| pawn.health);
    assert_eq!(health, Some(100));
}

/// Changes written into a bunch the transport refused go out with the next
/// update, plain fields and custom delta items alike
#[test]
fn refused_update_is_sent_again() {
    let mut harness = TestHarness::new(1);
    let pawn = NetObject::new(Pawn::new(100));
    let guid = harness.server.add_object(&pawn).expect("pawn should be added");
    harness.step(0.1);

    let item = pawn
        .with_mut(|pawn: &mut Pawn| {
            pawn.health = 80;
            pawn.inventory.push(5)
        })
        .expect("pawn state");
    harness.transport.set_failing(ConnectionId(1), true);
    let stats = harness.step(0.1);
    assert_eq!(stats.replicated, 0);

    harness.transport.set_failing(ConnectionId(1), false);
    let stats = harness.step(0.1);
    assert_eq!(stats.replicated, 1);
    let (health, inventory) = harness
        .client(ConnectionId(1))
        .with_object(guid, |pawn: &Pawn| (pawn.health, pawn.inventory.get(item).copied()))
        .expect("pawn should exist on the client");
    assert_eq!(health, 80);
    assert_eq!(inventory, Some(5));

    let stats = harness.step(0.1);
    assert_eq!(stats.replicated, 0);
}

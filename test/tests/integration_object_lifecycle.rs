// Integration tests for object identity across connections: GUIDs, static
// objects, references and destruction

use std::rc::Rc;

use replicore_client::{DespawnEvent, DestroyEvent, SpawnEvent};
use replicore_shared::{CloseReason, ConnectionId, NetObject, NetVector, ObjectValue, Viewer};
use replicore_test::{Door, Pawn, Pickup, TestHarness};

fn far_viewer(connection: ConnectionId) -> Viewer {
    Viewer::new(
        connection,
        NetVector::new(100_000.0, 0.0, 0.0),
        NetVector::new(1.0, 0.0, 0.0),
    )
}

/// Every connection knows an object by the same GUID
#[test]
fn guid_is_shared_by_all_connections() {
    let mut harness = TestHarness::new(3);
    let pawn = NetObject::new(Pawn::new(100));
    let guid = harness.server.add_object(&pawn).expect("pawn should be added");
    assert_eq!(harness.server.add_object(&pawn), Ok(guid));
    harness.step(0.1);

    for index in 1..=3 {
        let client = harness.client(ConnectionId(index));
        let mut events = client.take_events();
        let spawned: Vec<_> = events.read::<SpawnEvent>().map(|(guid, _)| guid).collect();
        assert_eq!(spawned, vec![guid]);
        let object = client.client.object(guid).expect("spawned");
        assert_eq!(client.client.guid_for(&object), Some(guid));
    }
}

/// Static objects are bound to the receiver's own instance found by path
#[test]
fn static_object_binds_by_path() {
    let mut harness = TestHarness::new(1);
    let server_door = NetObject::new_static("Arena.Door", None, Door { open: true });
    let client_door = NetObject::new_static("Arena.Door", None, Door::default());
    harness.client(ConnectionId(1)).resolver.add_loaded(&client_door);

    let guid = harness.server.add_object(&server_door).expect("door should be added");
    assert!(guid.is_static());
    let pawn_guid = harness
        .server
        .add_object(&NetObject::new(Pawn::new(1)))
        .expect("pawn should be added");
    assert!(pawn_guid.is_dynamic());
    harness.step(0.1);

    let client = harness.client(ConnectionId(1));
    let bound = client.client.object(guid).expect("door bound");
    assert!(Rc::ptr_eq(&bound, &client_door));
    assert_eq!(client_door.with(|door: &Door| door.open), Some(true));
}

/// A static object the receiver can't find closes its channel with an error
#[test]
fn missing_static_object_is_an_error() {
    let mut harness = TestHarness::new(1);
    let server_door = NetObject::new_static("Arena.Door", None, Door { open: true });
    harness.server.add_object(&server_door).expect("door should be added");
    harness.step(0.1);

    let client = harness.client(ConnectionId(1));
    assert_eq!(client.client.object_count(), 0);
    assert!(!client.errors.is_empty());
}

/// A static object whose package is still loading opens its channel once
/// the load finishes, with every update that arrived in the meantime
#[test]
fn static_object_binds_after_async_load() {
    let mut harness = TestHarness::new(1);
    let server_door = NetObject::new_static("Arena.Door", None, Door::default());
    let client_door = NetObject::new_static("Arena.Door", None, Door::default());
    harness.client(ConnectionId(1)).resolver.add_unloaded(&client_door);

    let guid = harness.server.add_object(&server_door).expect("door should be added");
    harness.step(0.1);
    server_door
        .with_mut(|door: &mut Door| door.open = true)
        .expect("door state");
    harness.step(0.1);

    let client = harness.client(ConnectionId(1));
    assert!(client.errors.is_empty(), "client errors: {:?}", client.errors);
    assert_eq!(client.resolver.requested(), ["Arena".to_string()]);
    assert!(client.client.object(guid).is_none());
    assert!(!client.take_events().has::<SpawnEvent>());

    client.resolver.finish_loads();
    harness.tick_clients();

    let client = harness.client(ConnectionId(1));
    let bound = client.client.object(guid).expect("door bound after loading");
    assert!(Rc::ptr_eq(&bound, &client_door));
    assert_eq!(client_door.with(|door: &Door| door.open), Some(true));
    let mut events = client.take_events();
    let spawned: Vec<_> = events.read::<SpawnEvent>().map(|(guid, _)| guid).collect();
    assert_eq!(spawned, vec![guid]);

    server_door
        .with_mut(|door: &mut Door| door.open = false)
        .expect("door state");
    harness.step(0.1);
    assert_eq!(client_door.with(|door: &Door| door.open), Some(false));
    assert!(harness.client(ConnectionId(1)).errors.is_empty());
}

/// Removing a static object closes open channels, connections without one
/// get a destroy record instead
#[test]
fn static_destroy_reaches_every_connection() {
    let mut harness = TestHarness::new(2);
    harness
        .server
        .set_viewers(ConnectionId(2), vec![far_viewer(ConnectionId(2))])
        .expect("connection is known");
    let server_door = NetObject::new_static("Arena.Door", None, Door::default());
    for index in 1..=2 {
        let door = NetObject::new_static("Arena.Door", None, Door::default());
        harness.client(ConnectionId(index)).resolver.add_loaded(&door);
    }
    let guid = harness.server.add_object(&server_door).expect("door should be added");
    harness.step(0.1);
    assert!(harness.server.has_channel(&server_door, ConnectionId(1)));
    assert!(!harness.server.has_channel(&server_door, ConnectionId(2)));
    harness.client(ConnectionId(1)).take_events();

    harness
        .server
        .remove_object(&server_door, &mut harness.transport)
        .expect("door is replicated");
    harness.deliver();

    let mut events = harness.client(ConnectionId(1)).take_events();
    let despawned: Vec<_> = events.read::<DespawnEvent>().collect();
    assert_eq!(despawned, vec![(guid, CloseReason::Destroyed)]);
    assert!(!events.has::<DestroyEvent>());

    let mut events = harness.client(ConnectionId(2)).take_events();
    let destroyed: Vec<_> = events.read::<DestroyEvent>().collect();
    assert_eq!(destroyed, vec![(guid, "Arena.Door".to_string())]);
    assert_eq!(harness.server.object_count(), 0);
}

/// Dropping the last handle to an object ends its replication on the next tick
#[test]
fn dropped_object_is_destroyed() {
    let mut harness = TestHarness::new(1);
    let pickup = NetObject::new(Pickup::new(1, 10.0, 0.0));
    let guid = harness.server.add_object(&pickup).expect("pickup should be added");
    harness.step(0.1);
    assert_eq!(harness.client(ConnectionId(1)).client.object_count(), 1);
    harness.client(ConnectionId(1)).take_events();

    drop(pickup);
    harness.step(0.1);

    assert_eq!(harness.server.object_count(), 0);
    let client = harness.client(ConnectionId(1));
    assert_eq!(client.client.object_count(), 0);
    let mut events = client.take_events();
    let despawned: Vec<_> = events.read::<DespawnEvent>().collect();
    assert_eq!(despawned, vec![(guid, CloseReason::Destroyed)]);
}

/// A reference to an object the client doesn't have yet stays unmapped and
/// is patched once that object arrives
#[test]
fn reference_resolves_when_target_arrives() {
    let mut harness = TestHarness::new(1);
    let pickup = NetObject::new(Pickup::new(5, 50_000.0, 0.0));
    let pickup_guid = harness.server.add_object(&pickup).expect("pickup should be added");
    let mut state = Pawn::new(100);
    state.target = ObjectValue::from_object(&pickup);
    let pawn = NetObject::new(state);
    let pawn_guid = harness.server.add_object(&pawn).expect("pawn should be added");
    harness.step(0.1);

    let client = harness.client(ConnectionId(1));
    assert!(client.client.object(pickup_guid).is_none());
    assert!(client.client.has_unmapped(pawn_guid));
    let target = client.with_object(pawn_guid, |pawn: &Pawn| pawn.target.get().is_none());
    assert_eq!(target, Some(true));

    harness
        .server
        .force_relevant_next_update(&pickup)
        .expect("pickup is replicated");
    harness.step(0.1);

    let client = harness.client(ConnectionId(1));
    assert!(!client.client.has_unmapped(pawn_guid));
    let local_pickup = client.client.object(pickup_guid).expect("pickup arrived");
    let target = client
        .with_object(pawn_guid, |pawn: &Pawn| pawn.target.get())
        .expect("pawn exists")
        .expect("target resolved");
    assert!(Rc::ptr_eq(&target, &local_pickup));
}

/// Removing a connection forgets its channels without touching the others
#[test]
fn removed_connection_releases_channels() {
    let mut harness = TestHarness::new(2);
    let pawn = NetObject::new(Pawn::new(100));
    harness.server.add_object(&pawn).expect("pawn should be added");
    harness.step(0.1);

    harness
        .server
        .remove_connection(ConnectionId(1), &mut harness.transport)
        .expect("connection is known");
    assert!(!harness.server.has_connection(ConnectionId(1)));
    assert!(!harness.server.has_channel(&pawn, ConnectionId(1)));
    assert!(harness.server.has_channel(&pawn, ConnectionId(2)));

    pawn.with_mut(|pawn: &mut Pawn| pawn.health = 3).expect("pawn state");
    let stats = harness.step(0.1);
    assert_eq!(stats.replicated, 1);
}

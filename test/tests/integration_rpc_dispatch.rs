// Integration tests for remote function calls in both directions

use std::rc::Rc;

use replicore_client::{ClientError, RpcEvent as ClientRpcEvent};
use replicore_server::{RpcEvent, ServerError};
use replicore_shared::{ConnectionId, NetObject, NetworkGuid, ObjectValue, RepValue, ReplicatorError};
use replicore_test::{Door, Pawn, TestHarness};

fn owned_pawn(harness: &mut TestHarness, owner: ConnectionId) -> (Rc<NetObject>, NetworkGuid) {
    let pawn = NetObject::new(Pawn::new(100));
    pawn.set_owner(Some(owner));
    let guid = harness.server.add_object(&pawn).expect("pawn should be added");
    harness.step(0.1);
    (pawn, guid)
}

/// A client function runs on the owning client only
#[test]
fn client_function_reaches_owner() {
    let mut harness = TestHarness::new(2);
    let (pawn, guid) = owned_pawn(&mut harness, ConnectionId(2));

    harness
        .server
        .call_remote_function(&pawn, "ClientHit", vec![RepValue::Int(-5)], &mut harness.transport)
        .expect("call should be sent");
    harness.deliver();

    let owner_calls = harness
        .client(ConnectionId(2))
        .with_object(guid, |pawn: &Pawn| pawn.calls.clone())
        .expect("owner has the pawn");
    assert_eq!(owner_calls, vec![(Pawn::CLIENT_HIT, vec![RepValue::Int(-5)])]);
    let other_calls = harness
        .client(ConnectionId(1))
        .with_object(guid, |pawn: &Pawn| pawn.calls.len());
    assert_eq!(other_calls, Some(0));

    let mut events = harness.client(ConnectionId(2)).take_events();
    let executed: Vec<_> = events.read::<ClientRpcEvent>().collect();
    assert_eq!(executed, vec![(guid, "ClientHit")]);
}

#[test]
fn client_function_needs_owner() {
    let mut harness = TestHarness::new(1);
    let pawn = NetObject::new(Pawn::new(100));
    harness.server.add_object(&pawn).expect("pawn should be added");
    harness.step(0.1);

    let result =
        harness
            .server
            .call_remote_function(&pawn, "ClientHit", vec![RepValue::Int(1)], &mut harness.transport);
    assert!(matches!(result, Err(ServerError::NoOwner { .. })));
}

/// Arguments are checked against the declared parameters before anything
/// is sent
#[test]
fn mismatched_arguments_are_rejected() {
    let mut harness = TestHarness::new(1);
    let (pawn, _) = owned_pawn(&mut harness, ConnectionId(1));

    let result = harness.server.call_remote_function(
        &pawn,
        "ClientHit",
        vec![RepValue::String("five".to_string())],
        &mut harness.transport,
    );
    assert!(result.is_err());
    assert_eq!(harness.transport.bunch_count(), 0);
}

/// The owner may call server functions, other clients may not
#[test]
fn server_function_from_owner_only() {
    let mut harness = TestHarness::new(2);
    let (pawn, guid) = owned_pawn(&mut harness, ConnectionId(1));

    let owner = harness.client(ConnectionId(1));
    let object = owner.client.object(guid).expect("owner has the pawn");
    owner
        .client
        .call_remote_function(&object, "ServerFire", vec![RepValue::UInt(7)], &mut owner.transport)
        .expect("owner may call");
    harness.deliver_to_server();

    let mut events = harness.server.take_events();
    let calls: Vec<_> = events.read::<RpcEvent>().collect();
    assert_eq!(calls, vec![(ConnectionId(1), guid, "ServerFire")]);
    let fired = pawn.with(|pawn: &Pawn| pawn.calls.clone()).expect("pawn state");
    assert_eq!(fired, vec![(Pawn::SERVER_FIRE, vec![RepValue::UInt(7)])]);
    assert!(harness.server_errors.is_empty());

    let other = harness.client(ConnectionId(2));
    let object = other.client.object(guid).expect("the pawn is visible to everyone");
    let result =
        other
            .client
            .call_remote_function(&object, "ServerFire", vec![RepValue::UInt(7)], &mut other.transport);
    assert!(matches!(
        result,
        Err(ClientError::Replicator(ReplicatorError::NotOwner { .. }))
    ));
    assert_eq!(other.transport.bunch_count(), 0);
}

/// Unreliable multicasts ride along with the next update, capped per function
#[test]
fn multicast_is_throttled_per_update() {
    let mut harness = TestHarness::new(2);
    let pawn = NetObject::new(Pawn::new(100));
    let guid = harness.server.add_object(&pawn).expect("pawn should be added");
    harness.step(0.1);

    for effect in 0..3 {
        harness
            .server
            .call_remote_function(
                &pawn,
                "MulticastEffect",
                vec![RepValue::UInt(effect)],
                &mut harness.transport,
            )
            .expect("multicast should be queued");
    }
    assert_eq!(harness.transport.bunch_count(), 0, "multicasts wait for the update");
    harness.step(0.1);

    for connection in [ConnectionId(1), ConnectionId(2)] {
        let calls = harness
            .client(connection)
            .with_object(guid, |pawn: &Pawn| pawn.calls.clone())
            .expect("pawn should exist on the client");
        assert_eq!(
            calls,
            vec![
                (Pawn::MULTICAST_EFFECT, vec![RepValue::UInt(0)]),
                (Pawn::MULTICAST_EFFECT, vec![RepValue::UInt(1)]),
            ]
        );
    }

    // the cap resets with every update
    harness
        .server
        .call_remote_function(&pawn, "MulticastEffect", vec![RepValue::UInt(9)], &mut harness.transport)
        .expect("multicast should be queued");
    harness.step(0.1);
    let count = harness
        .client(ConnectionId(1))
        .with_object(guid, |pawn: &Pawn| pawn.calls.len());
    assert_eq!(count, Some(3));
}

/// A reliable call referencing an object the client is still loading waits
/// for it, and later calls wait behind it
#[test]
fn calls_wait_for_referenced_objects_in_order() {
    let mut harness = TestHarness::new(1);
    let (pawn, guid) = owned_pawn(&mut harness, ConnectionId(1));
    let server_door = NetObject::new_static("Arena.Door", None, Door::default());
    let client_door = NetObject::new_static("Arena.Door", None, Door::default());
    harness.client(ConnectionId(1)).resolver.add_unloaded(&client_door);

    harness
        .server
        .call_remote_function(
            &pawn,
            "ClientFocus",
            vec![RepValue::Object(ObjectValue::from_object(&server_door))],
            &mut harness.transport,
        )
        .expect("call should be sent");
    harness
        .server
        .call_remote_function(&pawn, "ClientHit", vec![RepValue::Int(5)], &mut harness.transport)
        .expect("call should be sent");
    harness.deliver();
    harness.tick_clients();

    let client = harness.client(ConnectionId(1));
    assert_eq!(client.client.pending_rpc_count(guid), 2);
    assert_eq!(client.resolver.requested(), ["Arena".to_string()]);
    let calls = client.with_object(guid, |pawn: &Pawn| pawn.calls.len());
    assert_eq!(calls, Some(0));

    client.resolver.finish_loads();
    harness.tick_clients();

    let client = harness.client(ConnectionId(1));
    assert_eq!(client.client.pending_rpc_count(guid), 0);
    let (names, focus) = client
        .with_object(guid, |pawn: &Pawn| (pawn.call_names(), pawn.calls[0].1.clone()))
        .expect("pawn should exist on the client");
    assert_eq!(names, vec!["ClientFocus", "ClientHit"]);
    match focus.as_slice() {
        [RepValue::Object(target)] => {
            let target = target.get().expect("the door resolved");
            assert!(Rc::ptr_eq(&target, &client_door));
        }
        other => panic!("unexpected arguments {:?}", other),
    }

    let mut events = client.take_events();
    let executed: Vec<_> = events.read::<ClientRpcEvent>().map(|(_, name)| name).collect();
    assert_eq!(executed, vec!["ClientFocus", "ClientHit"]);
}

/// A call waiting on an object that turns out to be missing from its
/// package is dropped, and the call queued behind it runs
#[test]
fn call_waiting_on_broken_reference_is_dropped() {
    let mut harness = TestHarness::new(1);
    let (pawn, guid) = owned_pawn(&mut harness, ConnectionId(1));
    let server_door = NetObject::new_static("Arena.Door", None, Door::default());
    let other_door = NetObject::new_static("Arena.Gate", None, Door::default());
    harness.client(ConnectionId(1)).resolver.add_unloaded(&other_door);

    harness
        .server
        .call_remote_function(
            &pawn,
            "ClientFocus",
            vec![RepValue::Object(ObjectValue::from_object(&server_door))],
            &mut harness.transport,
        )
        .expect("call should be sent");
    harness
        .server
        .call_remote_function(&pawn, "ClientHit", vec![RepValue::Int(3)], &mut harness.transport)
        .expect("call should be sent");
    harness.deliver();
    harness.tick_clients();

    let client = harness.client(ConnectionId(1));
    assert_eq!(client.client.pending_rpc_count(guid), 2);
    client.take_events();

    client.resolver.finish_loads();
    harness.tick_clients();

    let client = harness.client(ConnectionId(1));
    assert_eq!(client.client.pending_rpc_count(guid), 0);
    assert!(!client.client.has_unmapped(guid));
    let names = client
        .with_object(guid, |pawn: &Pawn| pawn.call_names())
        .expect("pawn should exist on the client");
    assert_eq!(names, vec!["ClientHit"]);

    let mut events = client.take_events();
    let executed: Vec<_> = events.read::<ClientRpcEvent>().map(|(_, name)| name).collect();
    assert_eq!(executed, vec!["ClientHit"]);
}

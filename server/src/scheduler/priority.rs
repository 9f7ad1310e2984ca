use replicore_shared::{ConnectionId, NetContext, NetObject, ObjectId, Viewer};

/// Priorities are compared as 16.16 fixed point
const PRIORITY_SCALE: f64 = 65536.0;

/// An object one connection may replicate this tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PrioritizedObject {
    pub object_id: ObjectId,
    pub priority: i64,
    pub relevant: bool,
}

pub(crate) fn fixed_priority(priority: f32) -> i64 {
    (f64::from(priority) * PRIORITY_SCALE).round() as i64
}

/// Highest priority first, equal priorities keep their gather order
pub(crate) fn sort_by_priority(list: &mut [PrioritizedObject]) {
    list.sort_by(|a, b| b.priority.cmp(&a.priority));
}

/// Relevant if any of the connection's viewers can see it
pub(crate) fn is_relevant(object: &NetObject, connection: ConnectionId, viewers: &[Viewer]) -> bool {
    let settings = object.settings();
    let context = NetContext {
        settings: &settings,
        owned_by_viewer: object.owner() == Some(connection),
        waiting_time: 0.0,
    };
    let state = object.state();
    viewers
        .iter()
        .any(|viewer| state.is_net_relevant_for(viewer, &context))
}

/// Best priority across the connection's viewers
pub(crate) fn priority(
    object: &NetObject,
    connection: ConnectionId,
    viewers: &[Viewer],
    waiting_time: f32,
) -> i64 {
    let settings = object.settings();
    let context = NetContext {
        settings: &settings,
        owned_by_viewer: object.owner() == Some(connection),
        waiting_time,
    };
    let state = object.state();
    viewers
        .iter()
        .map(|viewer| fixed_priority(state.net_priority(viewer, &context)))
        .max()
        .unwrap_or(0)
}

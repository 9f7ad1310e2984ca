use std::{rc::Rc, vec::IntoIter};

use replicore_shared::{CloseReason, NetObject, NetworkGuid};

use crate::ClientError;

pub struct ClientEvents {
    spawns: Vec<(NetworkGuid, Rc<NetObject>)>,
    despawns: Vec<(NetworkGuid, CloseReason)>,
    destroys: Vec<(NetworkGuid, String)>,
    updates: Vec<(NetworkGuid, &'static str)>,
    rpcs: Vec<(NetworkGuid, &'static str)>,
    errors: Vec<ClientError>,
    empty: bool,
}

impl ClientEvents {
    pub(crate) fn new() -> Self {
        Self {
            spawns: Vec::new(),
            despawns: Vec::new(),
            destroys: Vec::new(),
            updates: Vec::new(),
            rpcs: Vec::new(),
            errors: Vec::new(),
            empty: true,
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: ClientEvent>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: ClientEvent>(&self) -> bool {
        V::has(self)
    }

    // Crate-public

    pub(crate) fn push_spawn(&mut self, guid: NetworkGuid, object: Rc<NetObject>) {
        self.spawns.push((guid, object));
        self.empty = false;
    }

    pub(crate) fn push_despawn(&mut self, guid: NetworkGuid, reason: CloseReason) {
        self.despawns.push((guid, reason));
        self.empty = false;
    }

    pub(crate) fn push_destroy(&mut self, guid: NetworkGuid, path: String) {
        self.destroys.push((guid, path));
        self.empty = false;
    }

    pub(crate) fn push_update(&mut self, guid: NetworkGuid, field: &'static str) {
        self.updates.push((guid, field));
        self.empty = false;
    }

    pub(crate) fn push_rpc(&mut self, guid: NetworkGuid, function: &'static str) {
        self.rpcs.push((guid, function));
        self.empty = false;
    }

    pub(crate) fn push_error(&mut self, error: ClientError) {
        self.errors.push(error);
        self.empty = false;
    }
}

impl Default for ClientEvents {
    fn default() -> Self {
        Self::new()
    }
}

// Event Trait
pub trait ClientEvent {
    type Iter;

    fn iter(events: &mut ClientEvents) -> Self::Iter;

    fn has(events: &ClientEvents) -> bool;
}

// Spawn Event
pub struct SpawnEvent;
impl ClientEvent for SpawnEvent {
    type Iter = IntoIter<(NetworkGuid, Rc<NetObject>)>;

    fn iter(events: &mut ClientEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.spawns);
        IntoIterator::into_iter(list)
    }

    fn has(events: &ClientEvents) -> bool {
        !events.spawns.is_empty()
    }
}

// Despawn Event
pub struct DespawnEvent;
impl ClientEvent for DespawnEvent {
    type Iter = IntoIter<(NetworkGuid, CloseReason)>;

    fn iter(events: &mut ClientEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.despawns);
        IntoIterator::into_iter(list)
    }

    fn has(events: &ClientEvents) -> bool {
        !events.despawns.is_empty()
    }
}

// Destroy Event, a static object the server destroyed while this client had
// no channel open for it
pub struct DestroyEvent;
impl ClientEvent for DestroyEvent {
    type Iter = IntoIter<(NetworkGuid, String)>;

    fn iter(events: &mut ClientEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.destroys);
        IntoIterator::into_iter(list)
    }

    fn has(events: &ClientEvents) -> bool {
        !events.destroys.is_empty()
    }
}

// Update Event, one per changed field
pub struct UpdateEvent;
impl ClientEvent for UpdateEvent {
    type Iter = IntoIter<(NetworkGuid, &'static str)>;

    fn iter(events: &mut ClientEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.updates);
        IntoIterator::into_iter(list)
    }

    fn has(events: &ClientEvents) -> bool {
        !events.updates.is_empty()
    }
}

// Rpc Event, a client or multicast function executed locally
pub struct RpcEvent;
impl ClientEvent for RpcEvent {
    type Iter = IntoIter<(NetworkGuid, &'static str)>;

    fn iter(events: &mut ClientEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.rpcs);
        IntoIterator::into_iter(list)
    }

    fn has(events: &ClientEvents) -> bool {
        !events.rpcs.is_empty()
    }
}

// Error Event
pub struct ErrorEvent;
impl ClientEvent for ErrorEvent {
    type Iter = IntoIter<ClientError>;

    fn iter(events: &mut ClientEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.errors);
        IntoIterator::into_iter(list)
    }

    fn has(events: &ClientEvents) -> bool {
        !events.errors.is_empty()
    }
}

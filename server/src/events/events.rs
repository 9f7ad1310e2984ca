use std::vec::IntoIter;

use replicore_shared::{ConnectionId, NetworkGuid};

use crate::ServerError;

pub struct ServerEvents {
    errors: Vec<(ConnectionId, ServerError)>,
    disconnections: Vec<ConnectionId>,
    rpcs: Vec<(ConnectionId, NetworkGuid, &'static str)>,
    empty: bool,
}

impl ServerEvents {
    pub(crate) fn new() -> Self {
        Self {
            errors: Vec::new(),
            disconnections: Vec::new(),
            rpcs: Vec::new(),
            empty: true,
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: ServerEvent>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: ServerEvent>(&self) -> bool {
        V::has(self)
    }

    // Crate-public

    pub(crate) fn push_error(&mut self, connection: ConnectionId, error: ServerError) {
        self.errors.push((connection, error));
        self.empty = false;
    }

    pub(crate) fn push_disconnection(&mut self, connection: ConnectionId) {
        self.disconnections.push(connection);
        self.empty = false;
    }

    pub(crate) fn push_rpc(&mut self, connection: ConnectionId, guid: NetworkGuid, function: &'static str) {
        self.rpcs.push((connection, guid, function));
        self.empty = false;
    }
}

impl Default for ServerEvents {
    fn default() -> Self {
        Self::new()
    }
}

// Event Trait
pub trait ServerEvent {
    type Iter;

    fn iter(events: &mut ServerEvents) -> Self::Iter;

    fn has(events: &ServerEvents) -> bool;
}

// Error Event
pub struct ErrorEvent;
impl ServerEvent for ErrorEvent {
    type Iter = IntoIter<(ConnectionId, ServerError)>;

    fn iter(events: &mut ServerEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.errors);
        IntoIterator::into_iter(list)
    }

    fn has(events: &ServerEvents) -> bool {
        !events.errors.is_empty()
    }
}

// Disconnect Event, a connection closed after a fatal error
pub struct DisconnectEvent;
impl ServerEvent for DisconnectEvent {
    type Iter = IntoIter<ConnectionId>;

    fn iter(events: &mut ServerEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.disconnections);
        IntoIterator::into_iter(list)
    }

    fn has(events: &ServerEvents) -> bool {
        !events.disconnections.is_empty()
    }
}

// Rpc Event, a server function executed on behalf of a connection
pub struct RpcEvent;
impl ServerEvent for RpcEvent {
    type Iter = IntoIter<(ConnectionId, NetworkGuid, &'static str)>;

    fn iter(events: &mut ServerEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.rpcs);
        IntoIterator::into_iter(list)
    }

    fn has(events: &ServerEvents) -> bool {
        !events.rpcs.is_empty()
    }
}

use thiserror::Error;

use replicore_shared::{
    ChannelHandle, ClassError, ConnectionId, GuidCacheError, LayoutError, NetworkGuid,
    ReplicatorError, SerdeErr, TransportError,
};

/// Errors raised by the replication server.
///
/// Protocol errors coming out of a connection's data close that connection
/// and are also reported through `ErrorEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// No connection with this id was added
    #[error("Connection {connection:?} is not known to the server")]
    UnknownConnection { connection: ConnectionId },

    /// The object was never added with `add_object`, or was already removed
    #[error("Object {class_name} is not replicated by this server")]
    UnknownObject { class_name: &'static str },

    /// Data arrived on a channel the connection doesn't have open
    #[error("Channel {channel:?} is not open on connection {connection:?}")]
    UnknownChannel {
        connection: ConnectionId,
        channel: ChannelHandle,
    },

    /// A bunch named a different object than the channel it arrived on
    #[error("Bunch for GUID {found} arrived on the channel of GUID {expected}")]
    GuidMismatch {
        expected: NetworkGuid,
        found: NetworkGuid,
    },

    /// A client function was called on an object nobody owns
    #[error("Function {function} of {class_name} needs an owning connection")]
    NoOwner {
        class_name: &'static str,
        function: String,
    },

    /// The connection has too much unacknowledged reliable data
    #[error("Connection {connection:?} has {bytes_in_flight} reliable bytes in flight, the limit is {limit}")]
    ReliableBufferOverflow {
        connection: ConnectionId,
        bytes_in_flight: usize,
        limit: usize,
    },

    #[error("Class error: {0}")]
    Class(#[from] ClassError),

    #[error("GUID cache error: {0}")]
    Guid(#[from] GuidCacheError),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Replicator error: {0}")]
    Replicator(#[from] ReplicatorError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serde error: {0}")]
    Serde(#[from] SerdeErr),
}

impl ServerError {
    /// Whether the error means the connection can't continue
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServerError::GuidMismatch { .. }
                | ServerError::ReliableBufferOverflow { .. }
                | ServerError::Replicator(_)
                | ServerError::Serde(_)
                | ServerError::Transport(TransportError::ReliableBufferOverflow { .. })
        )
    }
}

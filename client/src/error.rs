use thiserror::Error;

use replicore_shared::{
    ChannelHandle, ClassError, GuidCacheError, LayoutError, NetworkGuid, ReplicatorError,
    SerdeErr, TransportError,
};

/// Errors raised by the replication client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Data arrived on a channel which was never opened
    #[error("Channel {channel:?} is not open")]
    UnknownChannel { channel: ChannelHandle },

    /// A bunch named a different object than the channel it arrived on
    #[error("Bunch for GUID {found} arrived on the channel of GUID {expected}")]
    GuidMismatch {
        expected: NetworkGuid,
        found: NetworkGuid,
    },

    /// A channel opened for a static object this side can't find
    #[error("Static object {guid} could not be resolved")]
    UnresolvedStatic { guid: NetworkGuid },

    /// The object has no open channel to call functions through
    #[error("Object {class_name} is not replicated to this client")]
    NotReplicated { class_name: &'static str },

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

impl ClientError {
    /// Whether the error means the server's stream can't be trusted anymore
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::GuidMismatch { .. }
                | ClientError::Replicator(_)
                | ClientError::Serde(_)
                | ClientError::Class(_)
        )
    }
}

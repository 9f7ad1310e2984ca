use thiserror::Error;

use crate::ConnectionId;

/// Errors reported by the channel layer a replicator writes into
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The reliable send buffer for the connection is exhausted; ordered delivery can no longer be guaranteed
    #[error("Reliable buffer overflow on connection {connection:?}: {bytes_in_flight} bytes in flight exceeds the limit of {limit}")]
    ReliableBufferOverflow {
        connection: ConnectionId,
        bytes_in_flight: usize,
        limit: usize,
    },

    /// The channel was closed before the send
    #[error("Channel {channel} on connection {connection:?} is closed")]
    ChannelClosed {
        connection: ConnectionId,
        channel: u32,
    },

    /// The connection itself is gone
    #[error("Connection {connection:?} is closed")]
    ConnectionClosed { connection: ConnectionId },
}

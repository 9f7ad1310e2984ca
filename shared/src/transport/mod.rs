mod error;

pub use error::TransportError;

use crate::{ConnectionId, NetworkGuid, PacketIdRange};

/// Handle of an open per-object channel on one connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The object was destroyed on the authority
    Destroyed,
    /// The object stopped being relevant to the connection
    NotRelevant,
    /// A protocol error was detected on the channel
    Error,
    /// The connection was removed
    Disconnected,
}

/// The ordered per-object byte stream replicators write into. Packet framing,
/// reliability and reassembly live behind this trait.
///
/// Acknowledgement and loss notifications for the packets returned from
/// `send` are delivered back in packet order via `received_ack` and
/// `received_nak` on the replication server or client.
pub trait ReplicationTransport {
    fn open_channel(
        &mut self,
        connection: ConnectionId,
        guid: NetworkGuid,
    ) -> Result<ChannelHandle, TransportError>;

    fn close_channel(&mut self, connection: ConnectionId, channel: ChannelHandle, reason: CloseReason);

    fn send(
        &mut self,
        connection: ConnectionId,
        channel: ChannelHandle,
        bytes: Vec<u8>,
        reliable: bool,
    ) -> Result<PacketIdRange, TransportError>;

    /// Sends connection-level data not bound to any object channel. Always reliable.
    fn send_control(
        &mut self,
        connection: ConnectionId,
        bytes: Vec<u8>,
    ) -> Result<PacketIdRange, TransportError>;

    /// Backpressure for a single channel
    fn is_ready(&self, connection: ConnectionId, channel: ChannelHandle) -> bool;

    /// Backpressure for the whole connection
    fn is_connection_ready(&self, connection: ConnectionId) -> bool;
}

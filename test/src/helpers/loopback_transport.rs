use std::collections::{HashSet, VecDeque};

use replicore_shared::{
    ChannelHandle, CloseReason, ConnectionId, NetworkGuid, PacketId, PacketIdRange,
    ReplicationTransport, TransportError,
};

/// Something one side handed to its transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outgoing {
    Open {
        connection: ConnectionId,
        channel: ChannelHandle,
        guid: NetworkGuid,
    },
    Close {
        connection: ConnectionId,
        channel: ChannelHandle,
        reason: CloseReason,
    },
    Bunch {
        connection: ConnectionId,
        channel: ChannelHandle,
        bytes: Vec<u8>,
        reliable: bool,
        packet_id: PacketId,
    },
    Control {
        connection: ConnectionId,
        bytes: Vec<u8>,
        packet_id: PacketId,
    },
}

impl Outgoing {
    pub fn connection(&self) -> ConnectionId {
        match self {
            Outgoing::Open { connection, .. }
            | Outgoing::Close { connection, .. }
            | Outgoing::Bunch { connection, .. }
            | Outgoing::Control { connection, .. } => *connection,
        }
    }
}

/// An in-memory transport putting every send into its own packet. Delivery
/// is driven by the test through `drain`.
pub struct LoopbackTransport {
    outgoing: VecDeque<Outgoing>,
    next_channel: u32,
    next_packet: PacketId,
    saturated: HashSet<ConnectionId>,
    blocked: HashSet<ChannelHandle>,
    closed: HashSet<ConnectionId>,
    failing: HashSet<ConnectionId>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            outgoing: VecDeque::new(),
            next_channel: 1,
            next_packet: 1,
            saturated: HashSet::new(),
            blocked: HashSet::new(),
            closed: HashSet::new(),
            failing: HashSet::new(),
        }
    }

    pub fn drain(&mut self) -> Vec<Outgoing> {
        self.outgoing.drain(..).collect()
    }

    pub fn pending(&self) -> &VecDeque<Outgoing> {
        &self.outgoing
    }

    pub fn bunch_count(&self) -> usize {
        self.outgoing
            .iter()
            .filter(|outgoing| matches!(outgoing, Outgoing::Bunch { .. }))
            .count()
    }

    /// Makes `is_connection_ready` report backpressure
    pub fn set_saturated(&mut self, connection: ConnectionId, saturated: bool) {
        if saturated {
            self.saturated.insert(connection);
        } else {
            self.saturated.remove(&connection);
        }
    }

    pub fn set_blocked(&mut self, channel: ChannelHandle, blocked: bool) {
        if blocked {
            self.blocked.insert(channel);
        } else {
            self.blocked.remove(&channel);
        }
    }

    /// Every later send on the connection fails
    pub fn close_connection(&mut self, connection: ConnectionId) {
        self.closed.insert(connection);
    }

    /// While set, sends on the connection's channels are refused as if the
    /// channel had gone away, everything else keeps working
    pub fn set_failing(&mut self, connection: ConnectionId, failing: bool) {
        if failing {
            self.failing.insert(connection);
        } else {
            self.failing.remove(&connection);
        }
    }

    fn next_packet(&mut self) -> PacketIdRange {
        let packet_id = self.next_packet;
        self.next_packet += 1;
        PacketIdRange::single(packet_id)
    }

    fn check_open(&self, connection: ConnectionId) -> Result<(), TransportError> {
        if self.closed.contains(&connection) {
            Err(TransportError::ConnectionClosed { connection })
        } else {
            Ok(())
        }
    }
}

impl ReplicationTransport for LoopbackTransport {
    fn open_channel(
        &mut self,
        connection: ConnectionId,
        guid: NetworkGuid,
    ) -> Result<ChannelHandle, TransportError> {
        self.check_open(connection)?;
        let channel = ChannelHandle(self.next_channel);
        self.next_channel += 1;
        self.outgoing.push_back(Outgoing::Open {
            connection,
            channel,
            guid,
        });
        Ok(channel)
    }

    fn close_channel(&mut self, connection: ConnectionId, channel: ChannelHandle, reason: CloseReason) {
        self.outgoing.push_back(Outgoing::Close {
            connection,
            channel,
            reason,
        });
    }

    fn send(
        &mut self,
        connection: ConnectionId,
        channel: ChannelHandle,
        bytes: Vec<u8>,
        reliable: bool,
    ) -> Result<PacketIdRange, TransportError> {
        self.check_open(connection)?;
        if self.failing.contains(&connection) {
            return Err(TransportError::ChannelClosed {
                connection,
                channel: channel.0,
            });
        }
        let packet_range = self.next_packet();
        self.outgoing.push_back(Outgoing::Bunch {
            connection,
            channel,
            bytes,
            reliable,
            packet_id: packet_range.first,
        });
        Ok(packet_range)
    }

    fn send_control(
        &mut self,
        connection: ConnectionId,
        bytes: Vec<u8>,
    ) -> Result<PacketIdRange, TransportError> {
        self.check_open(connection)?;
        let packet_range = self.next_packet();
        self.outgoing.push_back(Outgoing::Control {
            connection,
            bytes,
            packet_id: packet_range.first,
        });
        Ok(packet_range)
    }

    fn is_ready(&self, _connection: ConnectionId, channel: ChannelHandle) -> bool {
        !self.blocked.contains(&channel)
    }

    fn is_connection_ready(&self, connection: ConnectionId) -> bool {
        !self.saturated.contains(&connection)
    }
}

/// Identifies an outgoing packet. Assigned by the transport, increasing
/// monotonically per connection.
pub type PacketId = u32;

/// Server tick counter used to share comparison work between connections
pub type FrameId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

/// The inclusive range of packets a single bunch was split across
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PacketIdRange {
    pub first: PacketId,
    pub last: PacketId,
}

impl PacketIdRange {
    pub fn new(first: PacketId, last: PacketId) -> Self {
        Self { first, last }
    }

    pub fn single(packet_id: PacketId) -> Self {
        Self::new(packet_id, packet_id)
    }

    pub fn contains(&self, packet_id: PacketId) -> bool {
        self.first <= packet_id && packet_id <= self.last
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    Server,
    Client,
}

impl HostType {
    pub fn invert(self) -> Self {
        match self {
            HostType::Server => HostType::Client,
            HostType::Client => HostType::Server,
        }
    }

    pub fn is_authority(&self) -> bool {
        *self == HostType::Server
    }
}

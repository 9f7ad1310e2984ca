use std::collections::{HashMap, VecDeque};

use log::warn;

use replicore_shared::{
    ChannelHandle, CloseReason, ConnectionId, ExportTracker, GuidCache, ObjectId, OutgoingBunch,
    PacketId, PacketIdRange, ReplicationTransport, Viewer,
};

use crate::{connection::object_channel::ObjectChannel, ServerError};

/// Everything the server tracks for one remote connection
pub(crate) struct Connection {
    pub id: ConnectionId,
    viewers: Vec<Viewer>,
    pub channels: HashMap<ObjectId, ObjectChannel>,
    channel_objects: HashMap<ChannelHandle, ObjectId>,
    pub exports: ExportTracker,
    reliable_in_flight: VecDeque<(PacketIdRange, usize)>,
    reliable_bytes_in_flight: usize,
}

impl Connection {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            viewers: Vec::new(),
            channels: HashMap::new(),
            channel_objects: HashMap::new(),
            exports: ExportTracker::new(),
            reliable_in_flight: VecDeque::new(),
            reliable_bytes_in_flight: 0,
        }
    }

    /// The connection's points of view; a connection without viewers sees
    /// the world from the origin
    pub fn viewers(&self) -> Vec<Viewer> {
        if self.viewers.is_empty() {
            vec![Viewer::at_origin(self.id)]
        } else {
            self.viewers.clone()
        }
    }

    pub fn set_viewers(&mut self, viewers: Vec<Viewer>) {
        self.viewers = viewers;
    }

    pub fn add_channel(&mut self, object_id: ObjectId, channel: ObjectChannel) {
        self.channel_objects.insert(channel.handle, object_id);
        self.channels.insert(object_id, channel);
    }

    pub fn remove_channel(&mut self, object_id: &ObjectId) -> Option<ObjectChannel> {
        let channel = self.channels.remove(object_id)?;
        self.channel_objects.remove(&channel.handle);
        Some(channel)
    }

    pub fn object_for_channel(&self, handle: &ChannelHandle) -> Option<ObjectId> {
        self.channel_objects.get(handle).copied()
    }

    pub fn reliable_bytes_in_flight(&self) -> usize {
        self.reliable_bytes_in_flight
    }

    /// Hands a bunch to the transport and stamps the replicator and export
    /// tracker with the packets it went out on. Returns the bytes sent.
    pub fn send_bunch(
        &mut self,
        object_id: &ObjectId,
        bunch: OutgoingBunch,
        transport: &mut dyn ReplicationTransport,
        max_reliable_bytes_in_flight: usize,
    ) -> Result<usize, ServerError> {
        let Some(channel) = self.channels.get_mut(object_id) else {
            self.exports.discard_pending();
            return Ok(0);
        };
        let length = bunch.bytes.len();
        let reliable = bunch.reliable;

        let packet_range = match transport.send(self.id, channel.handle, bunch.bytes, reliable) {
            Ok(packet_range) => packet_range,
            Err(error) => {
                channel.replicator.send_failed();
                self.exports.discard_pending();
                return Err(error.into());
            }
        };
        channel.replicator.post_send_bunch(packet_range);
        self.exports.post_send(packet_range);

        if reliable {
            self.reliable_in_flight.push_back((packet_range, length));
            self.reliable_bytes_in_flight += length;
            if self.reliable_bytes_in_flight > max_reliable_bytes_in_flight {
                return Err(ServerError::ReliableBufferOverflow {
                    connection: self.id,
                    bytes_in_flight: self.reliable_bytes_in_flight,
                    limit: max_reliable_bytes_in_flight,
                });
            }
        }
        Ok(length)
    }

    pub fn received_ack(&mut self, packet_id: PacketId) {
        for channel in self.channels.values_mut() {
            channel.replicator.received_ack(packet_id);
        }
        self.exports.received_ack(packet_id);

        while let Some((packet_range, length)) = self.reliable_in_flight.front() {
            if packet_range.last > packet_id {
                break;
            }
            self.reliable_bytes_in_flight = self.reliable_bytes_in_flight.saturating_sub(*length);
            self.reliable_in_flight.pop_front();
        }
    }

    /// Returns the objects which have data to resend
    pub fn received_nak(&mut self, packet_id: PacketId) -> Vec<ObjectId> {
        let mut resend = Vec::new();
        for (object_id, channel) in self.channels.iter_mut() {
            if channel.replicator.received_nak(packet_id) {
                channel.dormant = false;
                resend.push(*object_id);
            }
        }
        self.exports.received_nak(packet_id);
        resend
    }

    /// Closes every channel and releases the references their replicators held
    pub fn close_all(
        &mut self,
        transport: Option<&mut dyn ReplicationTransport>,
        guid_cache: &mut GuidCache,
        reason: CloseReason,
    ) {
        let channels: Vec<(ObjectId, ObjectChannel)> = self.channels.drain().collect();
        self.channel_objects.clear();
        let mut transport = transport;
        for (_, mut channel) in channels {
            if let Some(transport) = transport.as_deref_mut() {
                transport.close_channel(self.id, channel.handle, reason);
            }
            channel.replicator.stop_replicating(guid_cache);
        }
        if !self.reliable_in_flight.is_empty() {
            warn!(
                "connection {:?} closed with {} reliable bytes unacknowledged",
                self.id, self.reliable_bytes_in_flight
            );
        }
        self.reliable_in_flight.clear();
        self.reliable_bytes_in_flight = 0;
    }
}

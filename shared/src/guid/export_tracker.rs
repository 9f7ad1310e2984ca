use std::collections::{HashSet, VecDeque};

use crate::{NetworkGuid, PacketId, PacketIdRange};

/// Per-connection record of which static GUID exports the peer has
/// acknowledged. An export is repeated until a packet carrying it is acked.
#[derive(Default)]
pub struct ExportTracker {
    acked: HashSet<NetworkGuid>,
    /// Exported into the bunch being built, not yet handed to the transport
    pending: Vec<NetworkGuid>,
    in_flight: VecDeque<(PacketIdRange, Vec<NetworkGuid>)>,
}

impl ExportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn needs_export(&self, guid: &NetworkGuid) -> bool {
        !self.acked.contains(guid)
    }

    pub fn is_acked(&self, guid: &NetworkGuid) -> bool {
        self.acked.contains(guid)
    }

    pub(crate) fn note_exported(&mut self, guid: NetworkGuid) {
        if !self.pending.contains(&guid) {
            self.pending.push(guid);
        }
    }

    /// The bunch was sent on `packet_range`
    pub fn post_send(&mut self, packet_range: PacketIdRange) {
        if !self.pending.is_empty() {
            self.in_flight
                .push_back((packet_range, std::mem::take(&mut self.pending)));
        }
    }

    /// The bunch was never sent
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    pub fn received_ack(&mut self, packet_id: PacketId) {
        while let Some((range, _)) = self.in_flight.front() {
            if range.last > packet_id {
                break;
            }
            if let Some((_, guids)) = self.in_flight.pop_front() {
                self.acked.extend(guids);
            }
        }
    }

    pub fn received_nak(&mut self, packet_id: PacketId) {
        self.in_flight.retain(|(range, _)| !range.contains(packet_id));
    }
}

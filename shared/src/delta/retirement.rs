use std::collections::{BTreeSet, VecDeque};

use crate::{delta::net_delta::DeltaBaseState, PacketId, PacketIdRange};

struct DeltaRecord {
    packet_range: Option<PacketIdRange>,
    reliable: bool,
    /// Base state in effect before this send
    base_before: Option<DeltaBaseState>,
}

/// Per-connection retirement of one custom delta field.
///
/// Keeps the most recent base state sent to the connection and, for every
/// send still in flight, the base state it replaced, so a lost packet can
/// rewind to what the receiver actually has.
#[derive(Default)]
pub struct DeltaRetirement {
    records: VecDeque<DeltaRecord>,
    recent: Option<DeltaBaseState>,
}

impl DeltaRetirement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base state the next delta is written against
    pub fn recent(&self) -> Option<&DeltaBaseState> {
        self.recent.as_ref()
    }

    /// Swaps in the base state produced by a successful serialize
    pub fn record_send(&mut self, new_base: DeltaBaseState, reliable: bool) {
        let base_before = self.recent.replace(new_base);
        self.records.push_back(DeltaRecord {
            packet_range: None,
            reliable,
            base_before,
        });
    }

    pub fn post_send(&mut self, packet_range: PacketIdRange) {
        for record in self.records.iter_mut() {
            if record.packet_range.is_none() {
                record.packet_range = Some(packet_range);
            }
        }
    }

    /// Undoes the sends which never made it to the transport
    pub fn send_failed(&mut self) {
        let Some(unsent) = self.records.iter().position(|record| record.packet_range.is_none()) else {
            return;
        };
        let mut dropped = self.records.split_off(unsent);
        self.recent = dropped.pop_front().and_then(|record| record.base_before);
    }

    pub fn received_ack(&mut self, packet_id: PacketId) {
        while let Some(record) = self.records.front() {
            match record.packet_range {
                Some(range) if range.last <= packet_id => {
                    self.records.pop_front();
                }
                _ => break,
            }
        }
    }

    /// Rewinds to the base state from before the unreliable send lost in
    /// `packet_id`. Later sends were built on top of it and are forgotten too,
    /// but the items they carried may have arrived: those stay in the base
    /// under an unknown key, so they are either sent again or deleted.
    /// Returns whether anything was rolled back.
    pub fn rollback_to(&mut self, packet_id: PacketId) -> bool {
        let lost = self.records.iter().position(|record| {
            !record.reliable
                && record
                    .packet_range
                    .map(|range| range.contains(packet_id))
                    .unwrap_or(false)
        });
        let Some(lost) = lost else {
            return false;
        };
        let mut dropped = self.records.split_off(lost);
        let mut restored = dropped.pop_front().and_then(|record| record.base_before);

        let maybe_delivered: BTreeSet<u32> = dropped
            .iter()
            .filter_map(|record| record.base_before.as_ref())
            .chain(self.recent.as_ref())
            .flat_map(|base| base.item_keys.keys().copied())
            .collect();
        if !maybe_delivered.is_empty() {
            let base = restored.get_or_insert_with(|| DeltaBaseState {
                array_key: DeltaBaseState::UNKNOWN_KEY,
                item_keys: Default::default(),
            });
            for id in maybe_delivered {
                base.item_keys.entry(id).or_insert(DeltaBaseState::UNKNOWN_KEY);
            }
        }
        self.recent = restored;
        true
    }

    /// Nothing sent is still waiting for an acknowledgement
    pub fn is_retired(&self) -> bool {
        self.records.is_empty()
    }
}

use std::collections::VecDeque;

use log::debug;

use crate::{
    changelist::{merge_changelists, ChangelistManager},
    layout::RepFlags,
    PacketId, PacketIdRange,
};

struct SentChangelist {
    changed: Vec<usize>,
    packet_range: Option<PacketIdRange>,
    reliable: bool,
    resend: bool,
}

/// What one connection has been sent of one object's plain fields, and what
/// of that is still unacknowledged
pub struct RepState {
    history: VecDeque<SentChangelist>,
    max_history: usize,
    last_changelist_index: u32,
    last_compare_index: u32,
    num_naks: u32,
    open_acked: bool,
    /// Unreliable sends made before the channel open was acknowledged
    pre_open_ack_history: Vec<Vec<usize>>,
    /// Changed fields held back because their condition was inactive
    inactive_changes: Vec<usize>,
}

impl RepState {
    pub fn new(max_history: usize) -> Self {
        Self {
            history: VecDeque::new(),
            max_history: max_history.max(1),
            last_changelist_index: 0,
            last_compare_index: 0,
            num_naks: 0,
            open_acked: false,
            pre_open_ack_history: Vec::new(),
            inactive_changes: Vec::new(),
        }
    }

    /// Gathers every field which has to go out in the next send for `flags`:
    /// unconsumed changelists, lost sends, sends which may have raced the
    /// channel open, and held-back fields whose condition became active.
    pub fn collect_changes(&mut self, manager: &ChangelistManager, flags: &RepFlags) -> Vec<usize> {
        let mut changed = Vec::new();

        if self.last_changelist_index < manager.history_end() {
            changed = manager.changes_since(self.last_changelist_index);
        }
        self.last_changelist_index = manager.history_end();
        self.last_compare_index = manager.compare_index();

        if self.history.len() >= self.max_history {
            // history full, fold everything outstanding into this send
            debug!(
                "{}: send history full, resending {} outstanding changelists",
                manager.layout().class_name(),
                self.history.len()
            );
            for sent in self.history.drain(..) {
                changed = merge_changelists(&changed, &sent.changed);
            }
            self.num_naks = 0;
        } else {
            let mut merged = 0;
            self.history.retain(|sent| {
                if sent.resend {
                    changed = merge_changelists(&changed, &sent.changed);
                    merged += 1;
                    false
                } else {
                    true
                }
            });
            self.num_naks = self.num_naks.saturating_sub(merged);
        }

        if self.open_acked && !self.pre_open_ack_history.is_empty() {
            for sent in self.pre_open_ack_history.drain(..) {
                changed = merge_changelists(&changed, &sent);
            }
        }

        let held_back = std::mem::take(&mut self.inactive_changes);
        changed = merge_changelists(&changed, &held_back);

        let layout = manager.layout();
        let mut active = Vec::with_capacity(changed.len());
        for index in changed {
            let is_active = layout
                .field(index)
                .map(|field| field.condition.is_active(flags))
                .unwrap_or(false);
            if is_active {
                active.push(index);
            } else {
                self.inactive_changes.push(index);
            }
        }
        active
    }

    /// Records a send which hasn't been given a packet range yet
    pub fn record_sent(&mut self, changed: Vec<usize>, reliable: bool) {
        if changed.is_empty() {
            return;
        }
        if !self.open_acked && !reliable {
            self.pre_open_ack_history.push(changed.clone());
        }
        self.history.push_back(SentChangelist {
            changed,
            packet_range: None,
            reliable,
            resend: false,
        });
    }

    /// Stamps unstamped sends with the packets they went out on
    pub fn post_replicate(&mut self, packet_range: PacketIdRange) {
        for sent in self.history.iter_mut() {
            if sent.packet_range.is_none() {
                sent.packet_range = Some(packet_range);
            }
        }
    }

    /// The transport refused the last send: everything recorded for it goes
    /// out again with the next one
    pub fn send_failed(&mut self) {
        for sent in self.history.iter_mut() {
            if sent.packet_range.is_none() && !sent.resend {
                sent.resend = true;
                self.num_naks += 1;
            }
        }
    }

    /// Marks unreliable sends carried by a lost packet for resending.
    /// Reliable sends are redelivered by the channel.
    pub fn received_nak(&mut self, packet_id: PacketId) -> bool {
        let mut marked = false;
        for sent in self.history.iter_mut() {
            if sent.reliable || sent.resend {
                continue;
            }
            if sent
                .packet_range
                .map(|range| range.contains(packet_id))
                .unwrap_or(false)
            {
                sent.resend = true;
                self.num_naks += 1;
                marked = true;
            }
        }
        marked
    }

    /// Retires sends whose packets have all been delivered. Notifications
    /// arrive in packet order, so an ack covers every earlier packet.
    pub fn received_ack(&mut self, packet_id: PacketId) {
        self.history.retain(|sent| {
            let delivered = !sent.resend
                && sent
                    .packet_range
                    .map(|range| range.last <= packet_id)
                    .unwrap_or(false);
            !delivered
        });
    }

    pub fn set_open_acked(&mut self) {
        self.open_acked = true;
    }

    pub fn open_acked(&self) -> bool {
        self.open_acked
    }

    /// Everything sent has been acknowledged and nothing waits for a resend
    pub fn all_acked(&self) -> bool {
        self.history.is_empty()
            && self.num_naks == 0
            && self.open_acked
            && self.pre_open_ack_history.is_empty()
    }

    pub fn last_changelist_index(&self) -> u32 {
        self.last_changelist_index
    }

    pub fn last_compare_index(&self) -> u32 {
        self.last_compare_index
    }

    pub fn num_naks(&self) -> u32 {
        self.num_naks
    }

    pub fn outstanding_sends(&self) -> usize {
        self.history.len()
    }
}

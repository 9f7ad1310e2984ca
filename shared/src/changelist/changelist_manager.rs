use std::{collections::VecDeque, rc::Rc};

use log::trace;

use crate::{
    changelist::merge_changelists,
    layout::{RepFlags, RepLayout, RepValue},
    object::replicate::Replicate,
    FrameId, ReplicationConfig,
};

/// Shadow state and changelist history of one replicated object, shared by
/// every connection replicating it.
///
/// Changelist indices grow monotonically. A connection remembers the index
/// it consumed up to and asks for everything after it.
pub struct ChangelistManager {
    layout: Rc<RepLayout>,
    shadow: Vec<RepValue>,
    history: VecDeque<Vec<usize>>,
    history_start: u32,
    history_end: u32,
    /// Union of every changelist trimmed from the front of the history
    baseline: Vec<usize>,
    compare_index: u32,
    last_replication_frame: Option<FrameId>,
    compare_count: u64,
    max_history: usize,
    share_shadow_state: bool,
}

impl ChangelistManager {
    pub fn new(layout: Rc<RepLayout>, config: &ReplicationConfig) -> Self {
        let shadow = layout.init_shadow();
        Self {
            layout,
            shadow,
            history: VecDeque::new(),
            history_start: 0,
            history_end: 0,
            baseline: Vec::new(),
            compare_index: 0,
            last_replication_frame: None,
            compare_count: 0,
            max_history: config.max_change_history.max(2),
            share_shadow_state: config.share_shadow_state,
        }
    }

    /// Refreshes the shadow state from `object`.
    ///
    /// Within one frame only the first caller pays for the comparison; later
    /// callers which already replicated this object at least once reuse its
    /// result. Initial replication and `force_compare` always compare.
    /// Returns whether a comparison ran.
    pub fn update(
        &mut self,
        object: &dyn Replicate,
        frame: FrameId,
        last_compare_index: u32,
        flags: &RepFlags,
        force_compare: bool,
    ) -> bool {
        if !force_compare
            && self.share_shadow_state
            && !flags.net_initial
            && last_compare_index > 0
            && self.last_replication_frame == Some(frame)
        {
            return false;
        }

        self.last_replication_frame = Some(frame);
        self.compare_index += 1;
        self.compare_count += 1;

        let changed = self.layout.compare(&mut self.shadow, object);
        if !changed.is_empty() {
            trace!(
                "{}: {} fields changed at compare {}",
                self.layout.class_name(),
                changed.len(),
                self.compare_index
            );
            self.push_changelist(changed);
        }
        true
    }

    fn push_changelist(&mut self, changed: Vec<usize>) {
        if self.history.len() >= self.max_history {
            // merge the oldest entry forward, a late joiner still needs it
            if let Some(oldest) = self.history.pop_front() {
                match self.history.front_mut() {
                    Some(next) => *next = merge_changelists(&oldest, next),
                    None => self.baseline = merge_changelists(&self.baseline, &oldest),
                }
                self.history_start += 1;
            }
        }
        self.history.push_back(changed);
        self.history_end += 1;
    }

    /// Every field changed in changelists at or after `changelist_index`.
    /// Indices older than the retained history also get the trimmed baseline.
    pub fn changes_since(&self, changelist_index: u32) -> Vec<usize> {
        let mut output = if changelist_index < self.history_start {
            self.baseline.clone()
        } else {
            Vec::new()
        };
        for (offset, changed) in self.history.iter().enumerate() {
            if self.history_start + offset as u32 >= changelist_index {
                output = merge_changelists(&output, changed);
            }
        }
        output
    }

    /// Folds changelists every connection has consumed into the baseline
    pub fn trim_history(&mut self, consumed_up_to: u32) {
        while self.history_start < consumed_up_to.min(self.history_end) {
            let Some(oldest) = self.history.pop_front() else {
                break;
            };
            self.baseline = merge_changelists(&self.baseline, &oldest);
            self.history_start += 1;
        }
    }

    pub fn layout(&self) -> &Rc<RepLayout> {
        &self.layout
    }

    pub fn shadow(&self) -> &[RepValue] {
        &self.shadow
    }

    pub fn history_start(&self) -> u32 {
        self.history_start
    }

    pub fn history_end(&self) -> u32 {
        self.history_end
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn compare_index(&self) -> u32 {
        self.compare_index
    }

    /// Number of comparisons actually performed
    pub fn compare_count(&self) -> u64 {
        self.compare_count
    }
}

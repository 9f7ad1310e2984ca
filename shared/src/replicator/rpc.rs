use std::collections::HashMap;

use log::warn;

use crate::{layout::RepValue, NetworkGuid};

/// A received call held back until the objects it references resolve
#[derive(Clone, Debug)]
pub struct PendingRpc {
    pub function: usize,
    pub args: Vec<RepValue>,
    /// GUIDs the call is still waiting on
    pub unresolved: Vec<NetworkGuid>,
    /// Reliable call with delaying enabled. Otherwise the call only waits
    /// for the calls queued before it and runs with nulls.
    pub wait_for_references: bool,
}

impl PendingRpc {
    pub fn new(function: usize, args: Vec<RepValue>, wait_for_references: bool) -> Self {
        let mut unresolved = Vec::new();
        for arg in &args {
            arg.collect_unresolved(&mut unresolved);
        }
        Self {
            function,
            args,
            unresolved,
            wait_for_references,
        }
    }

    pub(crate) fn refresh_unresolved(&mut self) {
        self.unresolved.clear();
        for arg in &self.args {
            arg.collect_unresolved(&mut self.unresolved);
        }
    }
}

/// An unreliable multicast call waiting for the next property update
#[derive(Clone, Debug)]
pub(crate) struct QueuedRpc {
    pub function: usize,
    pub args: Vec<RepValue>,
}

/// Caps how many calls to one function go out with a single net update
#[derive(Default)]
pub(crate) struct RpcThrottle {
    counts: HashMap<usize, u32>,
}

impl RpcThrottle {
    /// Counts a call, returns false when it exceeds `limit`
    pub fn admit(&mut self, function: usize, function_name: &str, limit: u32) -> bool {
        let count = self.counts.entry(function).or_insert(0);
        if *count >= limit {
            warn!(
                "dropping call to {}: more than {} calls in one net update",
                function_name, limit
            );
            return false;
        }
        *count += 1;
        true
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }
}

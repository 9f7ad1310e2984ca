use std::default::Default;

/// Contains Config properties shared by both sides of a replication link
#[derive(Clone, Debug)]
pub struct ReplicationConfig {
    /// Maximum number of calls to one unreliable multicast function which
    /// are flushed with a single property update. Extra calls are dropped.
    pub max_rpcs_per_net_update: u32,
    /// Whether reliable remote calls referencing unresolved objects are held
    /// back until those objects resolve
    pub delay_unmapped_rpcs: bool,
    /// Whether connections replicating in the same frame share a single
    /// shadow state comparison
    pub share_shadow_state: bool,
    /// Number of changelists each object keeps before merging the oldest forward
    pub max_change_history: usize,
    /// Number of unacknowledged sends tracked per connection before they are
    /// collapsed into the next send
    pub max_rep_state_history: usize,
    /// Whether unresolved static references may trigger asynchronous loads
    pub allow_async_loading: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            max_rpcs_per_net_update: 2,
            delay_unmapped_rpcs: true,
            share_shadow_state: true,
            max_change_history: 64,
            max_rep_state_history: 32,
            allow_async_loading: true,
        }
    }
}

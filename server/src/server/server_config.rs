use std::default::Default;

use replicore_shared::ReplicationConfig;

/// Contains Config properties which will be used by the Server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Settings shared with the client side of every connection
    pub replication: ReplicationConfig,
    /// Seconds an open channel stays relevant after its object stopped being
    /// relevant to the connection
    pub relevant_timeout: f32,
    /// Seconds between relevancy re-evaluations of an already open channel
    pub relevancy_recheck_interval: f32,
    /// Waiting time used to prioritise objects which have no channel yet
    pub spawn_priority_seconds: f32,
    /// Whether idle objects are throttled from their net update frequency
    /// down towards their minimum net update frequency
    pub adaptive_net_update_frequency: bool,
    /// Bytes a connection may be sent in a single tick before it counts as
    /// saturated
    pub max_bytes_per_connection_tick: usize,
    /// Unacknowledged reliable bytes a connection may have outstanding.
    /// Exceeding it closes the connection, as ordered delivery can no longer
    /// be guaranteed.
    pub max_reliable_bytes_in_flight: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            replication: ReplicationConfig::default(),
            relevant_timeout: 5.0,
            relevancy_recheck_interval: 1.0,
            spawn_priority_seconds: 1.0,
            adaptive_net_update_frequency: true,
            max_bytes_per_connection_tick: 16 * 1024,
            max_reliable_bytes_in_flight: 256 * 1024,
        }
    }
}

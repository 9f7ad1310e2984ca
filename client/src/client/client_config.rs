use std::default::Default;

use replicore_shared::{ConnectionId, ReplicationConfig};

/// Contains Config properties which will be used by a Client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Settings shared with the server
    pub replication: ReplicationConfig,
    /// Id under which the transport knows the server connection
    pub server_connection: ConnectionId,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            replication: ReplicationConfig::default(),
            server_connection: ConnectionId(0),
        }
    }
}

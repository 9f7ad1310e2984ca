mod client_config;
pub use client_config::ClientConfig;

mod remote_object;
pub(crate) use remote_object::RemoteObject;

mod replication_client;
pub use replication_client::ReplicationClient;

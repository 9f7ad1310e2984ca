mod replication_server;
pub use replication_server::ReplicationServer;

mod server_config;
pub use server_config::ServerConfig;

mod tick_stats;
pub use tick_stats::ServerTickStats;

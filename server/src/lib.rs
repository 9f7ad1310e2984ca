//! # Replicore Server
//! The authority side of object replication: assigns network identities,
//! keeps one channel per relevant object for every connection, and spends
//! each connection's per-tick budget on the highest priority objects.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use replicore_shared::{
        BitReader, BitWrite, BitWriter, ChannelHandle, CloseReason, ConnectionId, NetDormancy,
        NetObject, NetVector, NetworkGuid, PacketId, PacketIdRange, Protocol, RepValue,
        ReplicationConfig, ReplicationTransport, Serde, SerdeErr, TransportError, Viewer,
    };
}

mod connection;
mod error;
mod events;
mod scheduler;
mod server;
mod world;

pub use error::ServerError;
pub use events::{DisconnectEvent, ErrorEvent, RpcEvent, ServerEvent, ServerEvents};
pub use server::{ReplicationServer, ServerConfig, ServerTickStats};

//! # Replicore Client
//! The receiving side of object replication: spawns the objects the server
//! opens channels for, applies their property updates and dispatches remote
//! calls in order.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use replicore_shared::{
        BitReader, BitWrite, BitWriter, ChannelHandle, CloseReason, ConnectionId, NetObject,
        NetworkGuid, ObjectResolver, PacketIdRange, Protocol, RepValue, ReplicationConfig,
        ReplicationTransport, Serde, SerdeErr, TransportError,
    };
}

mod client;
mod error;
mod events;

pub use client::{ClientConfig, ReplicationClient};
pub use error::ClientError;
pub use events::{
    ClientEvent, ClientEvents, DespawnEvent, DestroyEvent, ErrorEvent, RpcEvent, SpawnEvent, UpdateEvent,
};

//! # Replicore Shared
//! Object identity, replication layouts, changelists and per-connection
//! replicators shared by replicore-server & replicore-client.

#![deny(unstable_features, unused_import_braces)]

pub use replicore_serde::{
    BitCounter, BitReader, BitWrite, BitWriter, ConstBitLength, OwnedBitReader, Serde, SerdeErr,
    SerdeInteger, SignedInteger, SignedVariableInteger, UnsignedInteger, UnsignedVariableInteger,
};

mod changelist;
mod config;
mod control;
mod delta;
mod guid;
mod layout;
mod object;
mod protocol;
mod replicator;
mod transport;
mod types;

pub use changelist::{ChangelistManager, RepState};
pub use config::ReplicationConfig;
pub use control::DestroyRecord;
pub use delta::{DeltaBaseState, DeltaRetirement, FastArray, FastArrayItem, NetDeltaSerialize};
pub use guid::{
    package_name, ExportTracker, GuidCache, GuidCacheError, GuidExport, GuidFlags, GuidStatus,
    NetworkGuid, ObjectResolver, PackageMap, Resolution,
};
pub use layout::{
    check_value, class_checksum, field_checksum, function_checksum, read_value, write_value,
    FieldStrategy, LayoutCache, LayoutError, NoObjects, ObjectSerializer, ObjectValue,
    PropertyType, ReceivedField, RepCondition, RepField, RepFlags, RepFunction, RepLayout,
    RepValue,
};
pub use object::{
    class_kinds::{ClassKind, ClassKinds, ClassNetId},
    error::ClassError,
    net_object::{NetDormancy, NetObject, ReplicationSettings},
    object_id::ObjectId,
    replicate::{
        default_net_priority, default_net_relevancy, ClassDescription, FieldDescriptor,
        FunctionDescriptor, NetContext, Replicate, RpcKind,
    },
    viewer::{NetVector, Viewer},
};
pub use protocol::{Protocol, ProtocolError, ProtocolPlugin};
pub use replicator::{
    BunchHeader, ObjectReplicator, OpenHeader, OutgoingBunch, PendingRpc, ReceivedBunch,
    ReplicatorError,
};
pub use transport::{
    ChannelHandle, CloseReason, ReplicationTransport, TransportError,
};
pub use types::{ConnectionId, FrameId, HostType, PacketId, PacketIdRange};

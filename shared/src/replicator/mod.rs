mod bunch_header;
mod error;
mod object_replicator;
mod rpc;

pub use bunch_header::{BunchHeader, OpenHeader};
pub use error::ReplicatorError;
pub use object_replicator::{ObjectReplicator, OutgoingBunch, ReceivedBunch};
pub use rpc::PendingRpc;

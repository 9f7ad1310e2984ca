use thiserror::Error;

use replicore_serde::SerdeErr;

use crate::{layout::LayoutError, object::replicate::RpcKind, NetworkGuid};

/// Errors raised by an object replicator.
///
/// Everything raised while reading a bunch is a protocol error and is fatal
/// to the channel the bunch arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicatorError {
    /// The replicator isn't bound to a channel
    #[error("Replicator for {class_name} is not bound to a channel")]
    NotReplicating { class_name: &'static str },

    /// The replicated object has been dropped
    #[error("Object with GUID {guid} was destroyed while replicating")]
    ObjectDestroyed { guid: NetworkGuid },

    /// The authority received property data, peers may only send remote calls
    #[error("Received property {field} of {class_name} on the authority")]
    UnexpectedProperty {
        class_name: &'static str,
        field: String,
    },

    /// A field block addressed an index outside of both field tables
    #[error("Net index {index} is out of range, class {class_name} has {count}")]
    UnknownNetIndex {
        class_name: &'static str,
        index: usize,
        count: usize,
    },

    /// A plain field differs between the two sides and can't be skipped
    #[error("Field {field} of {class_name} is incompatible with the remote class")]
    IncompatibleField {
        class_name: &'static str,
        field: &'static str,
    },

    /// The object doesn't expose a custom delta field its layout declares
    #[error("{class_name} does not expose custom delta field {field}")]
    MissingDeltaField {
        class_name: &'static str,
        field: &'static str,
    },

    /// A remote call travelled in a direction its kind doesn't allow
    #[error("Function {function} ({kind:?}) can't be sent in this direction")]
    WrongRpcDirection { function: &'static str, kind: RpcKind },

    /// Only the owning connection may call server functions
    #[error("Function {function} may only be called by the owning connection")]
    NotOwner { function: &'static str },

    /// Field or argument layout error
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    /// Bit stream error
    #[error("Serde error: {0}")]
    Serde(#[from] SerdeErr),
}

use thiserror::Error;

use crate::NetworkGuid;

/// Errors that can occur while assigning or registering network GUIDs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuidCacheError {
    /// Only the authoritative side hands out GUIDs, only the receiving side
    /// accepts exported paths
    #[error("{operation} is not allowed on this side of the connection")]
    NotAuthority { operation: &'static str },

    /// The object already has a GUID
    #[error("object {object} already has GUID {guid}")]
    AlreadyAssigned { object: String, guid: NetworkGuid },

    /// A GUID was exported again with a different path
    #[error("GUID {guid} is registered as `{existing}`, peer exported it as `{requested}`")]
    PathConflict {
        guid: NetworkGuid,
        existing: String,
        requested: String,
    },

    /// `0` and `1` can't name an object
    #[error("GUID {guid} cannot be bound to an object")]
    InvalidGuid { guid: NetworkGuid },

    /// The object was never given a GUID and this side can't assign one
    #[error("object {object} has no network identity")]
    NoIdentity { object: String },
}

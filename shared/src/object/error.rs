use thiserror::Error;

/// Errors that can occur during class registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassError {
    /// Class not registered in the protocol
    #[error("Class not registered with Protocol. Must call `add_class()` during protocol initialization. Class: {class_name}")]
    ClassNotRegistered { class_name: &'static str },

    /// Net ID lookup failed
    #[error("Class net ID {net_id} not found in registry. The remote protocol registers classes the local protocol does not")]
    NetIdNotFound { net_id: u16 },
}

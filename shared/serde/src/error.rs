use thiserror::Error;

/// Errors raised while decoding a bit stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// The reader ran past the end of the available bits
    #[error("attempted to read {requested} bits with only {remaining} bits remaining")]
    OutOfBits { requested: u32, remaining: u32 },

    /// A decoded value is not valid for the target type
    #[error("invalid value while decoding {type_name}: {reason}")]
    InvalidValue {
        type_name: &'static str,
        reason: String,
    },

    /// A variable length integer did not terminate within 64 bits
    #[error("variable length integer exceeds 64 bits")]
    VarIntOverflow,
}

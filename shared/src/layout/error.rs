use thiserror::Error;

use replicore_serde::SerdeErr;

/// Errors raised while comparing, writing or reading replicated fields
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A value doesn't match the declared type of its field
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },

    /// A numeric value doesn't fit the declared width of its field
    #[error("Value {value} is out of range for {type_name}")]
    ValueOutOfRange { type_name: String, value: String },

    /// A field handle outside of the class's field table
    #[error("Field index {index} is out of range, class {class_name} has {count} fields")]
    UnknownField {
        class_name: &'static str,
        index: usize,
        count: usize,
    },

    /// Field handles must be strictly increasing within one block
    #[error("Field handle {handle} follows handle {previous} in class {class_name}")]
    HandleOutOfOrder {
        class_name: &'static str,
        previous: usize,
        handle: usize,
    },

    /// A custom delta field was addressed through the plain field block, or the reverse
    #[error("Field {field} of class {class_name} uses a different serialization strategy")]
    StrategyMismatch {
        class_name: &'static str,
        field: &'static str,
    },

    /// The class has no remote function with this name
    #[error("Class {class_name} has no remote function named {name}")]
    UnknownFunction {
        class_name: &'static str,
        name: String,
    },

    /// A remote call was made with the wrong number of arguments
    #[error("Function {function} expects {expected} arguments, {found} given")]
    ArgumentCount {
        function: &'static str,
        expected: usize,
        found: usize,
    },

    /// Bit stream error while reading a value
    #[error("Serde error: {0}")]
    Serde(#[from] SerdeErr),
}

mod checksum;
mod error;
mod layout_cache;
mod property_type;
mod rep_condition;
mod rep_layout;
mod rep_value;
mod value_serde;

pub use checksum::{class_checksum, field_checksum, function_checksum};
pub use error::LayoutError;
pub use layout_cache::LayoutCache;
pub use property_type::PropertyType;
pub use rep_condition::{RepCondition, RepFlags};
pub use rep_layout::{FieldStrategy, ReceivedField, RepField, RepFunction, RepLayout};
pub(crate) use rep_layout::FieldHandle;
pub use rep_value::{ObjectValue, RepValue};
pub use value_serde::{check_value, read_value, write_value, NoObjects, ObjectSerializer};

use crate::layout::rep_value::{ObjectValue, RepValue};

/// The network type of a replicated field or remote function parameter
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    /// Reference to another replicated object
    Object,
    Struct(Vec<PropertyType>),
    Array(Box<PropertyType>),
    /// A field which serializes its own delta, named by its wire type
    CustomDelta(&'static str),
}

impl PropertyType {
    pub fn array_of(element: PropertyType) -> Self {
        PropertyType::Array(Box::new(element))
    }

    pub fn is_custom_delta(&self) -> bool {
        matches!(self, PropertyType::CustomDelta(_))
    }

    /// The value a freshly constructed field holds; the baseline every
    /// changelist is relative to
    pub fn default_value(&self) -> RepValue {
        match self {
            PropertyType::Bool => RepValue::Bool(false),
            PropertyType::U8 | PropertyType::U16 | PropertyType::U32 | PropertyType::U64 => {
                RepValue::UInt(0)
            }
            PropertyType::I8 | PropertyType::I16 | PropertyType::I32 | PropertyType::I64 => {
                RepValue::Int(0)
            }
            PropertyType::F32 => RepValue::Float(0.0),
            PropertyType::F64 => RepValue::Double(0.0),
            PropertyType::String => RepValue::String(String::new()),
            PropertyType::Bytes => RepValue::Bytes(Vec::new()),
            PropertyType::Object => RepValue::Object(ObjectValue::null()),
            PropertyType::Struct(fields) => {
                RepValue::Struct(fields.iter().map(PropertyType::default_value).collect())
            }
            PropertyType::Array(_) => RepValue::Array(Vec::new()),
            PropertyType::CustomDelta(_) => RepValue::Delta,
        }
    }

    /// Stable textual form hashed into field checksums
    pub fn type_tag(&self) -> String {
        match self {
            PropertyType::Bool => "bool".to_string(),
            PropertyType::U8 => "u8".to_string(),
            PropertyType::U16 => "u16".to_string(),
            PropertyType::U32 => "u32".to_string(),
            PropertyType::U64 => "u64".to_string(),
            PropertyType::I8 => "i8".to_string(),
            PropertyType::I16 => "i16".to_string(),
            PropertyType::I32 => "i32".to_string(),
            PropertyType::I64 => "i64".to_string(),
            PropertyType::F32 => "f32".to_string(),
            PropertyType::F64 => "f64".to_string(),
            PropertyType::String => "string".to_string(),
            PropertyType::Bytes => "bytes".to_string(),
            PropertyType::Object => "object".to_string(),
            PropertyType::Struct(fields) => {
                let inner: Vec<String> = fields.iter().map(PropertyType::type_tag).collect();
                format!("struct({})", inner.join(","))
            }
            PropertyType::Array(element) => format!("array({})", element.type_tag()),
            PropertyType::CustomDelta(name) => format!("delta({})", name),
        }
    }
}

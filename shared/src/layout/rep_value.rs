use std::rc::{Rc, Weak};

use crate::{
    layout::error::LayoutError,
    object::{net_object::NetObject, object_id::ObjectId},
    NetworkGuid,
};

/// A reference to another replicated object held in a field or parameter.
///
/// On the authority it points at a live object; on the receiving side it may
/// carry only a GUID until that GUID resolves.
#[derive(Clone, Debug, Default)]
pub struct ObjectValue {
    guid: NetworkGuid,
    object: Option<Weak<NetObject>>,
    object_id: Option<ObjectId>,
}

impl ObjectValue {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn from_object(object: &Rc<NetObject>) -> Self {
        Self {
            guid: NetworkGuid::INVALID,
            object: Some(Rc::downgrade(object)),
            object_id: Some(object.id()),
        }
    }

    pub fn resolved(guid: NetworkGuid, object: &Rc<NetObject>) -> Self {
        Self {
            guid,
            object: Some(Rc::downgrade(object)),
            object_id: Some(object.id()),
        }
    }

    pub fn unresolved(guid: NetworkGuid) -> Self {
        Self {
            guid,
            object: None,
            object_id: None,
        }
    }

    pub fn get(&self) -> Option<Rc<NetObject>> {
        self.object.as_ref().and_then(Weak::upgrade)
    }

    pub fn guid(&self) -> NetworkGuid {
        self.guid
    }

    /// Holds a GUID which hasn't been mapped to a local object yet
    pub fn is_unresolved(&self) -> bool {
        self.object.is_none() && self.guid.is_valid()
    }

    pub fn is_null(&self) -> bool {
        self.get().is_none() && !self.is_unresolved()
    }

    fn identity(&self) -> Identity {
        if let Some(object) = self.get() {
            return Identity::Local(object.id());
        }
        if self.is_unresolved() {
            return Identity::Remote(self.guid);
        }
        Identity::Null
    }

    pub(crate) fn object_id(&self) -> Option<ObjectId> {
        self.object_id
    }
}

#[derive(PartialEq)]
enum Identity {
    Null,
    Local(ObjectId),
    Remote(NetworkGuid),
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

/// The value of one replicated field or parameter
#[derive(Clone, Debug)]
pub enum RepValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Object(ObjectValue),
    Struct(Vec<RepValue>),
    Array(Vec<RepValue>),
    /// Placeholder for fields which serialize their own delta
    Delta,
}

impl PartialEq for RepValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RepValue::Bool(a), RepValue::Bool(b)) => a == b,
            (RepValue::Int(a), RepValue::Int(b)) => a == b,
            (RepValue::UInt(a), RepValue::UInt(b)) => a == b,
            (RepValue::Float(a), RepValue::Float(b)) => a.to_bits() == b.to_bits(),
            (RepValue::Double(a), RepValue::Double(b)) => a.to_bits() == b.to_bits(),
            (RepValue::String(a), RepValue::String(b)) => a == b,
            (RepValue::Bytes(a), RepValue::Bytes(b)) => a == b,
            (RepValue::Object(a), RepValue::Object(b)) => a == b,
            (RepValue::Struct(a), RepValue::Struct(b)) => a == b,
            (RepValue::Array(a), RepValue::Array(b)) => a == b,
            (RepValue::Delta, RepValue::Delta) => true,
            _ => false,
        }
    }
}

impl RepValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            RepValue::Bool(_) => "bool",
            RepValue::Int(_) => "int",
            RepValue::UInt(_) => "uint",
            RepValue::Float(_) => "f32",
            RepValue::Double(_) => "f64",
            RepValue::String(_) => "string",
            RepValue::Bytes(_) => "bytes",
            RepValue::Object(_) => "object",
            RepValue::Struct(_) => "struct",
            RepValue::Array(_) => "array",
            RepValue::Delta => "delta",
        }
    }

    /// Any integer variant widened for range checks
    pub(crate) fn as_i128(&self) -> Option<i128> {
        match self {
            RepValue::Int(value) => Some(*value as i128),
            RepValue::UInt(value) => Some(*value as i128),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            RepValue::Object(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&[RepValue]> {
        match self {
            RepValue::Struct(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RepValue]> {
        match self {
            RepValue::Array(values) => Some(values),
            _ => None,
        }
    }

    /// GUIDs of every unresolved reference nested in this value
    pub fn collect_unresolved(&self, output: &mut Vec<NetworkGuid>) {
        match self {
            RepValue::Object(value) if value.is_unresolved() => output.push(value.guid()),
            RepValue::Struct(values) | RepValue::Array(values) => {
                for value in values {
                    value.collect_unresolved(output);
                }
            }
            _ => {}
        }
    }

    /// Offers every unresolved reference to `resolve`, which replaces it when
    /// it can. Returns whether anything was replaced.
    pub fn resolve_objects(&mut self, resolve: &mut dyn FnMut(&ObjectValue) -> Option<ObjectValue>) -> bool {
        match self {
            RepValue::Object(value) if value.is_unresolved() => match resolve(&*value) {
                Some(resolved) => {
                    *value = resolved;
                    true
                }
                None => false,
            },
            RepValue::Struct(values) | RepValue::Array(values) => {
                let mut changed = false;
                for value in values.iter_mut() {
                    changed |= value.resolve_objects(resolve);
                }
                changed
            }
            _ => false,
        }
    }
}

impl From<bool> for RepValue {
    fn from(value: bool) -> Self {
        RepValue::Bool(value)
    }
}

impl From<f32> for RepValue {
    fn from(value: f32) -> Self {
        RepValue::Float(value)
    }
}

impl From<f64> for RepValue {
    fn from(value: f64) -> Self {
        RepValue::Double(value)
    }
}

impl From<String> for RepValue {
    fn from(value: String) -> Self {
        RepValue::String(value)
    }
}

impl From<&str> for RepValue {
    fn from(value: &str) -> Self {
        RepValue::String(value.to_string())
    }
}

impl From<ObjectValue> for RepValue {
    fn from(value: ObjectValue) -> Self {
        RepValue::Object(value)
    }
}

macro_rules! impl_rep_value_int {
    ($variant:ident, $wide:ty, $($ty:ty),*) => {
        $(
            impl From<$ty> for RepValue {
                fn from(value: $ty) -> Self {
                    RepValue::$variant(<$wide>::from(value))
                }
            }

            impl TryFrom<&RepValue> for $ty {
                type Error = LayoutError;

                fn try_from(value: &RepValue) -> Result<Self, Self::Error> {
                    let Some(wide) = value.as_i128() else {
                        return Err(LayoutError::TypeMismatch {
                            expected: stringify!($ty).to_string(),
                            found: value.kind_name(),
                        });
                    };
                    <$ty>::try_from(wide).map_err(|_| LayoutError::ValueOutOfRange {
                        type_name: stringify!($ty).to_string(),
                        value: wide.to_string(),
                    })
                }
            }
        )*
    };
}

impl_rep_value_int!(Int, i64, i8, i16, i32, i64);
impl_rep_value_int!(UInt, u64, u8, u16, u32, u64);

macro_rules! impl_rep_value_extract {
    ($ty:ty, $variant:ident, $name:expr) => {
        impl TryFrom<&RepValue> for $ty {
            type Error = LayoutError;

            fn try_from(value: &RepValue) -> Result<Self, Self::Error> {
                match value {
                    RepValue::$variant(inner) => Ok(inner.clone()),
                    other => Err(LayoutError::TypeMismatch {
                        expected: $name.to_string(),
                        found: other.kind_name(),
                    }),
                }
            }
        }
    };
}

impl_rep_value_extract!(bool, Bool, "bool");
impl_rep_value_extract!(f32, Float, "f32");
impl_rep_value_extract!(f64, Double, "f64");
impl_rep_value_extract!(String, String, "string");
impl_rep_value_extract!(ObjectValue, Object, "object");

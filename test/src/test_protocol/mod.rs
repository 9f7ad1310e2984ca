//! Replicated classes shared by the integration tests

use std::any::Any;

use replicore_shared::{
    ClassDescription, FastArray, FieldDescriptor, FunctionDescriptor, LayoutError, NetDeltaSerialize,
    NetVector, ObjectValue, PropertyType, Protocol, RepCondition, RepValue, Replicate, RpcKind,
};

fn expect_int(value: RepValue) -> Result<i64, LayoutError> {
    match value {
        RepValue::Int(value) => Ok(value),
        other => Err(LayoutError::TypeMismatch {
            expected: "int".to_string(),
            found: other.kind_name(),
        }),
    }
}

fn expect_uint(value: RepValue) -> Result<u64, LayoutError> {
    match value {
        RepValue::UInt(value) => Ok(value),
        other => Err(LayoutError::TypeMismatch {
            expected: "uint".to_string(),
            found: other.kind_name(),
        }),
    }
}

fn expect_bool(value: RepValue) -> Result<bool, LayoutError> {
    match value {
        RepValue::Bool(value) => Ok(value),
        other => Err(LayoutError::TypeMismatch {
            expected: "bool".to_string(),
            found: other.kind_name(),
        }),
    }
}

fn unknown_field(class_name: &'static str, index: usize, count: usize) -> LayoutError {
    LayoutError::UnknownField {
        class_name,
        index,
        count,
    }
}

// Pawn

/// A player controlled object exercising every field strategy and call kind
#[derive(Default)]
pub struct Pawn {
    pub health: i32,
    pub name: String,
    pub location: (f32, f32, f32),
    pub ammo: u16,
    pub target: ObjectValue,
    pub inventory: FastArray<u16>,
    /// Fields whose notification ran, in order
    pub notified: Vec<usize>,
    /// Functions executed on this copy, in order
    pub calls: Vec<(usize, Vec<RepValue>)>,
}

impl Pawn {
    pub const HEALTH: usize = 0;
    pub const NAME: usize = 1;
    pub const LOCATION: usize = 2;
    pub const AMMO: usize = 3;
    pub const TARGET: usize = 4;
    pub const INVENTORY: usize = 5;

    pub const SERVER_FIRE: usize = 0;
    pub const CLIENT_HIT: usize = 1;
    pub const MULTICAST_EFFECT: usize = 2;
    pub const CLIENT_FOCUS: usize = 3;

    pub fn new(health: i32) -> Self {
        Self {
            health,
            ..Self::default()
        }
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.location = (x, y, z);
        self
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        let description = Self::describe();
        self.calls
            .iter()
            .map(|(function, _)| description.functions[*function].name)
            .collect()
    }
}

impl Replicate for Pawn {
    fn describe() -> ClassDescription {
        ClassDescription::new("Pawn")
            .field(FieldDescriptor::new("health", PropertyType::I32).notify())
            .field(FieldDescriptor::new("name", PropertyType::String))
            .field(FieldDescriptor::new(
                "location",
                PropertyType::Struct(vec![PropertyType::F32, PropertyType::F32, PropertyType::F32]),
            ))
            .field(FieldDescriptor::new("ammo", PropertyType::U16).condition(RepCondition::OwnerOnly))
            .field(FieldDescriptor::new("target", PropertyType::Object))
            .field(FieldDescriptor::new("inventory", PropertyType::CustomDelta("FastArray<u16>")))
            .function(
                FunctionDescriptor::new("ServerFire", RpcKind::Server)
                    .reliable()
                    .param(PropertyType::U32),
            )
            .function(
                FunctionDescriptor::new("ClientHit", RpcKind::Client)
                    .reliable()
                    .param(PropertyType::I32),
            )
            .function(FunctionDescriptor::new("MulticastEffect", RpcKind::Multicast).param(PropertyType::U8))
            .function(
                FunctionDescriptor::new("ClientFocus", RpcKind::Client)
                    .reliable()
                    .param(PropertyType::Object),
            )
    }

    fn read_field(&self, index: usize) -> RepValue {
        match index {
            Self::HEALTH => RepValue::Int(i64::from(self.health)),
            Self::NAME => RepValue::String(self.name.clone()),
            Self::LOCATION => RepValue::Struct(vec![
                RepValue::Float(self.location.0),
                RepValue::Float(self.location.1),
                RepValue::Float(self.location.2),
            ]),
            Self::AMMO => RepValue::UInt(u64::from(self.ammo)),
            Self::TARGET => RepValue::Object(self.target.clone()),
            _ => RepValue::Delta,
        }
    }

    fn write_field(&mut self, index: usize, value: RepValue) -> Result<(), LayoutError> {
        match (index, value) {
            (Self::HEALTH, value) => self.health = expect_int(value)? as i32,
            (Self::NAME, RepValue::String(name)) => self.name = name,
            (Self::LOCATION, RepValue::Struct(values)) => match values.as_slice() {
                [RepValue::Float(x), RepValue::Float(y), RepValue::Float(z)] => {
                    self.location = (*x, *y, *z)
                }
                _ => {
                    return Err(LayoutError::TypeMismatch {
                        expected: "struct(f32, f32, f32)".to_string(),
                        found: "struct",
                    })
                }
            },
            (Self::AMMO, value) => self.ammo = expect_uint(value)? as u16,
            (Self::TARGET, RepValue::Object(target)) => self.target = target,
            (index, value) if index < 5 => {
                return Err(LayoutError::TypeMismatch {
                    expected: format!("field {}", index),
                    found: value.kind_name(),
                })
            }
            (index, _) => return Err(unknown_field("Pawn", index, 6)),
        }
        Ok(())
    }

    fn delta_field(&self, index: usize) -> Option<&dyn NetDeltaSerialize> {
        match index {
            Self::INVENTORY => Some(&self.inventory),
            _ => None,
        }
    }

    fn delta_field_mut(&mut self, index: usize) -> Option<&mut dyn NetDeltaSerialize> {
        match index {
            Self::INVENTORY => Some(&mut self.inventory),
            _ => None,
        }
    }

    fn on_rep(&mut self, index: usize) {
        self.notified.push(index);
    }

    fn receive_rpc(&mut self, function: usize, args: Vec<RepValue>) {
        self.calls.push((function, args));
    }

    fn net_location(&self) -> Option<NetVector> {
        Some(NetVector::new(self.location.0, self.location.1, self.location.2))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// Door

/// A level object both sides find by path
#[derive(Default)]
pub struct Door {
    pub open: bool,
}

impl Replicate for Door {
    fn describe() -> ClassDescription {
        ClassDescription::new("Door").field(FieldDescriptor::new("open", PropertyType::Bool))
    }

    fn read_field(&self, _index: usize) -> RepValue {
        RepValue::Bool(self.open)
    }

    fn write_field(&mut self, index: usize, value: RepValue) -> Result<(), LayoutError> {
        if index != 0 {
            return Err(unknown_field("Door", index, 1));
        }
        self.open = expect_bool(value)?;
        Ok(())
    }

    fn net_location(&self) -> Option<NetVector> {
        Some(NetVector::new(0.0, 0.0, 0.0))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// Pickup

/// A world item with a single byte of state
#[derive(Default)]
pub struct Pickup {
    pub kind: u8,
    pub location: (f32, f32),
}

impl Pickup {
    pub fn new(kind: u8, x: f32, y: f32) -> Self {
        Self {
            kind,
            location: (x, y),
        }
    }
}

impl Replicate for Pickup {
    fn describe() -> ClassDescription {
        ClassDescription::new("Pickup").field(FieldDescriptor::new("kind", PropertyType::U8))
    }

    fn read_field(&self, _index: usize) -> RepValue {
        RepValue::UInt(u64::from(self.kind))
    }

    fn write_field(&mut self, index: usize, value: RepValue) -> Result<(), LayoutError> {
        if index != 0 {
            return Err(unknown_field("Pickup", index, 1));
        }
        self.kind = expect_uint(value)? as u8;
        Ok(())
    }

    fn net_location(&self) -> Option<NetVector> {
        Some(NetVector::new(self.location.0, self.location.1, 0.0))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn protocol() -> Protocol {
    Protocol::builder()
        .add_class::<Pawn>()
        .add_class::<Door>()
        .add_class::<Pickup>()
        .build()
}

use replicore_serde::{BitReader, BitWrite, Serde, SerdeErr, UnsignedVariableInteger};

use crate::layout::{
    error::LayoutError,
    property_type::PropertyType,
    rep_value::{ObjectValue, RepValue},
};

type Length = UnsignedVariableInteger<7>;

/// Writes and reads object references. Implemented by the per-connection
/// package map, which knows how GUIDs are exported and resolved.
pub trait ObjectSerializer {
    fn write_object(&mut self, value: &ObjectValue, writer: &mut dyn BitWrite);
    fn read_object(&mut self, reader: &mut BitReader) -> Result<ObjectValue, SerdeErr>;
}

fn mismatch(property_type: &PropertyType, value: &RepValue) -> LayoutError {
    LayoutError::TypeMismatch {
        expected: property_type.type_tag(),
        found: value.kind_name(),
    }
}

fn out_of_range(property_type: &PropertyType, value: i128) -> LayoutError {
    LayoutError::ValueOutOfRange {
        type_name: property_type.type_tag(),
        value: value.to_string(),
    }
}

fn integer_bits(property_type: &PropertyType, value: &RepValue) -> Result<u64, LayoutError> {
    let wide = value
        .as_i128()
        .ok_or_else(|| mismatch(property_type, value))?;
    let (min, max, bits): (i128, i128, u32) = match property_type {
        PropertyType::U8 => (0, u8::MAX as i128, 8),
        PropertyType::U16 => (0, u16::MAX as i128, 16),
        PropertyType::U32 => (0, u32::MAX as i128, 32),
        PropertyType::U64 => (0, u64::MAX as i128, 64),
        PropertyType::I8 => (i8::MIN as i128, i8::MAX as i128, 8),
        PropertyType::I16 => (i16::MIN as i128, i16::MAX as i128, 16),
        PropertyType::I32 => (i32::MIN as i128, i32::MAX as i128, 32),
        PropertyType::I64 => (i64::MIN as i128, i64::MAX as i128, 64),
        _ => return Err(mismatch(property_type, value)),
    };
    if wide < min || wide > max {
        return Err(out_of_range(property_type, wide));
    }
    // two's complement, truncated to the field width
    let mask: u128 = if bits == 64 { u64::MAX as u128 } else { (1u128 << bits) - 1 };
    Ok(((wide as u128) & mask) as u64)
}

/// Checks that `value` can be written as `property_type` without writing anything
pub fn check_value(property_type: &PropertyType, value: &RepValue) -> Result<(), LayoutError> {
    match (property_type, value) {
        (PropertyType::Bool, RepValue::Bool(_))
        | (PropertyType::F32, RepValue::Float(_))
        | (PropertyType::F64, RepValue::Double(_))
        | (PropertyType::String, RepValue::String(_))
        | (PropertyType::Bytes, RepValue::Bytes(_))
        | (PropertyType::Object, RepValue::Object(_)) => Ok(()),
        (
            PropertyType::U8
            | PropertyType::U16
            | PropertyType::U32
            | PropertyType::U64
            | PropertyType::I8
            | PropertyType::I16
            | PropertyType::I32
            | PropertyType::I64,
            _,
        ) => integer_bits(property_type, value).map(|_| ()),
        (PropertyType::Struct(types), RepValue::Struct(values)) => {
            if types.len() != values.len() {
                return Err(mismatch(property_type, value));
            }
            for (inner_type, inner_value) in types.iter().zip(values) {
                check_value(inner_type, inner_value)?;
            }
            Ok(())
        }
        (PropertyType::Array(element), RepValue::Array(values)) => {
            for inner_value in values {
                check_value(element, inner_value)?;
            }
            Ok(())
        }
        _ => Err(mismatch(property_type, value)),
    }
}

/// Writes a value which already passed `check_value`
fn write_checked(
    property_type: &PropertyType,
    value: &RepValue,
    writer: &mut dyn BitWrite,
    objects: &mut dyn ObjectSerializer,
) {
    match (property_type, value) {
        (PropertyType::Bool, RepValue::Bool(inner)) => writer.write_bit(*inner),
        (PropertyType::F32, RepValue::Float(inner)) => inner.ser(writer),
        (PropertyType::F64, RepValue::Double(inner)) => inner.ser(writer),
        (PropertyType::String, RepValue::String(inner)) => inner.ser(writer),
        (PropertyType::Bytes, RepValue::Bytes(inner)) => {
            Length::from_u64(inner.len() as u64).ser(writer);
            for byte in inner {
                writer.write_byte(*byte);
            }
        }
        (PropertyType::Object, RepValue::Object(inner)) => objects.write_object(inner, writer),
        (PropertyType::Struct(types), RepValue::Struct(values)) => {
            for (inner_type, inner_value) in types.iter().zip(values) {
                write_checked(inner_type, inner_value, writer, objects);
            }
        }
        (PropertyType::Array(element), RepValue::Array(values)) => {
            Length::from_u64(values.len() as u64).ser(writer);
            for inner_value in values {
                write_checked(element, inner_value, writer, objects);
            }
        }
        (integer_type, _) => {
            if let Ok(bits) = integer_bits(integer_type, value) {
                writer.write_bits(bits, integer_width(integer_type));
            }
        }
    }
}

fn integer_width(property_type: &PropertyType) -> u8 {
    match property_type {
        PropertyType::U8 | PropertyType::I8 => 8,
        PropertyType::U16 | PropertyType::I16 => 16,
        PropertyType::U32 | PropertyType::I32 => 32,
        _ => 64,
    }
}

pub fn write_value(
    property_type: &PropertyType,
    value: &RepValue,
    writer: &mut dyn BitWrite,
    objects: &mut dyn ObjectSerializer,
) -> Result<(), LayoutError> {
    check_value(property_type, value)?;
    write_checked(property_type, value, writer, objects);
    Ok(())
}

fn read_length(reader: &mut BitReader) -> Result<usize, LayoutError> {
    let length = Length::de(reader)?.get_u64();
    if length > reader.bits_remaining() as u64 {
        return Err(LayoutError::Serde(SerdeErr::OutOfBits {
            requested: length.min(u32::MAX as u64) as u32,
            remaining: reader.bits_remaining(),
        }));
    }
    Ok(length as usize)
}

pub fn read_value(
    property_type: &PropertyType,
    reader: &mut BitReader,
    objects: &mut dyn ObjectSerializer,
) -> Result<RepValue, LayoutError> {
    let value = match property_type {
        PropertyType::Bool => RepValue::Bool(reader.read_bit()?),
        PropertyType::U8 => RepValue::UInt(reader.read_bits(8)?),
        PropertyType::U16 => RepValue::UInt(reader.read_bits(16)?),
        PropertyType::U32 => RepValue::UInt(reader.read_bits(32)?),
        PropertyType::U64 => RepValue::UInt(reader.read_bits(64)?),
        PropertyType::I8 => RepValue::Int(reader.read_bits(8)? as u8 as i8 as i64),
        PropertyType::I16 => RepValue::Int(reader.read_bits(16)? as u16 as i16 as i64),
        PropertyType::I32 => RepValue::Int(reader.read_bits(32)? as u32 as i32 as i64),
        PropertyType::I64 => RepValue::Int(reader.read_bits(64)? as i64),
        PropertyType::F32 => RepValue::Float(f32::de(reader)?),
        PropertyType::F64 => RepValue::Double(f64::de(reader)?),
        PropertyType::String => RepValue::String(String::de(reader)?),
        PropertyType::Bytes => {
            let length = read_length(reader)?;
            let mut bytes = Vec::with_capacity(length);
            for _ in 0..length {
                bytes.push(reader.read_byte()?);
            }
            RepValue::Bytes(bytes)
        }
        PropertyType::Object => RepValue::Object(objects.read_object(reader)?),
        PropertyType::Struct(types) => {
            let mut values = Vec::with_capacity(types.len());
            for inner_type in types {
                values.push(read_value(inner_type, reader, objects)?);
            }
            RepValue::Struct(values)
        }
        PropertyType::Array(element) => {
            let length = read_length(reader)?;
            let mut values = Vec::with_capacity(length);
            for _ in 0..length {
                values.push(read_value(element, reader, objects)?);
            }
            RepValue::Array(values)
        }
        PropertyType::CustomDelta(_) => {
            return Err(LayoutError::TypeMismatch {
                expected: "plain field".to_string(),
                found: "delta",
            })
        }
    };
    Ok(value)
}

/// Serializer for layouts without object references; any reference is written as null
pub struct NoObjects;

impl ObjectSerializer for NoObjects {
    fn write_object(&mut self, _value: &ObjectValue, writer: &mut dyn BitWrite) {
        crate::NetworkGuid::INVALID.ser(writer);
    }

    fn read_object(&mut self, reader: &mut BitReader) -> Result<ObjectValue, SerdeErr> {
        let guid = crate::NetworkGuid::de(reader)?;
        if guid.is_valid() {
            Ok(ObjectValue::unresolved(guid))
        } else {
            Ok(ObjectValue::null())
        }
    }
}

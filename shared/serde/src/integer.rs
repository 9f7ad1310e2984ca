use crate::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

pub type UnsignedInteger<const BITS: u8> = SerdeInteger<false, false, BITS>;
pub type SignedInteger<const BITS: u8> = SerdeInteger<true, false, BITS>;
pub type UnsignedVariableInteger<const BITS: u8> = SerdeInteger<false, true, BITS>;
pub type SignedVariableInteger<const BITS: u8> = SerdeInteger<true, true, BITS>;

/// An integer written with a fixed or variable number of bits.
///
/// Signed values carry a leading sign bit followed by the magnitude.
/// Variable values are written as chunks of `BITS` bits, least significant
/// chunk first, each chunk preceded by a "proceed" bit.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SerdeInteger<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> {
    value: i64,
}

fn check_range(signed: bool, variable: bool, bits: u8, value: i64) -> Result<(), String> {
    if bits == 0 || bits > 63 {
        return Err(format!("integer width must be within 1..=63 bits, got {}", bits));
    }
    if !signed && value < 0 {
        return Err("can't encode a negative number with an unsigned integer".to_string());
    }
    if !variable && value.unsigned_abs() >= (1u64 << bits) {
        return Err(format!("with {} bits, can't encode {}", bits, value));
    }
    Ok(())
}

fn write_magnitude(writer: &mut dyn BitWrite, mut magnitude: u64, variable: bool, bits: u8) {
    if !variable {
        writer.write_bits(magnitude, bits);
        return;
    }
    loop {
        let proceed = magnitude >> bits != 0;
        writer.write_bit(proceed);
        writer.write_bits(magnitude, bits);
        magnitude >>= bits;
        if !proceed {
            return;
        }
    }
}

fn read_magnitude(reader: &mut BitReader, variable: bool, bits: u8) -> Result<u64, SerdeErr> {
    if !variable {
        return reader.read_bits(bits);
    }
    let mut output: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let proceed = reader.read_bit()?;
        let chunk = reader.read_bits(bits)?;
        if shift >= 64 {
            return Err(SerdeErr::VarIntOverflow);
        }
        output |= chunk << shift;
        shift += bits as u32;
        if !proceed {
            return Ok(output);
        }
    }
}

fn magnitude_bit_length(mut magnitude: u64, variable: bool, bits: u8) -> u32 {
    if !variable {
        return bits as u32;
    }
    let mut output = 0;
    loop {
        output += 1 + bits as u32;
        magnitude >>= bits;
        if magnitude == 0 {
            return output;
        }
    }
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> SerdeInteger<SIGNED, VARIABLE, BITS> {
    /// Panics if `value` does not fit, see `try_new`
    pub fn new<T: Into<i64>>(value: T) -> Self {
        match Self::try_new(value) {
            Ok(integer) => integer,
            Err(reason) => panic!("{}", reason),
        }
    }

    pub fn try_new<T: Into<i64>>(value: T) -> Result<Self, String> {
        let value = value.into();
        check_range(SIGNED, VARIABLE, BITS, value)?;
        Ok(Self { value })
    }

    pub fn get(&self) -> i64 {
        self.value
    }

    pub fn set<T: Into<i64>>(&mut self, value: T) {
        self.value = value.into();
    }
}

impl<const VARIABLE: bool, const BITS: u8> SerdeInteger<false, VARIABLE, BITS> {
    /// Unsigned constructor accepting the full `u64` range for variable widths
    pub fn from_u64(value: u64) -> Self {
        Self {
            value: value as i64,
        }
    }

    pub fn get_u64(&self) -> u64 {
        self.value as u64
    }
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> Serde
    for SerdeInteger<SIGNED, VARIABLE, BITS>
{
    fn ser(&self, writer: &mut dyn BitWrite) {
        let magnitude = if SIGNED {
            writer.write_bit(self.value < 0);
            self.value.unsigned_abs()
        } else {
            self.value as u64
        };
        write_magnitude(writer, magnitude, VARIABLE, BITS);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let negative = SIGNED && reader.read_bit()?;
        let magnitude = read_magnitude(reader, VARIABLE, BITS)?;
        let value = if negative {
            if magnitude > i64::MAX as u64 + 1 {
                return Err(SerdeErr::VarIntOverflow);
            }
            (magnitude as i64).wrapping_neg()
        } else {
            magnitude as i64
        };
        Ok(Self { value })
    }

    fn bit_length(&self) -> u32 {
        let sign = if SIGNED { 1 } else { 0 };
        let magnitude = if SIGNED {
            self.value.unsigned_abs()
        } else {
            self.value as u64
        };
        sign + magnitude_bit_length(magnitude, VARIABLE, BITS)
    }
}

impl<const SIGNED: bool, const BITS: u8> ConstBitLength for SerdeInteger<SIGNED, false, BITS> {
    fn const_bit_length() -> u32 {
        let sign = if SIGNED { 1 } else { 0 };
        sign + BITS as u32
    }
}

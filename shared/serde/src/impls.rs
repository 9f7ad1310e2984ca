use crate::{
    BitReader, BitWrite, ConstBitLength, Serde, SerdeErr, UnsignedVariableInteger,
};

type Length = UnsignedVariableInteger<7>;

impl Serde for bool {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bit(*self);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        reader.read_bit()
    }

    fn bit_length(&self) -> u32 {
        1
    }
}

impl ConstBitLength for bool {
    fn const_bit_length() -> u32 {
        1
    }
}

macro_rules! impl_serde_int {
    ($ty:ty, $unsigned:ty, $bits:expr) => {
        impl Serde for $ty {
            fn ser(&self, writer: &mut dyn BitWrite) {
                writer.write_bits(*self as $unsigned as u64, $bits);
            }

            fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
                Ok(reader.read_bits($bits)? as $unsigned as $ty)
            }

            fn bit_length(&self) -> u32 {
                $bits
            }
        }

        impl ConstBitLength for $ty {
            fn const_bit_length() -> u32 {
                $bits
            }
        }
    };
}

impl_serde_int!(u8, u8, 8);
impl_serde_int!(u16, u16, 16);
impl_serde_int!(u32, u32, 32);
impl_serde_int!(u64, u64, 64);
impl_serde_int!(i8, u8, 8);
impl_serde_int!(i16, u16, 16);
impl_serde_int!(i32, u32, 32);
impl_serde_int!(i64, u64, 64);

impl Serde for f32 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bits(self.to_bits() as u64, 32);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(f32::from_bits(reader.read_bits(32)? as u32))
    }

    fn bit_length(&self) -> u32 {
        32
    }
}

impl Serde for f64 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bits(self.to_bits(), 64);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(f64::from_bits(reader.read_bits(64)?))
    }

    fn bit_length(&self) -> u32 {
        64
    }
}

impl Serde for String {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let bytes = self.as_bytes();
        Length::from_u64(bytes.len() as u64).ser(writer);
        for byte in bytes {
            writer.write_byte(*byte);
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let length = Length::de(reader)?.get_u64();
        if length > reader.bits_remaining() as u64 / 8 {
            return Err(SerdeErr::OutOfBits {
                requested: length.saturating_mul(8).min(u32::MAX as u64) as u32,
                remaining: reader.bits_remaining(),
            });
        }
        let mut bytes = Vec::with_capacity(length as usize);
        for _ in 0..length {
            bytes.push(reader.read_byte()?);
        }
        String::from_utf8(bytes).map_err(|err| SerdeErr::InvalidValue {
            type_name: "String",
            reason: err.to_string(),
        })
    }

    fn bit_length(&self) -> u32 {
        Length::from_u64(self.len() as u64).bit_length() + self.len() as u32 * 8
    }
}

impl<T: Serde> Serde for Vec<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        Length::from_u64(self.len() as u64).ser(writer);
        for item in self {
            item.ser(writer);
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let length = Length::de(reader)?.get_u64();
        // every element costs at least one bit
        if length > reader.bits_remaining() as u64 {
            return Err(SerdeErr::OutOfBits {
                requested: length.min(u32::MAX as u64) as u32,
                remaining: reader.bits_remaining(),
            });
        }
        let mut output = Vec::with_capacity(length as usize);
        for _ in 0..length {
            output.push(T::de(reader)?);
        }
        Ok(output)
    }

    fn bit_length(&self) -> u32 {
        Length::from_u64(self.len() as u64).bit_length()
            + self.iter().map(Serde::bit_length).sum::<u32>()
    }
}

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            Some(value) => {
                writer.write_bit(true);
                value.ser(writer);
            }
            None => writer.write_bit(false),
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        if reader.read_bit()? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }

    fn bit_length(&self) -> u32 {
        1 + self.as_ref().map(Serde::bit_length).unwrap_or(0)
    }
}

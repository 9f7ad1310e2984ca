use crate::{BitReader, BitWrite, SerdeErr};

/// A type which can be written into and read back out of a bit stream
pub trait Serde: Sized + Clone + PartialEq {
    /// Writes self into the given writer
    fn ser(&self, writer: &mut dyn BitWrite);

    /// Parses a value from the given reader
    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr>;

    /// Number of bits `ser` will write for this value
    fn bit_length(&self) -> u32;
}

/// Types whose serialized width never changes
pub trait ConstBitLength {
    fn const_bit_length() -> u32;
}

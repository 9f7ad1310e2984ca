use std::fmt;

use replicore_serde::{BitReader, BitWrite, Serde, SerdeErr, UnsignedVariableInteger};

/// Identifies an object across the network.
///
/// `0` means "no object" and `1` is the valid-but-unassigned default. Static
/// GUIDs (stably named objects) are odd, dynamic GUIDs (runtime spawned
/// objects) are even.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkGuid(u64);

impl NetworkGuid {
    pub const INVALID: NetworkGuid = NetworkGuid(0);
    pub const DEFAULT: NetworkGuid = NetworkGuid(1);

    pub(crate) fn from_counter(counter: u64, is_static: bool) -> Self {
        Self((counter << 1) | is_static as u64)
    }

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    pub fn is_default(&self) -> bool {
        self.0 == 1
    }

    pub fn is_static(&self) -> bool {
        self.0 & 1 == 1 && !self.is_default()
    }

    pub fn is_dynamic(&self) -> bool {
        self.0 & 1 == 0 && self.is_valid()
    }
}

impl fmt::Display for NetworkGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type GuidValue = UnsignedVariableInteger<7>;

impl Serde for NetworkGuid {
    fn ser(&self, writer: &mut dyn BitWrite) {
        GuidValue::from_u64(self.0).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self(GuidValue::de(reader)?.get_u64()))
    }

    fn bit_length(&self) -> u32 {
        GuidValue::from_u64(self.0).bit_length()
    }
}

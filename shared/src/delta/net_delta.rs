use std::collections::BTreeMap;

use replicore_serde::{BitReader, BitWriter, SerdeErr};

/// What one connection was last sent of a custom delta field: the array's
/// change key and, per item id, the item's change key
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeltaBaseState {
    pub array_key: u32,
    pub item_keys: BTreeMap<u32, u32>,
}

impl DeltaBaseState {
    /// Key no real array or item carries, so whatever has it is sent again
    pub const UNKNOWN_KEY: u32 = u32::MAX;
}

/// A field which serializes its own incremental delta instead of being
/// compared against the shared shadow state.
pub trait NetDeltaSerialize {
    /// Writes what changed since `base` (everything, if `base` is `None`).
    /// Returns the new base state, or `None` if nothing was written.
    fn delta_serialize(
        &self,
        base: Option<&DeltaBaseState>,
        writer: &mut BitWriter,
    ) -> Option<DeltaBaseState>;

    /// Applies a delta written by `delta_serialize`. Returns whether anything changed.
    fn delta_deserialize(&mut self, reader: &mut BitReader) -> Result<bool, SerdeErr>;
}

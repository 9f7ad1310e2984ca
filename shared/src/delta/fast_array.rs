use replicore_serde::{BitReader, BitWriter, Serde, SerdeErr, UnsignedVariableInteger};

use crate::delta::net_delta::{DeltaBaseState, NetDeltaSerialize};

type Count = UnsignedVariableInteger<5>;
type ItemId = UnsignedVariableInteger<7>;

#[derive(Clone, Debug, PartialEq)]
pub struct FastArrayItem<T> {
    id: u32,
    replication_key: u32,
    value: T,
}

impl<T> FastArrayItem<T> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

/// A replicated list which sends only added, changed and removed items.
///
/// Every item carries a stable id and a change key. Mutating an item through
/// `get_mut` bumps its key, so the delta against a connection's base state is
/// just the items whose key moved plus the ids which disappeared.
#[derive(Clone, Debug)]
pub struct FastArray<T: Serde> {
    items: Vec<FastArrayItem<T>>,
    array_key: u32,
    next_id: u32,
}

impl<T: Serde> FastArray<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            array_key: 0,
            next_id: 0,
        }
    }

    /// Appends `value`, returning its id
    pub fn push(&mut self, value: T) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.array_key = self.array_key.wrapping_add(1);
        self.items.push(FastArrayItem {
            id,
            replication_key: 1,
            value,
        });
        id
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.items
            .iter()
            .find(|item| item.id == id)
            .map(|item| &item.value)
    }

    /// Mutable access, marks the item dirty
    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        let item = self.items.iter_mut().find(|item| item.id == id)?;
        item.replication_key = item.replication_key.wrapping_add(1);
        self.array_key = self.array_key.wrapping_add(1);
        Some(&mut item.value)
    }

    pub fn remove(&mut self, id: u32) -> Option<T> {
        let position = self.items.iter().position(|item| item.id == id)?;
        self.array_key = self.array_key.wrapping_add(1);
        Some(self.items.remove(position).value)
    }

    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            self.items.clear();
            self.array_key = self.array_key.wrapping_add(1);
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FastArrayItem<T>> {
        self.items.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|item| &item.value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn base_state(&self) -> DeltaBaseState {
        DeltaBaseState {
            array_key: self.array_key,
            item_keys: self
                .items
                .iter()
                .map(|item| (item.id, item.replication_key))
                .collect(),
        }
    }

    fn upsert(&mut self, id: u32, value: T) {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.value = value;
                item.replication_key = item.replication_key.wrapping_add(1);
            }
            None => {
                self.items.push(FastArrayItem {
                    id,
                    replication_key: 1,
                    value,
                });
                if id >= self.next_id {
                    self.next_id = id.wrapping_add(1);
                }
            }
        }
        self.array_key = self.array_key.wrapping_add(1);
    }
}

impl<T: Serde> Default for FastArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn read_count(reader: &mut BitReader) -> Result<usize, SerdeErr> {
    let count = Count::de(reader)?.get_u64();
    if count > reader.bits_remaining() as u64 {
        return Err(SerdeErr::InvalidValue {
            type_name: "FastArray",
            reason: "item count exceeds remaining payload".to_string(),
        });
    }
    Ok(count as usize)
}

impl<T: Serde> NetDeltaSerialize for FastArray<T> {
    fn delta_serialize(
        &self,
        base: Option<&DeltaBaseState>,
        writer: &mut BitWriter,
    ) -> Option<DeltaBaseState> {
        if base.map(|base| base.array_key) == Some(self.array_key) {
            return None;
        }

        let deleted: Vec<u32> = match base {
            Some(base) => base
                .item_keys
                .keys()
                .filter(|id| !self.contains(**id))
                .copied()
                .collect(),
            None => Vec::new(),
        };
        let changed: Vec<&FastArrayItem<T>> = self
            .items
            .iter()
            .filter(|item| {
                base.and_then(|base| base.item_keys.get(&item.id)) != Some(&item.replication_key)
            })
            .collect();

        if deleted.is_empty() && changed.is_empty() {
            return None;
        }

        Count::from_u64(deleted.len() as u64).ser(writer);
        for id in &deleted {
            ItemId::from_u64(*id as u64).ser(writer);
        }
        Count::from_u64(changed.len() as u64).ser(writer);
        for item in changed {
            ItemId::from_u64(item.id as u64).ser(writer);
            item.value.ser(writer);
        }

        Some(self.base_state())
    }

    fn delta_deserialize(&mut self, reader: &mut BitReader) -> Result<bool, SerdeErr> {
        let mut applied = false;

        let deleted = read_count(reader)?;
        for _ in 0..deleted {
            let id = ItemId::de(reader)?.get_u64() as u32;
            applied |= self.remove(id).is_some();
        }

        let changed = read_count(reader)?;
        for _ in 0..changed {
            let id = ItemId::de(reader)?.get_u64() as u32;
            let value = T::de(reader)?;
            self.upsert(id, value);
            applied = true;
        }

        Ok(applied)
    }
}

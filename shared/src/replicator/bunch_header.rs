use replicore_serde::{BitReader, BitWrite, Serde, SerdeErr, UnsignedVariableInteger};

use crate::{guid::PackageMap, object::class_kinds::ClassNetId, NetworkGuid};

type ChecksumCount = UnsignedVariableInteger<5>;

/// Sent once when a channel opens: which class to spawn and the checksum of
/// every field and function, so each side knows which indices it shares
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenHeader {
    pub class_net_id: ClassNetId,
    pub checksums: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BunchHeader {
    pub guid: NetworkGuid,
    pub open: Option<OpenHeader>,
    /// The receiving connection owns the object
    pub net_owner: bool,
}

impl BunchHeader {
    pub fn write(&self, writer: &mut dyn BitWrite, package_map: &mut PackageMap) {
        package_map.write_guid_ref(self.guid, writer);
        writer.write_bit(self.open.is_some());
        if let Some(open) = &self.open {
            open.class_net_id.ser(writer);
            ChecksumCount::from_u64(open.checksums.len() as u64).ser(writer);
            for checksum in &open.checksums {
                checksum.ser(writer);
            }
        }
        writer.write_bit(self.net_owner);
    }

    pub fn read(reader: &mut BitReader, package_map: &mut PackageMap) -> Result<Self, SerdeErr> {
        let guid = package_map.read_guid_ref(reader)?;
        let open = if reader.read_bit()? {
            let class_net_id = ClassNetId::de(reader)?;
            let count = ChecksumCount::de(reader)?.get_u64();
            if count.saturating_mul(32) > reader.bits_remaining() as u64 {
                return Err(SerdeErr::InvalidValue {
                    type_name: "OpenHeader",
                    reason: format!("{} checksums don't fit the bunch", count),
                });
            }
            let mut checksums = Vec::with_capacity(count as usize);
            for _ in 0..count {
                checksums.push(u32::de(reader)?);
            }
            Some(OpenHeader {
                class_net_id,
                checksums,
            })
        } else {
            None
        };
        let net_owner = reader.read_bit()?;
        Ok(Self {
            guid,
            open,
            net_owner,
        })
    }
}

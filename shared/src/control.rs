use replicore_serde::{BitReader, BitWrite, BitWriter, Serde, SerdeErr};

use crate::NetworkGuid;

/// Sent on the control stream when a static object is destroyed, so peers
/// which never opened a channel for it still remove their copy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestroyRecord {
    pub guid: NetworkGuid,
    pub path: String,
}

impl DestroyRecord {
    pub fn new(guid: NetworkGuid, path: &str) -> Self {
        Self {
            guid,
            path: path.to_string(),
        }
    }

    /// A complete control payload carrying `records`
    pub fn encode_all(records: &[Self]) -> Vec<u8> {
        let mut writer = BitWriter::new();
        Self::write_all(records, &mut writer);
        writer.to_bytes()
    }

    /// Reads every record in a control payload
    pub fn read_all(reader: &mut BitReader) -> Result<Vec<Self>, SerdeErr> {
        let mut records = Vec::new();
        while reader.read_bit()? {
            records.push(Self::de(reader)?);
        }
        Ok(records)
    }

    /// Writes records as a continuation-bit list
    pub fn write_all(records: &[Self], writer: &mut dyn BitWrite) {
        for record in records {
            writer.write_bit(true);
            record.ser(writer);
        }
        writer.write_bit(false);
    }
}

impl Serde for DestroyRecord {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.guid.ser(writer);
        self.path.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let guid = NetworkGuid::de(reader)?;
        if !guid.is_static() {
            return Err(SerdeErr::InvalidValue {
                type_name: "DestroyRecord",
                reason: format!("GUID {} is not static", guid),
            });
        }
        let path = String::de(reader)?;
        Ok(Self { guid, path })
    }

    fn bit_length(&self) -> u32 {
        self.guid.bit_length() + self.path.bit_length()
    }
}

use crate::SerdeErr;

/// Reads bits out of a borrowed buffer, in the order `BitWriter` wrote them
pub struct BitReader<'b> {
    buffer: &'b [u8],
    bit_len: u32,
    position: u32,
}

impl<'b> BitReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        let bit_len = (buffer.len() as u64 * 8).min(u32::MAX as u64) as u32;
        Self::with_bit_len(buffer, bit_len)
    }

    /// Restricts the reader to the first `bit_len` bits of `buffer`
    pub fn with_bit_len(buffer: &'b [u8], bit_len: u32) -> Self {
        let max = (buffer.len() as u64 * 8).min(u32::MAX as u64) as u32;
        Self {
            buffer,
            bit_len: bit_len.min(max),
            position: 0,
        }
    }

    pub fn bits_remaining(&self) -> u32 {
        self.bit_len - self.position
    }

    pub fn bits_read(&self) -> u32 {
        self.position
    }

    pub fn read_bit(&mut self) -> Result<bool, SerdeErr> {
        if self.position >= self.bit_len {
            return Err(SerdeErr::OutOfBits {
                requested: 1,
                remaining: 0,
            });
        }
        let byte = self.buffer[(self.position / 8) as usize];
        let bit = (byte >> (self.position % 8)) & 1 != 0;
        self.position += 1;
        Ok(bit)
    }

    pub fn read_bits(&mut self, bits: u8) -> Result<u64, SerdeErr> {
        if bits as u32 > self.bits_remaining() {
            return Err(SerdeErr::OutOfBits {
                requested: bits as u32,
                remaining: self.bits_remaining(),
            });
        }
        let mut output: u64 = 0;
        for index in 0..bits {
            if self.read_bit()? {
                output |= 1 << index;
            }
        }
        Ok(output)
    }

    pub fn read_byte(&mut self) -> Result<u8, SerdeErr> {
        Ok(self.read_bits(8)? as u8)
    }

    /// Copies the next `bit_count` bits into a fresh buffer. Used to lift a
    /// length-prefixed payload out of a larger stream.
    pub fn read_payload(&mut self, bit_count: u32) -> Result<OwnedBitReader, SerdeErr> {
        if bit_count > self.bits_remaining() {
            return Err(SerdeErr::OutOfBits {
                requested: bit_count,
                remaining: self.bits_remaining(),
            });
        }
        let mut bytes = Vec::with_capacity(((bit_count + 7) / 8) as usize);
        let mut remaining = bit_count;
        while remaining > 0 {
            let take = remaining.min(8) as u8;
            bytes.push(self.read_bits(take)? as u8);
            remaining -= take as u32;
        }
        Ok(OwnedBitReader::new(bytes, bit_count))
    }
}

/// An owned bit payload which can be read any number of times
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedBitReader {
    buffer: Box<[u8]>,
    bit_len: u32,
}

impl OwnedBitReader {
    pub fn new(buffer: Vec<u8>, bit_len: u32) -> Self {
        Self {
            buffer: buffer.into_boxed_slice(),
            bit_len,
        }
    }

    pub fn borrow(&self) -> BitReader<'_> {
        BitReader::with_bit_len(&self.buffer, self.bit_len)
    }
}

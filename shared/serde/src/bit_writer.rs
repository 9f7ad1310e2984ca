/// Anything that can accept a stream of bits
pub trait BitWrite {
    fn write_bit(&mut self, bit: bool);
    fn write_byte(&mut self, byte: u8);
    fn count_bits(&mut self, bits: u32);
    fn is_counter(&self) -> bool;

    /// Writes the lowest `bits` bits of `value`, least significant first
    fn write_bits(&mut self, value: u64, bits: u8) {
        let mut temp = value;
        for _ in 0..bits {
            self.write_bit(temp & 1 != 0);
            temp >>= 1;
        }
    }
}

/// A growable bit buffer with an optional soft budget.
///
/// The budget never prevents a write; it only feeds `bits_free()` and the
/// `BitCounter` overflow check so callers can decide whether something fits
/// before committing it.
pub struct BitWriter {
    scratch: u8,
    scratch_index: u8,
    buffer: Vec<u8>,
    bits_written: u32,
    max_bits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::with_max_bits(u32::MAX)
    }

    pub fn with_max_bits(max_bits: u32) -> Self {
        Self {
            scratch: 0,
            scratch_index: 0,
            buffer: Vec::with_capacity(64),
            bits_written: 0,
            max_bits,
        }
    }

    pub fn with_max_bytes(max_bytes: usize) -> Self {
        let bits = (max_bytes as u64).saturating_mul(8).min(u32::MAX as u64) as u32;
        Self::with_max_bits(bits)
    }

    pub fn bits_written(&self) -> u32 {
        self.bits_written
    }

    pub fn bits_free(&self) -> u32 {
        self.max_bits.saturating_sub(self.bits_written)
    }

    pub fn is_empty(&self) -> bool {
        self.bits_written == 0
    }

    /// Returns a counter starting at this writer's current position, used to
    /// measure a write before performing it
    pub fn counter(&self) -> BitCounter {
        BitCounter::new(self.bits_written, self.max_bits)
    }

    /// Copies `bit_count` bits out of `bytes` (as produced by another writer)
    pub fn append_bits(&mut self, bytes: &[u8], bit_count: u32) {
        let mut remaining = bit_count;
        for byte in bytes {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(8) as u8;
            self.write_bits(*byte as u64, take);
            remaining -= take as u32;
        }
    }

    /// Appends everything another writer holds
    pub fn append_writer(&mut self, other: BitWriter) {
        let bits = other.bits_written();
        let bytes = other.to_bytes();
        self.append_bits(&bytes, bits);
    }

    fn flush_scratch(&mut self) {
        if self.scratch_index > 0 {
            let byte = (self.scratch << (8 - self.scratch_index)).reverse_bits();
            self.buffer.push(byte);
            self.scratch = 0;
            self.scratch_index = 0;
        }
    }

    pub fn to_bytes(mut self) -> Vec<u8> {
        self.flush_scratch();
        self.buffer
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitWrite for BitWriter {
    fn write_bit(&mut self, bit: bool) {
        self.scratch <<= 1;
        if bit {
            self.scratch |= 1;
        }
        self.scratch_index += 1;
        self.bits_written += 1;

        if self.scratch_index >= 8 {
            self.buffer.push(self.scratch.reverse_bits());
            self.scratch_index = 0;
            self.scratch = 0;
        }
    }

    fn write_byte(&mut self, byte: u8) {
        self.write_bits(byte as u64, 8);
    }

    fn count_bits(&mut self, _bits: u32) {}

    fn is_counter(&self) -> bool {
        false
    }
}

/// Counts bits without storing them
pub struct BitCounter {
    start_bits: u32,
    current_bits: u32,
    max_bits: u32,
}

impl BitCounter {
    pub fn new(start_bits: u32, max_bits: u32) -> Self {
        Self {
            start_bits,
            current_bits: start_bits,
            max_bits,
        }
    }

    pub fn overflowed(&self) -> bool {
        self.current_bits > self.max_bits
    }

    pub fn bits_needed(&self) -> u32 {
        self.current_bits - self.start_bits
    }
}

impl BitWrite for BitCounter {
    fn write_bit(&mut self, _bit: bool) {
        self.current_bits += 1;
    }

    fn write_byte(&mut self, _byte: u8) {
        self.current_bits += 8;
    }

    fn count_bits(&mut self, bits: u32) {
        self.current_bits += bits;
    }

    fn is_counter(&self) -> bool {
        true
    }

    fn write_bits(&mut self, _value: u64, bits: u8) {
        self.current_bits += bits as u32;
    }
}

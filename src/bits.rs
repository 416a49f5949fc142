//! MSB-first bit reader over destuffed scan data.

/// Sequential bit cursor borrowing the entropy-coded bytes it reads from.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    byte: usize,
    bit: u8, // 0-7, index of the next bit in `data[byte]`, counting from the MSB
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte: 0,
            bit: 0,
        }
    }

    /// Reads a single bit, or returns `None` once all data has been consumed.
    pub fn read_bit(&mut self) -> Option<u32> {
        let byte = *self.data.get(self.byte)?;
        let bit = (byte >> (7 - self.bit)) & 1;
        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            self.byte += 1;
        }
        Some(bit.into())
    }

    /// Reads an `n`-bit unsigned value, most significant bit first.
    ///
    /// Returns `None` if the data runs out before all `n` bits were read. Any bits read up to that
    /// point are consumed and discarded.
    pub fn read_bits(&mut self, n: u8) -> Option<u32> {
        debug_assert!(n <= 32);
        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()?;
        }
        Some(value)
    }

    /// Skips to the start of the next byte, unless already on a byte boundary or at the end.
    pub fn align(&mut self) {
        if self.byte >= self.data.len() {
            return;
        }
        if self.bit != 0 {
            self.bit = 0;
            self.byte += 1;
        }
    }

    /// Returns the index of the byte containing the next unread bit.
    #[inline]
    pub fn position(&self) -> usize {
        self.byte
    }

    #[cfg(test)]
    pub fn is_aligned(&self) -> bool {
        self.bit == 0
    }
}

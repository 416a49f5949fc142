use core::fmt;

use crate::bits::BitReader;

/// Maximum number of symbols a baseline Huffman table may define.
pub const MAX_SYMBOLS: usize = 162;

/// A canonical Huffman table, as defined by a DHT segment.
#[derive(Clone)]
pub struct HuffmanTable {
    /// `offsets[l]` is the number of symbols with a code shorter than or equal to `l` bits.
    /// Symbols and codes of length `l` are stored at `offsets[l - 1]..offsets[l]`.
    offsets: [u8; 17],
    symbols: Vec<u8>,
    codes: Vec<u16>,
}

/// Returns the first code length at which `num_codes_per_length` assigns more codes than are
/// available, or `None` if all codes fit.
pub fn overfull_length(num_codes_per_length: &[u8; 16]) -> Option<usize> {
    let mut next_code = 0u32;
    for (i, &count) in num_codes_per_length.iter().enumerate() {
        let len = i + 1;
        next_code += u32::from(count);
        if next_code > 1 << len {
            return Some(len);
        }
        next_code <<= 1;
    }
    None
}

impl HuffmanTable {
    /// Builds a table from the per-length code counts and the symbol list of a DHT segment.
    ///
    /// The caller must ensure that `symbols` holds exactly as many entries as `num_codes_per_length`
    /// sums up to, that this is at most [`MAX_SYMBOLS`], and that the counts are not
    /// [overfull](overfull_length).
    pub fn build(num_codes_per_length: &[u8; 16], symbols: &[u8]) -> Self {
        let mut offsets = [0u8; 17];
        let mut total = 0u8;
        for (i, &count) in num_codes_per_length.iter().enumerate() {
            total += count;
            offsets[i + 1] = total;
        }
        debug_assert_eq!(usize::from(total), symbols.len());
        debug_assert_eq!(overfull_length(num_codes_per_length), None);

        // Same as `Generate_size_table` and `Generate_code_table` in Annex C.
        let mut codes = Vec::with_capacity(symbols.len());
        let mut next_code = 0u32;
        for &count in num_codes_per_length {
            for _ in 0..count {
                codes.push(next_code as u16);
                next_code += 1;
            }
            next_code <<= 1;
        }

        Self {
            offsets,
            symbols: symbols.to_vec(),
            codes,
        }
    }

    /// Returns the symbols whose code is exactly `len` bits long (1-16).
    pub fn symbols_of_length(&self, len: usize) -> &[u8] {
        &self.symbols[usize::from(self.offsets[len - 1])..usize::from(self.offsets[len])]
    }

    /// Returns the code and its length in bits for `symbol`, if the table contains it.
    #[cfg(test)]
    pub fn code_for(&self, symbol: u8) -> Option<(u16, u8)> {
        let index = self.symbols.iter().position(|&s| s == symbol)?;
        let len = (1..=16)
            .find(|&l| index < usize::from(self.offsets[l]))
            .unwrap_or(16);
        Some((self.codes[index], len as u8))
    }

    /// Decodes the next symbol from `reader`.
    ///
    /// Returns `None` if no code matches within 16 bits, or if the reader runs out of data.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Option<u8> {
        let mut code = 0u32;
        for len in 1..=16 {
            code = (code << 1) | reader.read_bit()?;
            let range = usize::from(self.offsets[len - 1])..usize::from(self.offsets[len]);
            if let Some(i) = self.codes[range.clone()]
                .iter()
                .position(|&c| u32::from(c) == code)
            {
                return Some(self.symbols[range.start + i]);
            }
        }
        None
    }
}

impl fmt::Debug for HuffmanTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for len in 1..=16 {
            let range = usize::from(self.offsets[len - 1])..usize::from(self.offsets[len]);
            for (&code, &symbol) in self.codes[range.clone()].iter().zip(&self.symbols[range]) {
                writeln!(f, "{len} {:01$b} -> {2:02x}", code, len, symbol)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Default luminance DC table.
    const NUM_DC_CODES: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
    const DC_VALUES: [u8; 12] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b,
    ];

    #[test]
    fn tablegen() {
        let tbl = HuffmanTable::build(&NUM_DC_CODES, &DC_VALUES);
        expect_test::expect![[r#"
            2 00 -> 00
            3 010 -> 01
            3 011 -> 02
            3 100 -> 03
            3 101 -> 04
            3 110 -> 05
            4 1110 -> 06
            5 11110 -> 07
            6 111110 -> 08
            7 1111110 -> 09
            8 11111110 -> 0a
            9 111111110 -> 0b

        "#]]
        .assert_debug_eq(&tbl);
        assert_eq!(tbl.symbols_of_length(3), &[1, 2, 3, 4, 5]);
        assert_eq!(tbl.symbols.len(), 12);
    }

    #[test]
    fn codes_are_prefix_free() {
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..100 {
            let (counts, symbols) = random_table(&mut rng);
            let tbl = HuffmanTable::build(&counts, &symbols);
            let codes: Vec<(u16, u8)> = symbols.iter().map(|&s| tbl.code_for(s).unwrap()).collect();
            for (i, &(a, alen)) in codes.iter().enumerate() {
                for &(b, blen) in &codes[i + 1..] {
                    let (short, slen, long, llen) = if alen <= blen {
                        (a, alen, b, blen)
                    } else {
                        (b, blen, a, alen)
                    };
                    assert_ne!(long >> (llen - slen), short, "{tbl:?}");
                }
            }
        }
    }

    #[test]
    fn roundtrip() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..100 {
            let (counts, symbols) = random_table(&mut rng);
            let tbl = HuffmanTable::build(&counts, &symbols);

            let message: Vec<u8> = (0..20).map(|_| symbols[rng.usize(..symbols.len())]).collect();
            let mut writer = BitWriter::default();
            for &s in &message {
                let (code, len) = tbl.code_for(s).unwrap();
                writer.put(code.into(), len);
            }
            let bytes = writer.finish();

            let mut reader = BitReader::new(&bytes);
            for &s in &message {
                assert_eq!(tbl.decode(&mut reader), Some(s));
            }
        }
    }

    #[test]
    fn unmatched_code() {
        // Only `0` is assigned; `1` followed by anything never matches.
        let mut counts = [0; 16];
        counts[0] = 1;
        let tbl = HuffmanTable::build(&counts, &[0x42]);
        assert_eq!(tbl.decode(&mut BitReader::new(&[0x7f])), Some(0x42));
        assert_eq!(tbl.decode(&mut BitReader::new(&[0xff, 0xff, 0xff])), None);
        assert_eq!(tbl.decode(&mut BitReader::new(&[0xff])), None);
    }

    #[test]
    fn overfull() {
        let mut counts = [0; 16];
        counts[0] = 2;
        assert_eq!(overfull_length(&counts), None);
        counts[0] = 3;
        assert_eq!(overfull_length(&counts), Some(1));

        // One code per length up to 15 leaves 2 codes of length 16.
        let mut counts = [1; 16];
        counts[15] = 2;
        assert_eq!(overfull_length(&counts), None);
        counts[15] = 3;
        assert_eq!(overfull_length(&counts), Some(16));

        assert_eq!(overfull_length(&NUM_DC_CODES), None);
        let mut rng = fastrand::Rng::with_seed(3);
        for _ in 0..100 {
            let (counts, _) = random_table(&mut rng);
            assert_eq!(overfull_length(&counts), None);
        }
    }

    /// Generates a valid code-length distribution with distinct symbols.
    fn random_table(rng: &mut fastrand::Rng) -> ([u8; 16], Vec<u8>) {
        let mut counts = [0u8; 16];
        // Number of unassigned codes available at the current length.
        let mut available = 2u32;
        let mut total = 0usize;
        for count in counts.iter_mut() {
            // Leave at least one code free so the all-ones code stays unused.
            let max = (available - 1).min((MAX_SYMBOLS - total) as u32).min(12);
            let n = rng.u32(0..=max);
            *count = n as u8;
            total += n as usize;
            available = (available - n) * 2;
        }
        if total == 0 {
            counts[0] = 1;
            total = 1;
        }
        let mut symbols: Vec<u8> = (0..=255).collect();
        rng.shuffle(&mut symbols);
        symbols.truncate(total);
        (counts, symbols)
    }

    #[derive(Default)]
    struct BitWriter {
        bytes: Vec<u8>,
        acc: u32,
        bits: u8,
    }

    impl BitWriter {
        fn put(&mut self, value: u32, len: u8) {
            for i in (0..len).rev() {
                self.acc = (self.acc << 1) | ((value >> i) & 1);
                self.bits += 1;
                if self.bits == 8 {
                    self.bytes.push(self.acc as u8);
                    self.acc = 0;
                    self.bits = 0;
                }
            }
        }

        fn finish(mut self) -> Vec<u8> {
            while self.bits != 0 {
                self.put(1, 1);
            }
            self.bytes
        }
    }
}

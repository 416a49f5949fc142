use bytemuck::{Pod, Zeroable};

/// Maps the position of a coefficient in zigzag order to its index in natural (row-major) order.
pub const ZIGZAG: [u8; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, //
    17, 24, 32, 25, 18, 11, 4, 5, //
    12, 19, 26, 33, 40, 48, 41, 34, //
    27, 20, 13, 6, 7, 14, 21, 28, //
    35, 42, 49, 56, 57, 50, 43, 36, //
    29, 22, 15, 23, 30, 37, 44, 51, //
    58, 59, 52, 45, 38, 31, 39, 46, //
    53, 60, 61, 54, 47, 55, 62, 63, //
];

/// A quantization table, stored in natural order.
#[derive(Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct QTable {
    pub values: [u16; 64],
}

impl QTable {
    /// Builds a table from values listed in zigzag order, as they are stored in a DQT segment.
    pub fn from_zigzag(values: impl IntoIterator<Item = u16>) -> Self {
        let mut table = Self::zeroed();
        for (&pos, value) in ZIGZAG.iter().zip(values) {
            table.values[usize::from(pos)] = value;
        }
        table
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    /// Component identifier, normalized to 1-3 (Y, Cb, Cr).
    pub id: u8,
    pub hsample: u8,
    pub vsample: u8,
    /// 0-3, indexing into the 4 quantization tables.
    pub qtable: u8,
    /// 0-3, indexing into the 4 DC huffman tables. Set by the scan header.
    pub dchuff: u8,
    /// 0-3, indexing into the 4 AC huffman tables. Set by the scan header.
    pub achuff: u8,
}

impl Component {
    /// Returns the index of the block plane this component's samples are stored in.
    #[inline]
    pub fn plane(&self) -> usize {
        usize::from(self.id - 1)
    }
}

#[derive(Debug, Clone)]
pub struct Metadata {
    /// The SOF marker byte that introduced the frame.
    pub frame_type: u8,
    pub width: u16,
    pub height: u16,
    /// Ri – number of MCUs per restart interval (0 if restart intervals are disabled).
    pub restart_interval: u16,
    /// Frame components, in the order the frame header lists them.
    pub components: Vec<Component>,
    /// Indices into `components`, in the order the scan interleaves them.
    pub scan_order: Vec<usize>,
    pub spectral_start: u8,
    pub spectral_end: u8,
    pub approx_high: u8,
    pub approx_low: u8,
}

impl Metadata {
    #[inline]
    pub fn blocks_wide(&self) -> usize {
        (usize::from(self.width) + 7) / 8
    }

    #[inline]
    pub fn blocks_tall(&self) -> usize {
        (usize::from(self.height) + 7) / 8
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks_wide() * self.blocks_tall()
    }
}

//! Huffman decoding of the scan data into coefficient blocks.

use crate::{
    bits::BitReader,
    block::{Block, Coefficients},
    error::{Error, ErrorKind, Result},
    huffman::HuffmanTable,
    metadata::ZIGZAG,
};

/// Largest DC magnitude category allowed for 8-bit samples.
const MAX_DC_BITS: u8 = 11;
/// Largest DC coefficient magnitude, the largest value category 11 can express.
const MAX_DC: u32 = 2047;
/// Largest AC coefficient size allowed for 8-bit samples.
const MAX_AC_BITS: u8 = 10;

/// End of block: all remaining coefficients are zero.
const EOB: u8 = 0x00;
/// Zero run length: 16 zero coefficients.
const ZRL: u8 = 0xF0;

/// Per-component tables and destination plane for one component of the scan.
pub struct ScanComponent<'t> {
    pub plane: usize,
    pub dc_table: &'t HuffmanTable,
    pub ac_table: &'t HuffmanTable,
}

/// Decodes the entropy-coded data of a scan into `block_count` blocks.
///
/// `start_positions` lists the offsets in `data` at which each restart interval is expected to
/// begin. It is only used to detect (and warn about) desynchronization.
pub fn decode_scan(
    data: &[u8],
    components: &[ScanComponent<'_>],
    block_count: usize,
    restart_interval: u16,
    start_positions: &[usize],
) -> Result<Vec<Block<Coefficients>>> {
    let mut blocks = Vec::new();
    blocks.try_reserve_exact(block_count).map_err(|e| {
        Error::new(
            ErrorKind::Resource,
            format!("failed to allocate {block_count} blocks: {e}"),
        )
    })?;
    blocks.resize_with(block_count, Block::new);

    let mut reader = BitReader::new(data);
    let mut previous_dc = [0i32; 3];
    let ri = usize::from(restart_interval);

    for (index, block) in blocks.iter_mut().enumerate() {
        if ri != 0 && index % ri == 0 {
            previous_dc = [0; 3];
            reader.align();

            let interval = index / ri;
            match start_positions.get(interval) {
                Some(&expected) if expected != reader.position() => log::warn!(
                    "restart interval {interval} starts at byte {}, but RST marker was at {expected}",
                    reader.position(),
                ),
                _ => {}
            }
        }

        for component in components {
            decode_block(
                &mut reader,
                block.plane_mut(component.plane),
                component,
                &mut previous_dc[component.plane],
            )
            .map_err(|e| Error::decode(format!("block {index}: {e}")))?;
        }
    }

    if ri != 0 {
        let expected = (block_count + ri - 1) / ri - 1;
        let found = start_positions.len().saturating_sub(1);
        if found != expected {
            log::warn!("found {found} RST markers in scan data, expected {expected}");
        }
    }

    Ok(blocks)
}

/// Extends the `bits`-bit raw `value` to a signed coefficient (F.2.2.1 `EXTEND`).
#[inline]
fn extend(value: u32, bits: u8) -> i32 {
    if bits == 0 {
        return 0;
    }
    let value = value as i32;
    if value < 1 << (bits - 1) {
        value - ((1 << bits) - 1)
    } else {
        value
    }
}

fn read_bits(reader: &mut BitReader<'_>, bits: u8) -> Result<u32> {
    reader
        .read_bits(bits)
        .ok_or_else(|| Error::decode("unexpected end of scan data"))
}

fn decode_symbol(reader: &mut BitReader<'_>, table: &HuffmanTable, class: &str) -> Result<u8> {
    table
        .decode(reader)
        .ok_or_else(|| Error::decode(format!("invalid {class} huffman code")))
}

/// Decodes one 8x8 block of a single component into `coeffs` (natural order).
fn decode_block(
    reader: &mut BitReader<'_>,
    coeffs: &mut [i32; 64],
    component: &ScanComponent<'_>,
    previous_dc: &mut i32,
) -> Result<()> {
    let dc_bits = decode_symbol(reader, component.dc_table, "DC")?;
    if dc_bits > MAX_DC_BITS {
        return Err(Error::decode(format!(
            "DC coefficient length {dc_bits} exceeds {MAX_DC_BITS} bits"
        )));
    }
    let diff = extend(read_bits(reader, dc_bits)?, dc_bits);
    // `previous_dc` stays within `MAX_DC`, so this cannot overflow.
    let dc = *previous_dc + diff;
    if dc.unsigned_abs() > MAX_DC {
        return Err(Error::decode(format!("DC coefficient {dc} is out of range")));
    }
    *previous_dc = dc;
    coeffs[0] = dc;

    let mut k = 1;
    while k < 64 {
        let symbol = decode_symbol(reader, component.ac_table, "AC")?;
        if symbol == EOB {
            break;
        }

        let (run, size) = if symbol == ZRL {
            (16, 0)
        } else {
            (usize::from(symbol >> 4), symbol & 0xf)
        };
        if size > MAX_AC_BITS {
            return Err(Error::decode(format!(
                "AC coefficient length {size} exceeds {MAX_AC_BITS} bits"
            )));
        }
        if k + run >= 64 {
            return Err(Error::decode(format!(
                "zero run of {run} at position {k} overflows the block"
            )));
        }

        // `coeffs` starts out zeroed, so skipping is enough.
        k += run;
        if size > 0 {
            let value = extend(read_bits(reader, size)?, size);
            coeffs[usize::from(ZIGZAG[k])] = value;
            k += 1;
        }
    }

    Ok(())
}

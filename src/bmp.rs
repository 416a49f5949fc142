//! Uncompressed 24-bit BMP output with a `BITMAPCOREHEADER`.

use std::io::{self, Write};

use crate::Image;

const FILE_HEADER_SIZE: u32 = 14;
const CORE_HEADER_SIZE: u32 = 12;

/// Number of padding bytes needed to extend a row of `width` pixels to a multiple of 4 bytes.
#[inline]
fn row_padding(width: u32) -> u32 {
    (4 - width * 3 % 4) % 4
}

/// Writes `image` to `w`. Rows are stored bottom-up, pixels as blue, green, red.
pub fn write(image: &Image, mut w: impl Write) -> io::Result<()> {
    let (width, height) = (image.width(), image.height());
    let padding = row_padding(width);
    let row_size = width * 3 + padding;
    let offset = FILE_HEADER_SIZE + CORE_HEADER_SIZE;
    let file_size = u64::from(offset) + u64::from(row_size) * u64::from(height);
    let file_size = u32::try_from(file_size).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{width}x{height} image does not fit into a BMP file ({file_size} bytes)"),
        )
    })?;

    let mut header = Vec::with_capacity(offset as usize);
    header.extend_from_slice(b"BM");
    header.extend_from_slice(&file_size.to_le_bytes());
    header.extend_from_slice(&[0; 4]);
    header.extend_from_slice(&offset.to_le_bytes());
    header.extend_from_slice(&CORE_HEADER_SIZE.to_le_bytes());
    // Dimensions come from a SOF header and always fit into 16 bits.
    header.extend_from_slice(&(width as u16).to_le_bytes());
    header.extend_from_slice(&(height as u16).to_le_bytes());
    header.extend_from_slice(&1u16.to_le_bytes());
    header.extend_from_slice(&24u16.to_le_bytes());
    w.write_all(&header)?;

    let mut row = Vec::with_capacity(row_size as usize);
    for y in (0..height as usize).rev() {
        row.clear();
        for px in image.row(y) {
            row.extend_from_slice(&[px.b, px.g, px.r]);
        }
        row.resize(row_size as usize, 0);
        w.write_all(&row)?;
    }

    w.flush()
}

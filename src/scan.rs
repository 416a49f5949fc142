//! Scan Data preprocessing.
//!
//! Before the entropy-coded data of a scan can be fed to the bit reader, this module:
//!
//! - Replaces `0xFF 0x00` byte stuffing sequences with `0xFF`.
//! - Removes `RST` markers, recording where in the output each restart interval begins.
//! - Drops `0xFF` fill bytes preceding a marker.

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct ScanBuffer {
    /// Destuffed entropy-coded bytes, with all markers removed.
    data: Vec<u8>,
    /// Offsets into `data` at which each restart interval starts. The first entry is always 0.
    start_positions: Vec<usize>,
}

impl ScanBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn start_positions(&self) -> &[usize] {
        &self.start_positions
    }

    /// Returns the number of `RST` markers that were removed from the scan data.
    #[inline]
    pub fn restart_markers(&self) -> usize {
        self.start_positions.len() - 1
    }

    /// Processes raw scan data (everything between the SOS segment and the EOI marker).
    pub fn process(&mut self, scan_data: &[u8]) -> Result<()> {
        self.data.clear();
        self.data.reserve(scan_data.len());
        self.start_positions.clear();
        self.start_positions.push(0);

        let mut bytes = scan_data.iter().copied().peekable();
        while let Some(byte) = bytes.next() {
            if byte != 0xff {
                self.data.push(byte);
                continue;
            }

            match bytes.peek().copied() {
                Some(0x00) => {
                    // Byte stuffing sequence, push only `0xFF` to the output.
                    bytes.next();
                    self.data.push(0xff);
                }
                Some(0xD0..=0xD7) => {
                    bytes.next();
                    self.start_positions.push(self.data.len());
                }
                // Fill byte; the next `0xFF` is examined on the next iteration.
                Some(0xff) | None => {}
                Some(inv) => {
                    return Err(Error::structural(format!(
                        "invalid marker 0x{:02x} found in scan data",
                        inv
                    )));
                }
            }
        }

        Ok(())
    }
}

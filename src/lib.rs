//! Baseline JPEG decoder with an uncompressed BMP writer.
//!
//! Decoding happens in two steps: [`ImageData::new`] parses and validates all marker segments
//! and captures the entropy-coded scan data, and [`ImageData::decode`] runs the Huffman decoder,
//! dequantization, inverse DCT and color conversion to produce an [`Image`].

mod bits;
mod block;
mod bmp;
mod color;
mod entropy;
mod error;
mod file;
mod huffman;
mod idct;
mod metadata;
mod quant;
mod scan;


use std::{
    fmt,
    io::Write,
    time::{Duration, Instant},
};

use block::PixelBlock;
use color::ColorLayout;
use file::{JpegParser, SegmentKind, SofMarker};
use huffman::HuffmanTable;
use metadata::{Component, Metadata, QTable};
use scan::ScanBuffer;

pub use color::Rgb;
pub use error::{Error, ErrorKind};

use crate::error::Result;

fn timed<R>(f: impl FnOnce() -> R) -> (R, Duration) {
    let start = Instant::now();
    let r = f();
    (r, start.elapsed())
}

/// A parsed baseline JPEG image, containing everything needed for decoding.
pub struct ImageData {
    metadata: Metadata,
    qtables: [Option<QTable>; 4],
    dc_tables: [Option<HuffmanTable>; 4],
    ac_tables: [Option<HuffmanTable>; 4],
    scan: ScanBuffer,
}

impl ImageData {
    /// Reads [`ImageData`] from an in-memory JPEG file.
    ///
    /// Parsing stops at the first problem. The returned [`Error`]'s [`ErrorKind`] tells apart
    /// malformed files from files using features this decoder does not support.
    pub fn new(jpeg: &[u8]) -> Result<Self> {
        macro_rules! bail {
            ($kind:ident, $($args:tt)*) => {
                return Err(Error::new(ErrorKind::$kind, format!($($args)*)))
            };
        }

        let mut frame: Option<Metadata> = None;
        let mut zero_based = false;
        let mut restart_interval = 0;
        let mut qtables = [None; 4];
        let mut dc_tables: [Option<HuffmanTable>; 4] = Default::default();
        let mut ac_tables: [Option<HuffmanTable>; 4] = Default::default();
        let mut scan = None;

        let mut parser = JpegParser::new(jpeg)?;
        while let Some(segment) = parser.next_segment()? {
            log::debug!(
                "ff {:02x} segment at {:#06x}, {} bytes",
                segment.marker(),
                segment.offset(),
                segment.raw_bytes().len(),
            );

            let Some(kind) = segment.into_segment_kind() else {
                continue;
            };
            match kind {
                SegmentKind::Sof(sof) => {
                    if sof.sof() != SofMarker::SOF0 {
                        bail!(Unsupported, "not a baseline JPEG (SOF={:?})", sof.sof());
                    }
                    if frame.is_some() {
                        bail!(Structural, "encountered multiple SOF markers");
                    }
                    if sof.P() != 8 {
                        bail!(
                            Unsupported,
                            "sample precision of {} bits is not supported",
                            sof.P()
                        );
                    }
                    if sof.X() == 0 || sof.Y() == 0 {
                        bail!(Structural, "invalid image size {}x{}", sof.X(), sof.Y());
                    }
                    if !matches!(sof.components().len(), 1 | 3) {
                        bail!(
                            Unsupported,
                            "frame with {} components not supported (only 1 or 3 components are supported)",
                            sof.components().len()
                        );
                    }

                    zero_based = sof.components()[0].Ci() == 0;
                    if zero_based {
                        log::debug!("component identifiers are zero-based");
                    }

                    let mut components: Vec<Component> = Vec::with_capacity(3);
                    for fc in sof.components() {
                        log::trace!("frame component: {:?}", fc);

                        let id = fc.Ci().wrapping_add(u8::from(zero_based));
                        match id {
                            1..=3 => {}
                            4 | 5 => bail!(Unsupported, "YIQ color (component {id}) is not supported"),
                            _ => bail!(Structural, "invalid component identifier {}", fc.Ci()),
                        }
                        if components.iter().any(|c| c.id == id) {
                            bail!(Structural, "component {id} is defined twice");
                        }
                        if fc.Tqi() > 3 {
                            bail!(
                                Structural,
                                "invalid quantization table selection Tq={} for component {id} (only tables 0-3 are valid)",
                                fc.Tqi()
                            );
                        }
                        if fc.Hi() != 1 || fc.Vi() != 1 {
                            bail!(
                                Unsupported,
                                "sampling factors {}x{} of component {id} are not supported (only 1x1 is)",
                                fc.Hi(),
                                fc.Vi(),
                            );
                        }

                        components.push(Component {
                            id,
                            hsample: fc.Hi(),
                            vsample: fc.Vi(),
                            qtable: fc.Tqi(),
                            dchuff: 0,
                            achuff: 0,
                        });
                    }

                    frame = Some(Metadata {
                        frame_type: sof.sof().byte(),
                        width: sof.X(),
                        height: sof.Y(),
                        restart_interval: 0,
                        components,
                        scan_order: Vec::new(),
                        spectral_start: 0,
                        spectral_end: 63,
                        approx_high: 0,
                        approx_low: 0,
                    });
                }
                SegmentKind::Dqt(dqt) => {
                    for table in dqt.tables() {
                        if table.Pq() > 1 {
                            bail!(
                                Structural,
                                "invalid quantization table precision Pq={} (only 0 and 1 are allowed)",
                                table.Pq()
                            );
                        }
                        if table.Tq() > 3 {
                            bail!(
                                Structural,
                                "invalid quantization table destination Tq={} (0-3 are allowed)",
                                table.Tq()
                            );
                        }
                        log::trace!("{:?}", table);
                        qtables[usize::from(table.Tq())] = Some(QTable::from_zigzag(table.Qk()));
                    }
                }
                SegmentKind::Dht(dht) => {
                    for table in dht.tables() {
                        if table.Tc() > 1 {
                            bail!(
                                Structural,
                                "invalid table class Tc={} (only 0 and 1 are valid)",
                                table.Tc()
                            );
                        }
                        if table.Th() > 3 {
                            bail!(
                                Structural,
                                "invalid huffman table destination Th={} (0-3 are allowed)",
                                table.Th()
                            );
                        }
                        if table.Vij().len() > huffman::MAX_SYMBOLS {
                            bail!(
                                Structural,
                                "huffman table defines {} symbols (at most {} are allowed)",
                                table.Vij().len(),
                                huffman::MAX_SYMBOLS,
                            );
                        }

                        if let Some(len) = huffman::overfull_length(table.Li()) {
                            bail!(
                                Structural,
                                "huffman table {} assigns too many codes of length {}",
                                table.Th(),
                                len,
                            );
                        }

                        let built = HuffmanTable::build(table.Li(), table.Vij());
                        log::trace!(
                            "{} table {}:\n{:?}",
                            if table.Tc() == 0 { "DC" } else { "AC" },
                            table.Th(),
                            built
                        );
                        let tables = if table.Tc() == 0 {
                            &mut dc_tables
                        } else {
                            &mut ac_tables
                        };
                        tables[usize::from(table.Th())] = Some(built);
                    }
                }
                SegmentKind::Dri(dri) => {
                    restart_interval = dri.Ri();
                }
                SegmentKind::Sos(sos) => {
                    let Some(frame) = &mut frame else {
                        bail!(Structural, "SOS not preceded by SOF header");
                    };

                    if sos.Ss() != 0 || sos.Se() != 63 || sos.Ah() != 0 || sos.Al() != 0 {
                        bail!(
                            Unsupported,
                            "non-baseline scan header (Ss={}, Se={}, Ah={}, Al={})",
                            sos.Ss(),
                            sos.Se(),
                            sos.Ah(),
                            sos.Al(),
                        );
                    }

                    let mut scan_order = Vec::with_capacity(frame.components.len());
                    for sc in sos.components() {
                        log::trace!("scan component: {:?}", sc);

                        let id = sc.Csj().wrapping_add(u8::from(zero_based));
                        let Some(index) = frame.components.iter().position(|c| c.id == id) else {
                            bail!(Structural, "scan references undefined component {}", sc.Csj());
                        };
                        if scan_order.contains(&index) {
                            bail!(Structural, "component {id} is listed twice in the scan");
                        }
                        if sc.Tdj() > 3 || sc.Taj() > 3 {
                            bail!(
                                Structural,
                                "invalid huffman table selection Td={} Ta={} for component {id}",
                                sc.Tdj(),
                                sc.Taj(),
                            );
                        }

                        let component = &mut frame.components[index];
                        component.dchuff = sc.Tdj();
                        component.achuff = sc.Taj();
                        scan_order.push(index);
                    }
                    if scan_order.len() != frame.components.len() {
                        bail!(
                            Unsupported,
                            "scan with {} of {} components (multi-scan images are not supported)",
                            scan_order.len(),
                            frame.components.len(),
                        );
                    }

                    frame.scan_order = scan_order;
                    frame.restart_interval = restart_interval;
                    frame.spectral_start = sos.Ss();
                    frame.spectral_end = sos.Se();
                    frame.approx_high = sos.Ah();
                    frame.approx_low = sos.Al();

                    let mut buffer = ScanBuffer::new();
                    buffer.process(sos.data())?;
                    log::debug!(
                        "{} bytes of scan data at {:#06x} ({} after destuffing, {} RST markers)",
                        sos.data().len(),
                        sos.data_offset(),
                        buffer.data().len(),
                        buffer.restart_markers(),
                    );
                    scan = Some(buffer);
                }
                SegmentKind::App(app) => log::trace!("skipping APP{} segment", app.n()),
                SegmentKind::Com(_) => {}
            }
        }

        let (Some(metadata), Some(scan)) = (frame, scan) else {
            bail!(Structural, "missing SOF/SOS marker");
        };

        let this = Self {
            metadata,
            qtables,
            dc_tables,
            ac_tables,
            scan,
        };

        // Every table a component refers to has to exist before decoding starts.
        for c in &this.metadata.components {
            this.qtable(c)?;
            this.dc_table(c)?;
            this.ac_table(c)?;
        }

        Ok(this)
    }

    fn qtable(&self, c: &Component) -> Result<&QTable> {
        self.qtables[usize::from(c.qtable)].as_ref().ok_or_else(|| {
            Error::structural(format!(
                "component {} uses undefined quantization table {}",
                c.id, c.qtable
            ))
        })
    }

    fn dc_table(&self, c: &Component) -> Result<&HuffmanTable> {
        self.dc_tables[usize::from(c.dchuff)].as_ref().ok_or_else(|| {
            Error::structural(format!(
                "component {} uses undefined DC huffman table {}",
                c.id, c.dchuff
            ))
        })
    }

    fn ac_table(&self, c: &Component) -> Result<&HuffmanTable> {
        self.ac_tables[usize::from(c.achuff)].as_ref().ok_or_else(|| {
            Error::structural(format!(
                "component {} uses undefined AC huffman table {}",
                c.id, c.achuff
            ))
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.metadata.width.into()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.metadata.height.into()
    }

    /// Returns the number of color components (1 for grayscale, 3 for YCbCr).
    #[inline]
    pub fn component_count(&self) -> usize {
        self.metadata.components.len()
    }

    /// Returns the restart interval in blocks, or 0 if restart markers are not used.
    #[inline]
    pub fn restart_interval(&self) -> u16 {
        self.metadata.restart_interval
    }

    /// Decodes the scan data into an [`Image`].
    pub fn decode(&self) -> Result<Image> {
        let meta = &self.metadata;

        let mut components = Vec::with_capacity(meta.scan_order.len());
        for &index in &meta.scan_order {
            let c = &meta.components[index];
            components.push(entropy::ScanComponent {
                plane: c.plane(),
                dc_table: self.dc_table(c)?,
                ac_table: self.ac_table(c)?,
            });
        }

        let (blocks, t_entropy) = timed(|| {
            entropy::decode_scan(
                self.scan.data(),
                &components,
                meta.block_count(),
                meta.restart_interval,
                self.scan.start_positions(),
            )
        });
        let mut blocks = blocks?;

        let mut qtables = Vec::with_capacity(meta.components.len());
        for c in &meta.components {
            qtables.push((c.plane(), self.qtable(c)?));
        }
        let (dequantized, t_dequantize) = timed(|| -> Result<()> {
            for (index, block) in blocks.iter_mut().enumerate() {
                for &(plane, table) in &qtables {
                    quant::dequantize(block, plane, table)
                        .map_err(|e| Error::decode(format!("block {index}: {e}")))?;
                }
            }
            Ok(())
        });
        dequantized?;

        let planes: Vec<usize> = meta.components.iter().map(Component::plane).collect();
        let layout = match &*meta.components {
            [gray] => ColorLayout::Grayscale(gray.plane()),
            _ => ColorLayout::YCbCr,
        };

        let mut pixels = Vec::new();
        pixels.try_reserve_exact(blocks.len()).map_err(|e| {
            Error::new(
                ErrorKind::Resource,
                format!("failed to allocate {} pixel blocks: {e}", blocks.len()),
            )
        })?;
        let ((), t_idct_color) = timed(|| {
            pixels.extend(
                blocks
                    .into_iter()
                    .map(|block| color::convert(&idct::inverse_dct(block, &planes), layout)),
            );
        });

        log::trace!(
            "t_entropy={t_entropy:?}, t_dequantize={t_dequantize:?}, t_idct_color={t_idct_color:?}"
        );

        Ok(Image {
            width: meta.width,
            height: meta.height,
            blocks_wide: meta.blocks_wide(),
            blocks: pixels,
        })
    }
}

/// Prints all parsed tables and header fields.
impl fmt::Display for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = &self.metadata;
        writeln!(
            f,
            "frame: SOF{}, {}x{} pixels, {}x{} blocks",
            meta.frame_type & 0xf,
            meta.width,
            meta.height,
            meta.blocks_wide(),
            meta.blocks_tall(),
        )?;
        writeln!(f, "restart interval: {}", meta.restart_interval)?;
        for c in &meta.components {
            writeln!(
                f,
                "component {}: {}x{} sampling, quantization table {}, DC table {}, AC table {}",
                c.id, c.hsample, c.vsample, c.qtable, c.dchuff, c.achuff,
            )?;
        }

        for (id, table) in self.qtables.iter().enumerate() {
            let Some(table) = table else { continue };
            writeln!(f, "quantization table {id}:")?;
            for row in table.values.chunks(8) {
                write!(f, "  ")?;
                for v in row {
                    write!(f, "{v:4}")?;
                }
                writeln!(f)?;
            }
        }

        for (class, tables) in [("DC", &self.dc_tables), ("AC", &self.ac_tables)] {
            for (id, table) in tables.iter().enumerate() {
                let Some(table) = table else { continue };
                writeln!(f, "{class} table {id}:")?;
                for len in 1..=16 {
                    let symbols = table.symbols_of_length(len);
                    if symbols.is_empty() {
                        continue;
                    }
                    write!(f, "  {len} bits:")?;
                    for sym in symbols {
                        write!(f, " {sym:02x}")?;
                    }
                    writeln!(f)?;
                }
            }
        }

        writeln!(
            f,
            "scan: Ss={} Se={} Ah={} Al={}",
            meta.spectral_start, meta.spectral_end, meta.approx_high, meta.approx_low,
        )?;
        writeln!(
            f,
            "entropy-coded data: {} bytes, {} RST markers",
            self.scan.data().len(),
            self.scan.restart_markers(),
        )
    }
}

/// A decoded image.
///
/// Pixels are stored as 8x8 blocks; the blocks on the right and bottom edges may extend past
/// the image size.
#[derive(Debug, Clone)]
pub struct Image {
    width: u16,
    height: u16,
    blocks_wide: usize,
    blocks: Vec<PixelBlock>,
}

impl Image {
    #[inline]
    pub fn width(&self) -> u32 {
        self.width.into()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height.into()
    }

    /// Returns the pixel at `(x, y)`, with `(0, 0)` being the top left corner.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside of the image.
    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        assert!(
            x < self.width() && y < self.height(),
            "pixel ({x}, {y}) is outside of the {}x{} image",
            self.width,
            self.height,
        );
        let (x, y) = (x as usize, y as usize);
        self.blocks[(y / 8) * self.blocks_wide + x / 8].pixels[(y % 8) * 8 + x % 8]
    }

    /// Returns the pixels of row `y`, cropped to the image width.
    pub(crate) fn row(&self, y: usize) -> impl Iterator<Item = Rgb> + '_ {
        self.blocks[(y / 8) * self.blocks_wide..][..self.blocks_wide]
            .iter()
            .flat_map(move |block| block.row(y % 8).iter().copied())
            .take(self.width.into())
    }

    /// Returns the image as tightly packed, row-major RGB bytes.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(usize::from(self.width) * usize::from(self.height));
        for y in 0..usize::from(self.height) {
            out.extend(self.row(y));
        }
        bytemuck::cast_slice(&out).to_vec()
    }

    /// Writes the image as an uncompressed 24-bit BMP file.
    pub fn write_bmp<W: Write>(&self, writer: W) -> Result<()> {
        bmp::write(self, writer)?;
        Ok(())
    }
}

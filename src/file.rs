//! JPEG/JFIF marker segment parser.

#![allow(non_snake_case)]

#[cfg(test)]
mod tests;

use std::{fmt, marker::PhantomData, mem};

use bytemuck::{AnyBitPattern, Pod, Zeroable};

use crate::error::{Error, Result};

pub struct JpegParser<'a> {
    reader: Reader<'a>,
    /// Set once the SOS segment (and the scan data following it) has been read.
    finished: bool,
}

impl<'a> JpegParser<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        let mut reader = Reader { buf, position: 0 };
        if reader.read_u8()? != 0xFF || reader.read_u8()? != 0xD8 {
            return Err(Error::structural(
                "JPEG image does not start with SOI marker",
            ));
        }
        Ok(Self {
            reader,
            finished: false,
        })
    }

    /// Reads the next [`Segment`] from the JPEG data.
    ///
    /// Only a single scan is supported: the SOS segment is the last segment returned, and it
    /// carries all entropy-coded data up to the EOI marker. Returns `Ok(None)` after that.
    pub fn next_segment(&mut self) -> Result<Option<Segment<'a>>> {
        if self.finished {
            return Ok(None);
        }

        let offset = self.reader.position;
        let byte = self.reader.read_u8()?;
        if byte != 0xff {
            return Err(Error::structural(format!(
                "expected marker at offset {offset:#06x}, found byte {byte:02x}"
            )));
        }

        // Any number of 0xFF fill bytes may precede the marker.
        let mut marker = self.reader.read_u8()?;
        while marker == 0xff {
            marker = self.reader.read_u8()?;
        }
        let segment_offset = self.reader.position - 2;

        match marker {
            0xD9 => return Err(Error::structural("EOI marker before SOS")),
            0xD8 => return Err(Error::unsupported("embedded JPEG images are not supported")),
            0xCC => return Err(Error::unsupported("arithmetic coding (DAC) is not supported")),
            0xC8 => return Err(Error::unsupported("JPG extension marker is not supported")),
            0xD0..=0xD7 => {
                return Err(Error::structural(format!(
                    "RST{} marker before SOS",
                    marker - 0xD0
                )))
            }
            0xC0..=0xCF | 0xDA..=0xDF | 0xE0..=0xEF | 0xF0..=0xFE => {}
            _ => {
                return Err(Error::structural(format!(
                    "unknown marker ff {marker:02x}"
                )))
            }
        }

        // Every remaining marker is followed by the segment length.
        let length = usize::from(self.reader.read_length()?);
        let expected_end = self.reader.position + length;
        let mut reader = Reader {
            buf: &self.reader.buf[..expected_end],
            position: self.reader.position,
        };
        let kind = match marker {
            0xDB => Some(self.read_dqt(&mut reader).map(SegmentKind::Dqt)),
            0xC4 => Some(self.read_dht(&mut reader).map(SegmentKind::Dht)),
            0xC0..=0xCF => Some(self.read_sof(marker, &mut reader).map(SegmentKind::Sof)),
            0xDA => Some(self.read_sos(&mut reader).map(SegmentKind::Sos)),
            0xDD => Some(self.read_dri(&mut reader).map(SegmentKind::Dri)),
            0xE0..=0xEF => {
                reader.position = expected_end;
                Some(Ok(SegmentKind::App(App { n: marker - 0xE0 })))
            }
            0xFE => Some(self.read_com(&mut reader).map(SegmentKind::Com)),
            // DNL, DHP, EXP, JPGn: skipped.
            _ => {
                reader.position = expected_end;
                None
            }
        }
        .transpose()
        .map_err(|_| {
            Error::structural(format!(
                "ff {marker:02x} segment with length {length} is too short for its contents",
            ))
        })?;

        if reader.position < expected_end {
            return Err(Error::structural(format!(
                "ff {:02x} segment specified a length of {} bytes, but {} remain after decoding",
                marker,
                length,
                expected_end - reader.position,
            )));
        }
        self.reader.position = expected_end;

        let mut kind = kind;
        if let Some(SegmentKind::Sos(sos)) = &mut kind {
            sos.data = self.read_scan_data()?;
            self.finished = true;
        }

        Ok(Some(Segment {
            marker,
            raw_bytes: &self.reader.buf[segment_offset + 4..][..length],
            offset: segment_offset,
            kind,
        }))
    }

    /// Returns the remaining (unparsed) bytes of the input data.
    #[cfg(test)]
    pub fn remaining(&self) -> &'a [u8] {
        self.reader.remaining()
    }

    fn read_dqt(&mut self, reader: &mut Reader<'a>) -> Result<Dqt<'a>> {
        let mut tables = Vec::new();
        while !reader.remaining().is_empty() {
            let PqTq = reader.read_u8()?;
            let size = if PqTq >> 4 == 0 { 64 } else { 128 };
            tables.push(QuantizationTable {
                PqTq,
                Qk: reader.read_slice(size)?,
            });
        }
        Ok(Dqt(tables))
    }

    fn read_dht(&mut self, reader: &mut Reader<'a>) -> Result<Dht<'a>> {
        let mut tables = Vec::new();

        while !reader.remaining().is_empty() {
            let header: &DhtHeader = reader.read_obj()?;
            let values = reader.read_slice(header.num_values())?;
            tables.push(HuffmanTable {
                header,
                Vij: values,
            });
        }

        Ok(Dht { tables })
    }

    fn read_sof(&mut self, sof: u8, reader: &mut Reader<'a>) -> Result<Sof<'a>> {
        let P = reader.read_u8()?;
        let Y = reader.read_u16()?;
        let X = reader.read_u16()?;
        let num_components = reader.read_u8()?;
        let components = reader.read_objs::<FrameComponent>(num_components.into())?;
        Ok(Sof {
            sof: SofMarker(sof),
            P,
            Y,
            X,
            components,
        })
    }

    fn read_sos(&mut self, reader: &mut Reader<'a>) -> Result<Sos<'a>> {
        let num_components = reader.read_u8()?;
        let components = reader.read_objs(num_components.into())?;
        let Ss = reader.read_u8()?;
        let Se = reader.read_u8()?;
        let AhAl = reader.read_u8()?;

        Ok(Sos {
            components,
            Ss,
            Se,
            AhAl,
            data_offset: reader.position,
            data: &[],
        })
    }

    /// Reads the entropy-coded data following the SOS segment, up to the EOI marker.
    ///
    /// The returned data still contains stuffed bytes, `RST` markers and fill bytes. The reader
    /// is left positioned after the EOI marker.
    fn read_scan_data(&mut self) -> Result<&'a [u8]> {
        let premature_end =
            |_: Error| Error::structural("scan data ended before EOI marker was found");

        let data_start = self.reader.position;
        let data_end = loop {
            while self.reader.peek_u8(0).map_err(premature_end)? != 0xff {
                self.reader.position += 1;
            }

            let mut offset = 1;
            let mut byte = self.reader.peek_u8(offset).map_err(premature_end)?;
            while byte == 0xff {
                offset += 1;
                byte = self.reader.peek_u8(offset).map_err(premature_end)?;
            }

            match byte {
                0x00 | 0xD0..=0xD7 => {
                    self.reader.position += offset + 1;
                }
                0xD9 => {
                    // Fill bytes before EOI are kept; the scan buffer drops them.
                    let end = self.reader.position + offset - 1;
                    self.reader.position += offset + 1;
                    break end;
                }
                _ => {
                    return Err(Error::structural(format!(
                        "unexpected marker ff {byte:02x} in scan data"
                    )));
                }
            }
        };

        if !self.reader.remaining().is_empty() {
            log::warn!(
                "ignoring {} trailing bytes after EOI",
                self.reader.remaining().len()
            );
        }

        Ok(&self.reader.buf[data_start..data_end])
    }

    fn read_dri(&mut self, reader: &mut Reader<'a>) -> Result<Dri<'a>> {
        let Ri = reader.read_u16()?;
        Ok(Dri {
            Ri,
            _p: PhantomData,
        })
    }

    fn read_com(&mut self, reader: &mut Reader<'a>) -> Result<Com<'a>> {
        Ok(Com {
            com: reader.read_slice(reader.remaining().len())?,
        })
    }
}

#[derive(Debug)]
struct Reader<'a> {
    buf: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> &'a [u8] {
        &self.buf[self.position..]
    }

    fn end_of_data() -> Error {
        Error::structural("reached end of data while decoding JPEG stream")
    }

    fn peek_u8(&self, offset: usize) -> Result<u8> {
        self.buf
            .get(self.position + offset)
            .copied()
            .ok_or_else(Self::end_of_data)
    }

    fn read_u8(&mut self) -> Result<u8> {
        let byte = self.peek_u8(0)?;
        self.position += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = [self.read_u8()?, self.read_u8()?];
        Ok(u16::from_be_bytes(b))
    }

    fn read_slice(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining().len() < count {
            Err(Self::end_of_data())
        } else {
            let slice = &self.remaining()[..count];
            self.position += count;
            Ok(slice)
        }
    }

    fn read_obj<T: AnyBitPattern>(&mut self) -> Result<&'a T> {
        let bytes = self.read_slice(mem::size_of::<T>())?;
        Ok(bytemuck::from_bytes(bytes))
    }

    fn read_objs<T: AnyBitPattern>(&mut self, count: usize) -> Result<&'a [T]> {
        let bytes = self.read_slice(count * mem::size_of::<T>())?;
        Ok(bytemuck::cast_slice(bytes))
    }

    fn read_length(&mut self) -> Result<u16> {
        // Length parameter is the length of the segment parameters, including the length parameter,
        // but excluding the FF xx marker.

        let len = self.read_u16()?;
        if len < 2 {
            return Err(Error::structural(format!("invalid segment length {len}")));
        }
        if self.remaining().len() < (len - 2).into() {
            return Err(Self::end_of_data());
        }
        Ok(len - 2)
    }
}

/// A segment of a JPEG file, introduced by a `0xFF 0xXX` marker.
#[derive(Debug)]
pub struct Segment<'a> {
    marker: u8,
    raw_bytes: &'a [u8],
    offset: usize,
    kind: Option<SegmentKind<'a>>,
}

impl<'a> Segment<'a> {
    /// Returns the offset of the segment's `0xFF 0xXX` marker in the input buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the value of the marker byte indicating the type of the segment.
    #[inline]
    pub fn marker(&self) -> u8 {
        self.marker
    }

    /// The raw bytes making up this segment, exluding the `0xFF 0xXX` marker and the segment length
    /// indication.
    ///
    /// For an SOS segment this does not include any of the entropy-coded data following the
    /// segment.
    #[inline]
    pub fn raw_bytes(&self) -> &[u8] {
        self.raw_bytes
    }

    #[cfg(test)]
    pub fn as_segment_kind(&self) -> Option<&SegmentKind<'a>> {
        self.kind.as_ref()
    }

    #[inline]
    pub fn into_segment_kind(self) -> Option<SegmentKind<'a>> {
        self.kind
    }
}

/// An application-specific segment (`APPn`). Its contents are ignored.
#[derive(Debug)]
pub struct App {
    n: u8,
}

impl App {
    /// Returns the type of APP marker (the `n` in `APPn`), in range `0..=15`.
    #[inline]
    pub fn n(&self) -> u8 {
        self.n
    }
}

pub struct Com<'a> {
    com: &'a [u8],
}

impl<'a> fmt::Debug for Com<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Com(\"{}\")", self.com.escape_ascii())
    }
}

/// Enumeration of segment kinds understood by this parser.
#[derive(Debug)]
#[non_exhaustive]
pub enum SegmentKind<'a> {
    Dqt(Dqt<'a>),
    Dht(Dht<'a>),
    Dri(Dri<'a>),
    Sof(Sof<'a>),
    Sos(Sos<'a>),
    App(App),
    Com(Com<'a>),
}

pub struct QuantizationTable<'a> {
    PqTq: u8,
    Qk: &'a [u8],
}

impl<'a> QuantizationTable<'a> {
    /// Returns the quantization table element precision.
    ///
    /// - 0: 8-bit `Qk` values
    /// - 1: 16-bit `Qk` values
    #[inline]
    pub fn Pq(&self) -> u8 {
        self.PqTq >> 4
    }

    /// Returns the destination identifier (0-3).
    #[inline]
    pub fn Tq(&self) -> u8 {
        self.PqTq & 0xf
    }

    /// Returns the 64 quantization table elements, in zigzag order.
    pub fn Qk(&self) -> impl Iterator<Item = u16> + 'a {
        let wide = self.Pq() != 0;
        let qk = self.Qk;
        (0..64).map(move |i| {
            if wide {
                u16::from_be_bytes([qk[2 * i], qk[2 * i + 1]])
            } else {
                u16::from(qk[i])
            }
        })
    }
}

impl<'a> fmt::Debug for QuantizationTable<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuantizationTable")
            .field("Pq", &self.Pq())
            .field("Tq", &self.Tq())
            .field("Qk", &self.Qk().collect::<Vec<_>>())
            .finish()
    }
}

/// **D**efine **Q**uantization **T**ables – sets one or more [`QuantizationTable`]s.
#[derive(Debug)]
pub struct Dqt<'a>(Vec<QuantizationTable<'a>>);

impl<'a> Dqt<'a> {
    #[inline]
    pub fn tables(&self) -> impl Iterator<Item = &QuantizationTable<'a>> {
        self.0.iter()
    }
}

#[derive(Clone, Copy, AnyBitPattern)]
#[repr(C)]
struct DhtHeader {
    TcTh: u8,
    Li: [u8; 16],
}

impl DhtHeader {
    fn num_values(&self) -> usize {
        self.Li.iter().map(|l| *l as usize).sum()
    }
}

pub struct HuffmanTable<'a> {
    header: &'a DhtHeader,
    Vij: &'a [u8],
}

impl<'a> HuffmanTable<'a> {
    /// Returns the table class (0 = DC, 1 = AC).
    #[inline]
    pub fn Tc(&self) -> u8 {
        self.header.TcTh >> 4
    }

    /// Returns the table destination identifier (0-3).
    #[inline]
    pub fn Th(&self) -> u8 {
        self.header.TcTh & 0xf
    }

    /// Returns an array containing the number of codes of each length.
    #[inline]
    pub fn Li(&self) -> &[u8; 16] {
        &self.header.Li
    }

    /// Returns the values associated with each huffman code.
    #[inline]
    pub fn Vij(&self) -> &[u8] {
        self.Vij
    }
}

impl<'a> fmt::Debug for HuffmanTable<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuffmanTable")
            .field("Tc", &self.Tc())
            .field("Th", &self.Th())
            .field("Li", &self.Li())
            .field("Vij", &self.Vij)
            .finish()
    }
}

/// **DHT** Define Huffman Tables – defines one or more [`HuffmanTable`]s.
#[derive(Debug)]
pub struct Dht<'a> {
    tables: Vec<HuffmanTable<'a>>,
}

impl<'a> Dht<'a> {
    pub fn tables(&self) -> impl Iterator<Item = &HuffmanTable<'a>> {
        self.tables.iter()
    }
}

/// **D**efine **R**estart **I**nterval.
///
/// This segment enables the use of *Restart Intervals* and sets the number of MCUs contained in
/// each of them ([`Dri::Ri`]). At the start of each restart interval, the DC predictors are reset
/// and the entropy-coded data restarts on a byte boundary.
#[derive(Clone, Copy)]
pub struct Dri<'a> {
    Ri: u16,
    _p: PhantomData<&'a ()>,
}

impl<'a> Dri<'a> {
    /// Returns the number of MCUs contained in each restart interval.
    #[inline]
    pub fn Ri(&self) -> u16 {
        self.Ri
    }
}

impl<'a> fmt::Debug for Dri<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dri").field("Ri", &self.Ri).finish()
    }
}

/// **SOF** Start Of Frame
#[derive(Debug)]
pub struct Sof<'a> {
    /// The SOF marker.
    sof: SofMarker,
    /// Sample precision in bits.
    P: u8,
    Y: u16,
    X: u16,
    components: &'a [FrameComponent],
}

impl<'a> Sof<'a> {
    #[inline]
    pub fn sof(&self) -> SofMarker {
        self.sof
    }

    /// Returns the sample precision in bits.
    #[inline]
    pub fn P(&self) -> u8 {
        self.P
    }

    /// Returns the number of lines in the image (the height of the frame).
    #[inline]
    pub fn Y(&self) -> u16 {
        self.Y
    }

    /// Returns the number of samples per line (the width of the frame).
    #[inline]
    pub fn X(&self) -> u16 {
        self.X
    }

    #[inline]
    pub fn components(&self) -> &'a [FrameComponent] {
        self.components
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SofMarker(u8);

impl fmt::Debug for SofMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                write!(f, "SOF{}", self.0 - 0xC0)
            }
            _ => f
                .debug_tuple("SofMarker")
                .field(&format_args!("{:02x}", self.0))
                .finish(),
        }
    }
}

impl SofMarker {
    /// Baseline DCT.
    pub const SOF0: Self = Self(0xC0);

    #[inline]
    pub fn byte(self) -> u8 {
        self.0
    }
}

#[derive(Clone, Copy, Zeroable, Pod)]
#[repr(C)]
pub struct FrameComponent {
    Ci: u8,
    HiVi: u8,
    Tqi: u8,
}

impl FrameComponent {
    /// Returns this component's component identifier.
    ///
    /// The scan header ([`Sos`]) refers to components using their identifier.
    #[inline]
    pub fn Ci(&self) -> u8 {
        self.Ci
    }

    /// Returns the horizontal subsampling factor for this component.
    #[inline]
    pub fn Hi(&self) -> u8 {
        self.HiVi >> 4
    }

    /// Returns the vertical subsampling factor for this component.
    #[inline]
    pub fn Vi(&self) -> u8 {
        self.HiVi & 0xf
    }

    /// Returns the index of the quantization table to use for this component.
    ///
    /// Valid values are 0-3.
    #[inline]
    pub fn Tqi(&self) -> u8 {
        self.Tqi
    }
}

impl fmt::Debug for FrameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameComponent")
            .field("Ci", &self.Ci)
            .field("Hi", &self.Hi())
            .field("Vi", &self.Vi())
            .field("Tqi", &self.Tqi)
            .finish()
    }
}

/// **SOS** Start Of Scan – a scan header, followed by entropy-coded scan data.
pub struct Sos<'a> {
    components: &'a [ScanComponent],
    Ss: u8,
    Se: u8,
    AhAl: u8,
    data_offset: usize,
    data: &'a [u8],
}

impl<'a> Sos<'a> {
    #[inline]
    pub fn components(&self) -> &'a [ScanComponent] {
        self.components
    }

    #[inline]
    pub fn Ss(&self) -> u8 {
        self.Ss
    }

    #[inline]
    pub fn Se(&self) -> u8 {
        self.Se
    }

    #[inline]
    pub fn Ah(&self) -> u8 {
        self.AhAl >> 4
    }

    #[inline]
    pub fn Al(&self) -> u8 {
        self.AhAl & 0xf
    }

    /// Returns the offset of the scan data in the original JPEG stream.
    #[inline]
    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    /// Returns the data in this scan up to the EOI marker, including any contained `RST` markers
    /// and stuffed bytes.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

impl<'a> fmt::Debug for Sos<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sos")
            .field("components", &self.components)
            .field("Ss", &self.Ss)
            .field("Se", &self.Se)
            .field("Ah", &self.Ah())
            .field("Al", &self.Al())
            .field("data", &self.data)
            .finish()
    }
}

#[derive(Clone, Copy, AnyBitPattern)]
#[repr(C)]
pub struct ScanComponent {
    Csj: u8,
    TdjTaj: u8,
}

impl ScanComponent {
    /// Returns the scan component selector.
    #[inline]
    pub fn Csj(&self) -> u8 {
        self.Csj
    }

    /// Returns the DC entropy coding table destination selector.
    #[inline]
    pub fn Tdj(&self) -> u8 {
        self.TdjTaj >> 4
    }

    /// Returns the AC entropy coding table destination selector.
    #[inline]
    pub fn Taj(&self) -> u8 {
        self.TdjTaj & 0xf
    }
}

impl fmt::Debug for ScanComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanComponent")
            .field("Csj", &self.Csj)
            .field("Tdj", &self.Tdj())
            .field("Taj", &self.Taj())
            .finish()
    }
}

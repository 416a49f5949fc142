use std::fmt::Write;

use expect_test::{expect, Expect};

use crate::file::SegmentKind;

use super::JpegParser;

/// 8x8 frame with a single component.
const FRAME: &[u8] = &[
    0xFF, 0xC0, // SOF0
    0x00, 0x0B, // length
    0x08, // P
    0x00, 0x08, 0x00, 0x08, // Y, X
    0x01, // Nf
    0x01, 0x11, 0x00, // Ci, HiVi, Tqi
];

/// Scan header, one byte of scan data and EOI.
const SCAN: &[u8] = &[
    0xFF, 0xDA, // SOS
    0x00, 0x08, // length
    0x01, // Ns
    0x01, 0x00, // Csj, TdjTaj
    0x00, 0x3F, 0x00, // Ss, Se, AhAl
    0x3F, // scan data
    0xFF, 0xD9, // EOI
];

fn jpeg(segments: &[&[u8]]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    for segment in segments {
        out.extend_from_slice(segment);
    }
    out
}

fn dump(jpeg: &[u8]) -> String {
    fn dump_impl(jpeg: &[u8], out: &mut String) -> super::Result<()> {
        let mut parser = JpegParser::new(jpeg)?;

        while let Some(segment) = parser.next_segment()? {
            write!(
                out,
                "{:04X} [FF {:02X}] ",
                segment.offset(),
                segment.marker(),
            )
            .unwrap();

            match segment.as_segment_kind() {
                Some(kind) => {
                    write!(out, "{:?}", kind).unwrap();
                    match kind {
                        SegmentKind::App(_) => {
                            // APP contents are not parsed, so dump their bytes.
                            writeln!(out, " {:x?}", segment.raw_bytes()).unwrap();
                        }
                        _ => writeln!(out).unwrap(),
                    }
                }
                None => writeln!(out, "{:x?}", segment.raw_bytes()).unwrap(),
            }
        }

        if !parser.remaining().is_empty() {
            writeln!(
                out,
                "{} trailing bytes: {:x?}",
                parser.remaining().len(),
                parser.remaining()
            )
            .unwrap();
        }
        Ok(())
    }

    let mut out = String::new();
    if let Err(e) = dump_impl(jpeg, &mut out) {
        writeln!(out, "error: {e}").unwrap();
    }

    out
}

fn check(jpeg: &[u8], expect: Expect) {
    expect.assert_eq(&dump(jpeg));
}

#[test]
fn empty() {
    check(
        &[0xFF],
        expect![[r#"
            error: reached end of data while decoding JPEG stream
        "#]],
    );
    check(
        &[0xFF, 0xD8 /* SOI */],
        expect![[r#"
            error: reached end of data while decoding JPEG stream
        "#]],
    );
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xD9, // EOI
        ],
        expect![[r#"
            error: EOI marker before SOS
        "#]],
    );
    check(
        &[0x89, 0x50, 0x4E, 0x47],
        expect![[r#"
            error: JPEG image does not start with SOI marker
        "#]],
    );
}

#[test]
fn minimal() {
    check(
        &jpeg(&[FRAME, SCAN]),
        expect![[r#"
            0002 [FF C0] Sof(Sof { sof: SOF0, P: 8, Y: 8, X: 8, components: [FrameComponent { Ci: 1, Hi: 1, Vi: 1, Tqi: 0 }] })
            000F [FF DA] Sos(Sos { components: [ScanComponent { Csj: 1, Tdj: 0, Taj: 0 }], Ss: 0, Se: 63, Ah: 0, Al: 0, data: [63] })
        "#]],
    );
}

#[test]
fn app() {
    check(
        &jpeg(&[
            &[
                0xFF, 0xE0, // APP0
                0x00, 0x02, // empty
            ],
            FRAME,
            SCAN,
        ]),
        expect![[r#"
            0002 [FF E0] App(App { n: 0 }) []
            0006 [FF C0] Sof(Sof { sof: SOF0, P: 8, Y: 8, X: 8, components: [FrameComponent { Ci: 1, Hi: 1, Vi: 1, Tqi: 0 }] })
            0013 [FF DA] Sos(Sos { components: [ScanComponent { Csj: 1, Tdj: 0, Taj: 0 }], Ss: 0, Se: 63, Ah: 0, Al: 0, data: [63] })
        "#]],
    );
    check(
        &jpeg(&[
            &[
                0xFF, 0xE1, // APP1
                0x00, 0x04, // 2 more bytes after this
                0x00, 0x00, // APP1 contents
                0xFF, 0xFE, // COM
                0x00, 0x04, // length
                b'h', b'i', // comment
                0xFF, 0xDD, // DRI
                0x00, 0x04, // length
                0x00, 0x0F, // Ri
            ],
            FRAME,
            SCAN,
        ]),
        expect![[r#"
            0002 [FF E1] App(App { n: 1 }) [0, 0]
            0008 [FF FE] Com(Com("hi"))
            000E [FF DD] Dri(Dri { Ri: 15 })
            0014 [FF C0] Sof(Sof { sof: SOF0, P: 8, Y: 8, X: 8, components: [FrameComponent { Ci: 1, Hi: 1, Vi: 1, Tqi: 0 }] })
            0021 [FF DA] Sos(Sos { components: [ScanComponent { Csj: 1, Tdj: 0, Taj: 0 }], Ss: 0, Se: 63, Ah: 0, Al: 0, data: [63] })
        "#]],
    );
}

#[test]
fn fill_bytes() {
    check(
        &jpeg(&[
            &[
                0xFF, 0xFF, 0xFF, // fill bytes
                0xFF, 0xDD, // DRI
                0x00, 0x04, // length
                0x00, 0x01, // Ri
            ],
            FRAME,
            SCAN,
        ]),
        expect![[r#"
            0005 [FF DD] Dri(Dri { Ri: 1 })
            000B [FF C0] Sof(Sof { sof: SOF0, P: 8, Y: 8, X: 8, components: [FrameComponent { Ci: 1, Hi: 1, Vi: 1, Tqi: 0 }] })
            0018 [FF DA] Sos(Sos { components: [ScanComponent { Csj: 1, Tdj: 0, Taj: 0 }], Ss: 0, Se: 63, Ah: 0, Al: 0, data: [63] })
        "#]],
    );
}

#[test]
fn dht() {
    check(
        &jpeg(&[
            &[
                0xFF, 0xC4, // DHT
                0x00, 0x17, // length
                0x10, // TcTh
                0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // Li
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // Li
                0x00, 0xF0, 0x11, // Vij
            ],
            FRAME,
            SCAN,
        ]),
        expect![[r#"
            0002 [FF C4] Dht(Dht { tables: [HuffmanTable { Tc: 1, Th: 0, Li: [0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1], Vij: [0, 240, 17] }] })
            001B [FF C0] Sof(Sof { sof: SOF0, P: 8, Y: 8, X: 8, components: [FrameComponent { Ci: 1, Hi: 1, Vi: 1, Tqi: 0 }] })
            0028 [FF DA] Sos(Sos { components: [ScanComponent { Csj: 1, Tdj: 0, Taj: 0 }], Ss: 0, Se: 63, Ah: 0, Al: 0, data: [63] })
        "#]],
    );
}

#[test]
fn dqt_16bit() {
    let mut dqt = vec![
        0xFF, 0xDB, // DQT
        0x00, 0x83, // length
        0x11, // PqTq
    ];
    for i in 0..64u16 {
        dqt.extend_from_slice(&(i * 256 + 1).to_be_bytes());
    }
    let out = dump(&jpeg(&[&dqt, FRAME, SCAN]));
    let first = out.lines().next().unwrap();
    assert!(
        first.starts_with("0002 [FF DB] Dqt(Dqt([QuantizationTable { Pq: 1, Tq: 1, Qk: [1, 257, 513,"),
        "{first}"
    );
    assert!(first.ends_with("16129] }]))"), "{first}");
}

#[test]
fn scan_data() {
    // Stuffed bytes, RST markers and fill bytes are all part of the raw scan data.
    check(
        &jpeg(&[
            FRAME,
            &[
                0xFF, 0xDA, // SOS
                0x00, 0x08, // length
                0x01, // Ns
                0x01, 0x00, // Csj, TdjTaj
                0x00, 0x3F, 0x00, // Ss, Se, AhAl
                0x12, 0xFF, 0x00, // stuffed byte
                0xFF, 0xD0, // RST0
                0x34, 0xFF, // fill byte
                0xFF, 0xD9, // EOI
                0x00, // trailing
            ],
        ]),
        expect![[r#"
            0002 [FF C0] Sof(Sof { sof: SOF0, P: 8, Y: 8, X: 8, components: [FrameComponent { Ci: 1, Hi: 1, Vi: 1, Tqi: 0 }] })
            000F [FF DA] Sos(Sos { components: [ScanComponent { Csj: 1, Tdj: 0, Taj: 0 }], Ss: 0, Se: 63, Ah: 0, Al: 0, data: [18, 255, 0, 255, 208, 52, 255] })
            1 trailing bytes: [0]
        "#]],
    );
}

#[test]
fn length_errors() {
    check(
        &jpeg(&[&[
            0xFF, 0xDD, // DRI
            0x00, 0x05, // length
            0x00, 0x0F, 0x00, // Ri + extra byte
        ]]),
        expect![[r#"
            error: ff dd segment specified a length of 3 bytes, but 1 remain after decoding
        "#]],
    );
    check(
        &jpeg(&[&[
            0xFF, 0xDD, // DRI
            0x00, 0x03, // length
            0x00, // half of Ri
        ]]),
        expect![[r#"
            error: ff dd segment with length 1 is too short for its contents
        "#]],
    );
    check(
        &jpeg(&[&[
            0xFF, 0xDD, // DRI
            0x00, 0x01, // length
        ]]),
        expect![[r#"
            error: invalid segment length 1
        "#]],
    );
    check(
        &jpeg(&[&[
            0xFF, 0xE0, // APP0
            0x00, 0x10, // length past the end of the file
            0x00,
        ]]),
        expect![[r#"
            error: reached end of data while decoding JPEG stream
        "#]],
    );
}

#[test]
fn marker_errors() {
    check(
        &jpeg(&[&[0xFF, 0xD0]]),
        expect![[r#"
            error: RST0 marker before SOS
        "#]],
    );
    check(
        &jpeg(&[&[0xFF, 0xD8]]),
        expect![[r#"
            error: embedded JPEG images are not supported
        "#]],
    );
    check(
        &jpeg(&[&[0xFF, 0xCC, 0x00, 0x02]]),
        expect![[r#"
            error: arithmetic coding (DAC) is not supported
        "#]],
    );
    check(
        &jpeg(&[&[0xFF, 0x01]]),
        expect![[r#"
            error: unknown marker ff 01
        "#]],
    );
    check(
        &jpeg(&[&[0x00]]),
        expect![[r#"
            error: expected marker at offset 0x0002, found byte 00
        "#]],
    );
}

#[test]
fn scan_errors() {
    // Scan header without EOI.
    check(
        &jpeg(&[FRAME, &SCAN[..SCAN.len() - 2]]),
        expect![[r#"
            error: scan data ended before EOI marker was found
        "#]],
    );
    check(
        &jpeg(&[FRAME, &SCAN[..SCAN.len() - 1]]),
        expect![[r#"
            error: scan data ended before EOI marker was found
        "#]],
    );
    check(
        &jpeg(&[
            FRAME,
            &SCAN[..SCAN.len() - 2],
            &[0xFF, 0xC4, 0xFF, 0xD9],
        ]),
        expect![[r#"
            error: unexpected marker ff c4 in scan data
        "#]],
    );
}

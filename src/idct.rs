//! Separable 8x8 inverse DCT.
//!
//! Uses the Arai–Agui–Nakajima factorization: every 1-D pass pre-scales its eight inputs and then
//! runs a butterfly network with five multiplications. Columns are transformed first, then rows.

use crate::block::{Block, Coefficients, Samples};

/// Input scale factors, indexed by frequency: `1 / sqrt(8)` for DC, `cos(k * pi / 16) / 2` otherwise.
const S: [f32; 8] = [
    0.353_553_39,
    0.490_392_64,
    0.461_939_77,
    0.415_734_8,
    0.353_553_39,
    0.277_785_12,
    0.191_341_72,
    0.097_545_16,
];

/// `2 * cos(pi / 4)`
const M1: f32 = 1.414_213_6;
/// `2 * cos(pi / 8) - 2 * cos(3 * pi / 8)`
const M2: f32 = 1.082_392_2;
/// `2 * cos(pi / 4)`
const M3: f32 = 1.414_213_6;
/// `2 * cos(pi / 8) + 2 * cos(3 * pi / 8)`
const M4: f32 = 2.613_126;
/// `2 * cos(3 * pi / 8)`
const M5: f32 = 0.765_366_85;

/// Transforms 8 values of one row or column.
fn idct_1d(input: [f32; 8]) -> [f32; 8] {
    let g0 = input[0] * S[0];
    let g1 = input[4] * S[4];
    let g2 = input[2] * S[2];
    let g3 = input[6] * S[6];
    let g4 = input[5] * S[5];
    let g5 = input[1] * S[1];
    let g6 = input[7] * S[7];
    let g7 = input[3] * S[3];

    let f4 = g4 - g7;
    let f5 = g5 + g6;
    let f6 = g5 - g6;
    let f7 = g4 + g7;

    let e2 = g2 - g3;
    let e3 = g2 + g3;
    let e5 = f5 - f7;
    let e7 = f5 + f7;
    let e8 = f4 + f6;

    let d2 = e2 * M1;
    let d4 = f4 * M2;
    let d5 = e5 * M3;
    let d6 = f6 * M4;
    let d8 = e8 * M5;

    let c0 = g0 + g1;
    let c1 = g0 - g1;
    let c2 = d2 - e3;
    let c4 = d4 + d8;
    let c5 = d5 + e7;
    let c6 = d6 - d8;
    let c8 = c5 - c6;

    let b0 = c0 + e3;
    let b1 = c1 + c2;
    let b2 = c1 - c2;
    let b3 = c0 - e3;
    let b4 = c4 - c8;
    let b5 = c8;
    let b6 = c6 - e7;
    let b7 = e7;

    [
        b0 + b7,
        b1 + b6,
        b2 + b5,
        b3 + b4,
        b3 - b4,
        b2 - b5,
        b1 - b6,
        b0 - b7,
    ]
}

/// Transforms one plane of coefficients into spatial samples, in place.
///
/// Results are rounded to the nearest integer, with halves rounded up.
pub fn idct_8x8(plane: &mut [i32; 64]) {
    let mut tmp = [0.0f32; 64];

    for col in 0..8 {
        let input = std::array::from_fn(|row| plane[row * 8 + col] as f32);
        for (row, v) in idct_1d(input).into_iter().enumerate() {
            tmp[row * 8 + col] = v;
        }
    }

    for row in 0..8 {
        let input = std::array::from_fn(|col| tmp[row * 8 + col]);
        for (col, v) in idct_1d(input).into_iter().enumerate() {
            plane[row * 8 + col] = (v + 0.5).floor() as i32;
        }
    }
}

/// Runs the inverse DCT on the listed planes of `block`.
///
/// Planes not listed (the chroma planes of a grayscale image) are passed through untouched.
pub fn inverse_dct(mut block: Block<Coefficients>, planes: &[usize]) -> Block<Samples> {
    for &plane in planes {
        idct_8x8(block.plane_mut(plane));
    }
    block.into_phase()
}

use bytemuck::{Pod, Zeroable};

use crate::block::{Block, PixelBlock, Samples};

/// An 8-bit RGB pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn gray(level: u8) -> Self {
        Self::new(level, level, level)
    }
}

/// How the planes of a block map to output colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorLayout {
    /// A single luma plane, stored at the given plane index.
    Grayscale(usize),
    /// Y, Cb and Cr in planes 0, 1 and 2.
    YCbCr,
}

#[inline]
fn clamp(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

/// Converts the level-shifted samples of `block` to RGB pixels.
pub fn convert(block: &Block<Samples>, layout: ColorLayout) -> PixelBlock {
    let mut out = PixelBlock::zeroed();
    match layout {
        ColorLayout::Grayscale(plane) => {
            for (px, &y) in out.pixels.iter_mut().zip(block.plane(plane)) {
                *px = Rgb::gray(clamp(y as f32 + 128.0));
            }
        }
        ColorLayout::YCbCr => {
            let (ys, cbs, crs) = (block.plane(0), block.plane(1), block.plane(2));
            for (i, px) in out.pixels.iter_mut().enumerate() {
                let (y, cb, cr) = (ys[i] as f32, cbs[i] as f32, crs[i] as f32);
                *px = Rgb {
                    r: clamp(y + 1.402 * cr + 128.0),
                    g: clamp(y - 0.344136 * cb - 0.714136 * cr + 128.0),
                    b: clamp(y + 1.772 * cb + 128.0),
                };
            }
        }
    }
    out
}

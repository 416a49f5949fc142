//! 8x8 blocks moving through the decode pipeline.
//!
//! A [`Block`] holds one 64-sample plane per color component. The phase parameter records what
//! the planes currently contain, so that pipeline stages can only be applied in order:
//!
//! - [`Coefficients`]: quantized and then dequantized DCT coefficients, in natural order.
//! - [`Samples`]: spatial-domain Y/Cb/Cr samples, centered around 0.
//!
//! The color converter turns a `Block<Samples>` into a [`PixelBlock`].

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};

use crate::color::Rgb;

/// Frequency-domain coefficients, in natural (row-major) order.
#[derive(Debug)]
pub enum Coefficients {}

/// Spatial-domain samples after the inverse DCT.
#[derive(Debug)]
pub enum Samples {}

pub struct Block<P> {
    planes: [[i32; 64]; 3],
    _phase: PhantomData<P>,
}

impl<P> Block<P> {
    #[inline]
    pub fn plane(&self, index: usize) -> &[i32; 64] {
        &self.planes[index]
    }

    #[inline]
    pub fn plane_mut(&mut self, index: usize) -> &mut [i32; 64] {
        &mut self.planes[index]
    }

    /// Reinterprets the planes as belonging to a later pipeline phase.
    pub(crate) fn into_phase<Q>(self) -> Block<Q> {
        Block {
            planes: self.planes,
            _phase: PhantomData,
        }
    }
}

impl Block<Coefficients> {
    pub fn new() -> Self {
        Self {
            planes: [[0; 64]; 3],
            _phase: PhantomData,
        }
    }
}

impl Default for Block<Coefficients> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for Block<P> {
    fn clone(&self) -> Self {
        Self {
            planes: self.planes,
            _phase: PhantomData,
        }
    }
}

impl<P> std::fmt::Debug for Block<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("phase", &std::any::type_name::<P>())
            .field("planes", &self.planes)
            .finish()
    }
}

/// 8x8 RGB pixels, stored row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct PixelBlock {
    pub pixels: [Rgb; 64],
}

impl PixelBlock {
    #[cfg(test)]
    pub fn filled(color: Rgb) -> Self {
        Self {
            pixels: [color; 64],
        }
    }

    /// Returns row `y` (0-7) of the block.
    #[inline]
    pub fn row(&self, y: usize) -> &[Rgb] {
        &self.pixels[y * 8..][..8]
    }
}

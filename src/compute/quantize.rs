//! Per-pixel palette index mapping.

use rayon::prelude::*;

use super::{PaletteIndexTable, Rect};
use crate::schema::Frame;

/// One palette index per pixel, row-major, same size as its source frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedFrame {
    width: u32,
    height: u32,
    indices: Vec<u8>,
}

impl QuantizedFrame {
    /// Wrap an index buffer. Returns `None` if its length is not `width * height`.
    pub fn new(width: u32, height: u32, indices: Vec<u8>) -> Option<Self> {
        (indices.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            indices,
        })
    }

    pub(crate) fn from_raw(width: u32, height: u32, indices: Vec<u8>) -> Self {
        debug_assert_eq!(indices.len(), width as usize * height as usize);
        Self {
            width,
            height,
            indices,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    #[inline]
    pub fn indices_mut(&mut self) -> &mut [u8] {
        &mut self.indices
    }

    pub fn into_indices(self) -> Vec<u8> {
        self.indices
    }

    /// Copy out the sub-rectangle `rect`, clamped to the frame.
    pub fn crop(&self, rect: Rect) -> QuantizedFrame {
        let right = rect.right.min(self.width);
        let bottom = rect.bottom.min(self.height);
        let left = rect.left.min(right);
        let top = rect.top.min(bottom);
        let width = right - left;
        let height = bottom - top;

        let stride = self.width as usize;
        let mut indices = Vec::with_capacity(width as usize * height as usize);
        for y in top as usize..bottom as usize {
            let row = y * stride;
            indices.extend_from_slice(&self.indices[row + left as usize..row + right as usize]);
        }

        QuantizedFrame {
            width,
            height,
            indices,
        }
    }

    /// Render the raw index bytes as an opaque grayscale RGBA8 image.
    pub fn to_grayscale_rgba(&self) -> Vec<u8> {
        self.indices.iter().flat_map(|&i| [i, i, i, 255]).collect()
    }
}

/// Maps frames to palette indices through a [`PaletteIndexTable`].
pub struct FrameQuantizer;

impl FrameQuantizer {
    /// Quantize every pixel of `frame`. Alpha is ignored.
    pub fn quantize(frame: &Frame, table: &PaletteIndexTable) -> QuantizedFrame {
        let indices = frame
            .pixels()
            .par_iter()
            .map(|&pixel| table.lookup(pixel))
            .collect();

        QuantizedFrame {
            width: frame.width(),
            height: frame.height(),
            indices,
        }
    }
}

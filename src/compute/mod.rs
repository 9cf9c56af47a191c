//! Compute module - Color reduction stages for animated frames.

mod backend;
mod distance;
mod histogram;
mod lab;
mod lookup;
mod palette;
mod quantize;
mod temporal;

pub mod gpu;

pub use backend::*;
pub use distance::*;
pub use histogram::*;
pub use lab::*;
pub use lookup::*;
pub use palette::*;
pub use quantize::*;
pub use temporal::*;

use crate::schema::{ConfigError, Frame, FrameError};
use gpu::GpuError;

/// Error type for the quantization pipeline.
#[derive(Debug, thiserror::Error)]
pub enum QuantizeError {
    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid frame: {0}")]
    Frame(#[from] FrameError),

    #[error(
        "Frame is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}"
    )]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Frame source produced no frames")]
    EmptyInput,

    #[error("Palette holds {0} colors, at most 255 fit next to the transparent slot")]
    PaletteOverflow(usize),

    #[error("Palette must contain at least one color")]
    EmptyPalette,

    #[error("Distance matrix for {0} colors is too large")]
    DistanceMatrixTooLarge(usize),

    #[error("Distance matrix covers {matrix} colors but {colors} were supplied")]
    DistanceMatrixMismatch { colors: usize, matrix: usize },

    #[error("Lookup table holds {0} cells, expected 256^3")]
    LookupTableSize(usize),

    #[error("Lookup table references palette index {0}, which is not an opaque entry")]
    PaletteIndexOutOfRange(u8),

    #[error("Temporal tracker has no previous frame")]
    TrackerUninitialized,

    #[error("Temporal tracker already holds a previous frame")]
    TrackerAlreadyInitialized,
}

/// Fail with [`QuantizeError::DimensionMismatch`] unless `frame` is `width` x `height`.
pub(crate) fn ensure_dimensions(frame: &Frame, width: u32, height: u32) -> Result<(), QuantizeError> {
    if frame.dimensions() != (width, height) {
        return Err(QuantizeError::DimensionMismatch {
            expected_width: width,
            expected_height: height,
            actual_width: frame.width(),
            actual_height: frame.height(),
        });
    }
    Ok(())
}

//! Configuration types for the quantization pipeline.

use serde::{Deserialize, Serialize};

use super::Scene;

/// Largest number of opaque palette entries; one more slot is reserved for transparency.
pub const MAX_PALETTE_COLORS: usize = 255;

fn default_max_palette_size() -> usize {
    MAX_PALETTE_COLORS
}

fn default_merge_threshold() -> f32 {
    3.0
}

fn default_min_frame_delay() -> u16 {
    2
}

/// Which implementation runs the data-parallel stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Rayon thread pool on the host.
    #[default]
    Cpu,
    /// wgpu compute shaders.
    Gpu,
}

/// Palette construction and frame emission parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantizerConfig {
    /// Maximum number of opaque palette entries (1-255).
    #[serde(default = "default_max_palette_size")]
    pub max_palette_size: usize,
    /// Lab distance below which two candidate colors are merged.
    #[serde(default = "default_merge_threshold")]
    pub merge_threshold: f32,
    /// Compute backend.
    #[serde(default)]
    pub backend: Backend,
    /// Smallest delay written for an emitted frame, in hundredths of a second.
    #[serde(default = "default_min_frame_delay")]
    pub min_frame_delay: u16,
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            max_palette_size: default_max_palette_size(),
            merge_threshold: default_merge_threshold(),
            backend: Backend::default(),
            min_frame_delay: default_min_frame_delay(),
        }
    }
}

impl QuantizerConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_palette_size == 0 || self.max_palette_size > MAX_PALETTE_COLORS {
            return Err(ConfigError::InvalidPaletteSize(self.max_palette_size));
        }
        if !self.merge_threshold.is_finite() || self.merge_threshold < 0.0 {
            return Err(ConfigError::InvalidMergeThreshold(self.merge_threshold));
        }
        Ok(())
    }
}

/// Everything the command-line tool needs for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub quantizer: QuantizerConfig,
    #[serde(default)]
    pub scene: Scene,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quantizer.validate()?;
        self.scene.validate()
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Palette size must be between 1 and {MAX_PALETTE_COLORS}, got {0}")]
    InvalidPaletteSize(usize),
    #[error("Merge threshold must be a finite non-negative distance, got {0}")]
    InvalidMergeThreshold(f32),
    #[error("Scene dimensions (width, height) must be non-zero")]
    InvalidDimensions,
    #[error("Scene must contain at least one frame")]
    NoFrames,
    #[error("Layer {layer} opacity {opacity} is outside 0.0-1.0")]
    InvalidOpacity { layer: usize, opacity: f32 },
}

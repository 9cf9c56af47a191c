//! Frame sources: where composited frames come from.

use log::debug;

use crate::compute::{QuantizeError, ensure_dimensions};
use crate::schema::{ComposedFrame, Scene};

/// Supplies the composited frames of one animation.
///
/// Every frame must be `width()` x `height()`.
pub trait FrameSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// All frames with their display durations, in playback order.
    fn frames(&mut self) -> Result<Vec<ComposedFrame>, QuantizeError>;
}

/// Frames already held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    width: u32,
    height: u32,
    frames: Vec<ComposedFrame>,
}

impl MemorySource {
    /// Wrap `frames`, which must be non-empty and share one size.
    pub fn new(frames: Vec<ComposedFrame>) -> Result<Self, QuantizeError> {
        let (width, height) = frames
            .first()
            .map(|f| f.frame.dimensions())
            .ok_or(QuantizeError::EmptyInput)?;
        for composed in &frames {
            ensure_dimensions(&composed.frame, width, height)?;
        }
        Ok(Self {
            width,
            height,
            frames,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for MemorySource {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn frames(&mut self) -> Result<Vec<ComposedFrame>, QuantizeError> {
        Ok(self.frames.clone())
    }
}

impl FrameSource for Scene {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn frames(&mut self) -> Result<Vec<ComposedFrame>, QuantizeError> {
        self.validate()?;
        let frames = self.render()?;
        debug!(
            "Rendered {} scene frames at {}x{}",
            frames.len(),
            self.width,
            self.height
        );
        Ok(frames)
    }
}

//! Container sinks: where indexed frames go.

use crate::compute::{Palette, QuantizeError, QuantizedFrame};
use crate::schema::{Color, Frame};

/// Animation-wide data handed to the container before any frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationInfo {
    pub width: u32,
    pub height: u32,
    /// Color table, to be written in exactly this order.
    pub palette: Palette,
}

impl AnimationInfo {
    #[inline]
    pub fn transparent_index(&self) -> u8 {
        self.palette.transparent_index()
    }
}

/// One emitted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Placement of the index rectangle on the canvas.
    pub left: u32,
    pub top: u32,
    /// Palette indices of the dirty rectangle (the whole canvas for the first frame).
    pub indices: QuantizedFrame,
    /// Display time in hundredths of a second.
    pub delay: u16,
    /// Whether `indices` may contain the transparent index.
    pub uses_transparency: bool,
}

/// Receives the quantized animation. Container encoding lives behind this trait.
pub trait ContainerSink {
    fn begin(&mut self, info: &AnimationInfo) -> Result<(), QuantizeError>;
    fn write_frame(&mut self, frame: EncodedFrame) -> Result<(), QuantizeError>;
    fn finish(&mut self) -> Result<(), QuantizeError>;
}

/// Collects everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    info: Option<AnimationInfo>,
    frames: Vec<EncodedFrame>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self) -> Option<&AnimationInfo> {
        self.info.as_ref()
    }

    pub fn frames(&self) -> &[EncodedFrame] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Replay the emitted frames onto a canvas the way a decoder would,
    /// returning the visible image after each frame.
    ///
    /// Transparent indices leave the canvas untouched.
    pub fn composite(&self) -> Vec<Frame> {
        let Some(info) = &self.info else {
            return Vec::new();
        };
        let transparent = info.transparent_index();
        let width = info.width as usize;
        let mut canvas = vec![Color::TRANSPARENT; width * info.height as usize];

        self.frames
            .iter()
            .filter_map(|frame| {
                let rect_width = frame.indices.width() as usize;
                for (row, chunk) in frame.indices.indices().chunks(rect_width.max(1)).enumerate() {
                    let y = frame.top as usize + row;
                    for (col, &index) in chunk.iter().enumerate() {
                        if frame.uses_transparency && index == transparent {
                            continue;
                        }
                        let x = frame.left as usize + col;
                        canvas[y * width + x] = info.palette.get(index).unwrap_or(Color::TRANSPARENT);
                    }
                }
                Frame::new(info.width, info.height, canvas.clone()).ok()
            })
            .collect()
    }
}

impl ContainerSink for MemorySink {
    fn begin(&mut self, info: &AnimationInfo) -> Result<(), QuantizeError> {
        self.info = Some(info.clone());
        self.frames.clear();
        self.finished = false;
        Ok(())
    }

    fn write_frame(&mut self, frame: EncodedFrame) -> Result<(), QuantizeError> {
        self.frames.push(frame);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), QuantizeError> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_applies_offsets_and_transparency() {
        let palette = Palette::new(vec![Color::BLACK, Color::WHITE]).unwrap();
        let t = palette.transparent_index();
        let mut sink = MemorySink::new();
        sink.begin(&AnimationInfo {
            width: 3,
            height: 2,
            palette,
        })
        .unwrap();

        sink.write_frame(EncodedFrame {
            left: 0,
            top: 0,
            indices: QuantizedFrame::new(3, 2, vec![0; 6]).unwrap(),
            delay: 10,
            uses_transparency: false,
        })
        .unwrap();
        sink.write_frame(EncodedFrame {
            left: 1,
            top: 1,
            indices: QuantizedFrame::new(2, 1, vec![1, t]).unwrap(),
            delay: 10,
            uses_transparency: true,
        })
        .unwrap();
        sink.finish().unwrap();

        let frames = sink.composite();
        assert!(sink.is_finished());
        assert_eq!(frames.len(), 2);
        assert!(frames[0].pixels().iter().all(|&c| c == Color::BLACK));
        assert_eq!(frames[1].pixel(1, 1), Color::WHITE);
        assert_eq!(frames[1].pixel(2, 1), Color::BLACK);
        assert_eq!(frames[1].pixel(0, 0), Color::BLACK);
    }
}

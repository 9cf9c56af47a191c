//! Inter-frame diffing: dirty rectangles and transparency injection.

use log::trace;
use rayon::prelude::*;

use super::{QuantizeError, QuantizedFrame, ensure_dimensions};
use crate::schema::{Color, Frame};

/// Half-open pixel rectangle `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    /// The whole `width` x `height` area.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    /// The empty starting box that any included pixel shrinks into place.
    pub fn inverted(width: u32, height: u32) -> Self {
        Self {
            left: width,
            top: height,
            right: 0,
            bottom: 0,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Grow to include pixel (x, y).
    #[inline]
    pub fn include(&mut self, x: u32, y: u32) {
        self.left = self.left.min(x);
        self.top = self.top.min(y);
        self.right = self.right.max(x + 1);
        self.bottom = self.bottom.max(y + 1);
    }

    /// Smallest rectangle containing both.
    pub fn union(self, other: Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// Outcome of comparing a frame against its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffResult {
    /// Pixels whose raw color changed.
    pub differing_pixels: u64,
    /// Bounding box of the changed pixels; inverted when nothing changed.
    pub bounds: Rect,
}

impl DiffResult {
    fn unchanged(width: u32, height: u32) -> Self {
        Self {
            differing_pixels: 0,
            bounds: Rect::inverted(width, height),
        }
    }

    fn merge(self, other: DiffResult) -> DiffResult {
        DiffResult {
            differing_pixels: self.differing_pixels + other.differing_pixels,
            bounds: self.bounds.union(other.bounds),
        }
    }

    /// True when no pixel changed, so the frame need not be emitted.
    #[inline]
    pub fn is_redundant(&self) -> bool {
        self.differing_pixels == 0
    }

    /// Region to emit: the dirty rectangle, at least 1x1 and inside the frame.
    pub fn crop_rect(&self, width: u32, height: u32) -> Rect {
        if self.bounds.is_empty() {
            return Rect {
                left: 0,
                top: 0,
                right: width.min(1),
                bottom: height.min(1),
            };
        }
        Rect {
            left: self.bounds.left,
            top: self.bounds.top,
            right: self.bounds.right.min(width),
            bottom: self.bounds.bottom.min(height),
        }
    }
}

enum TrackerState {
    Uninitialized,
    Tracking { previous: Vec<Color> },
}

/// Keeps the previous frame's raw colors and diffs each new frame against it.
///
/// Starts out `Uninitialized`; [`TemporalDiffTracker::init_previous`] moves it
/// to tracking, after which [`TemporalDiffTracker::process_input`] may run.
pub struct TemporalDiffTracker {
    width: u32,
    height: u32,
    state: TrackerState,
}

impl TemporalDiffTracker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: TrackerState::Uninitialized,
        }
    }

    #[inline]
    pub fn is_tracking(&self) -> bool {
        matches!(self.state, TrackerState::Tracking { .. })
    }

    /// Store the first frame as the reference. No diff is computed for it.
    pub fn init_previous(&mut self, frame: &Frame) -> Result<(), QuantizeError> {
        if self.is_tracking() {
            return Err(QuantizeError::TrackerAlreadyInitialized);
        }
        ensure_dimensions(frame, self.width, self.height)?;
        self.state = TrackerState::Tracking {
            previous: frame.pixels().to_vec(),
        };
        Ok(())
    }

    /// Diff `frame` against the reference.
    ///
    /// Unchanged pixels of `quantized` are overwritten with `transparent_index`.
    /// The reference then becomes `frame`.
    pub fn process_input(
        &mut self,
        frame: &Frame,
        transparent_index: u8,
        quantized: &mut QuantizedFrame,
    ) -> Result<DiffResult, QuantizeError> {
        let TrackerState::Tracking { previous } = &mut self.state else {
            return Err(QuantizeError::TrackerUninitialized);
        };
        ensure_dimensions(frame, self.width, self.height)?;
        if (quantized.width(), quantized.height()) != (self.width, self.height) {
            return Err(QuantizeError::DimensionMismatch {
                expected_width: self.width,
                expected_height: self.height,
                actual_width: quantized.width(),
                actual_height: quantized.height(),
            });
        }

        let (width, height) = (self.width, self.height);
        let stride = width as usize;

        let result = previous
            .par_chunks_mut(stride)
            .zip(frame.pixels().par_chunks(stride))
            .zip(quantized.indices_mut().par_chunks_mut(stride))
            .enumerate()
            .map(|(y, ((prev_row, cur_row), index_row))| {
                let mut row = DiffResult::unchanged(width, height);
                for (x, ((prev, &cur), index)) in prev_row
                    .iter_mut()
                    .zip(cur_row)
                    .zip(index_row.iter_mut())
                    .enumerate()
                {
                    if *prev == cur {
                        *index = transparent_index;
                    } else {
                        row.differing_pixels += 1;
                        row.bounds.include(x as u32, y as u32);
                        *prev = cur;
                    }
                }
                row
            })
            .reduce(|| DiffResult::unchanged(width, height), DiffResult::merge);

        trace!(
            "Diff: {} pixels changed, bounds {:?}",
            result.differing_pixels, result.bounds
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{FrameQuantizer, Palette, PaletteIndexTable};

    const RED: Color = Color::rgb(255, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);

    fn quantize(frame: &Frame) -> (QuantizedFrame, u8) {
        let palette = Palette::new(vec![RED, BLUE, Color::WHITE]).unwrap();
        let table = PaletteIndexTable::build(&palette);
        (FrameQuantizer::quantize(frame, &table), palette.transparent_index())
    }

    #[test]
    fn test_identical_frames_are_redundant() {
        let frame = Frame::filled(8, 8, RED).unwrap();
        let mut tracker = TemporalDiffTracker::new(8, 8);
        tracker.init_previous(&frame).unwrap();

        let (mut quantized, transparent) = quantize(&frame);
        let diff = tracker.process_input(&frame, transparent, &mut quantized).unwrap();

        assert!(diff.is_redundant());
        assert_eq!(diff.bounds, Rect::inverted(8, 8));
        assert!(quantized.indices().iter().all(|&i| i == transparent));
    }

    #[test]
    fn test_single_pixel_change() {
        let first = Frame::filled(100, 100, Color::WHITE).unwrap();
        let mut second = first.clone();
        second.set_pixel(5, 5, BLUE);

        let mut tracker = TemporalDiffTracker::new(100, 100);
        tracker.init_previous(&first).unwrap();
        let (mut quantized, transparent) = quantize(&second);
        let diff = tracker.process_input(&second, transparent, &mut quantized).unwrap();

        assert_eq!(diff.differing_pixels, 1);
        assert_eq!(
            diff.bounds,
            Rect {
                left: 5,
                top: 5,
                right: 6,
                bottom: 6
            }
        );
        assert_eq!(quantized.indices()[5 * 100 + 5], 1);
        assert_eq!(
            quantized.indices().iter().filter(|&&i| i == transparent).count(),
            100 * 100 - 1
        );
    }

    #[test]
    fn test_reference_advances_each_frame() {
        let a = Frame::filled(4, 4, RED).unwrap();
        let mut b = a.clone();
        b.set_pixel(0, 0, BLUE);
        b.set_pixel(3, 2, BLUE);

        let mut tracker = TemporalDiffTracker::new(4, 4);
        tracker.init_previous(&a).unwrap();

        let (mut qb, t) = quantize(&b);
        let diff = tracker.process_input(&b, t, &mut qb).unwrap();
        assert_eq!(diff.differing_pixels, 2);
        assert_eq!(
            diff.bounds,
            Rect {
                left: 0,
                top: 0,
                right: 4,
                bottom: 3
            }
        );

        // Same frame again: nothing changed relative to b
        let (mut qb2, t) = quantize(&b);
        assert!(tracker.process_input(&b, t, &mut qb2).unwrap().is_redundant());
    }

    #[test]
    fn test_alpha_change_counts_as_difference() {
        let a = Frame::filled(2, 2, RED).unwrap();
        let mut b = a.clone();
        b.set_pixel(1, 1, Color::rgba(255, 0, 0, 10));

        let mut tracker = TemporalDiffTracker::new(2, 2);
        tracker.init_previous(&a).unwrap();
        let (mut qb, t) = quantize(&b);
        assert_eq!(tracker.process_input(&b, t, &mut qb).unwrap().differing_pixels, 1);
    }

    #[test]
    fn test_state_machine() {
        let frame = Frame::filled(2, 2, RED).unwrap();
        let mut tracker = TemporalDiffTracker::new(2, 2);
        assert!(!tracker.is_tracking());

        let (mut q, t) = quantize(&frame);
        assert!(matches!(
            tracker.process_input(&frame, t, &mut q),
            Err(QuantizeError::TrackerUninitialized)
        ));

        tracker.init_previous(&frame).unwrap();
        assert!(tracker.is_tracking());
        assert!(matches!(
            tracker.init_previous(&frame),
            Err(QuantizeError::TrackerAlreadyInitialized)
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut tracker = TemporalDiffTracker::new(2, 2);
        assert!(matches!(
            tracker.init_previous(&Frame::filled(3, 2, RED).unwrap()),
            Err(QuantizeError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_crop_rect_is_at_least_one_pixel() {
        let diff = DiffResult::unchanged(10, 10);
        assert_eq!(
            diff.crop_rect(10, 10),
            Rect {
                left: 0,
                top: 0,
                right: 1,
                bottom: 1
            }
        );

        let mut bounds = Rect::inverted(10, 10);
        bounds.include(9, 2);
        let diff = DiffResult {
            differing_pixels: 1,
            bounds,
        };
        assert_eq!(diff.crop_rect(10, 10), bounds);
        assert_eq!((bounds.width(), bounds.height()), (1, 1));
    }
}

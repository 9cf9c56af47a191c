//! Global color histogram over a set of frames.

use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;
use rayon::prelude::*;

use super::{QuantizeError, ensure_dimensions};
use crate::schema::{CUBE_CELLS, Color, Frame};

/// A distinct color and how many pixels across all frames carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCount {
    pub color: Color,
    pub count: u32,
}

/// Dense tally of every RGB triple observed across a frame set.
///
/// Counting happens in a 256^3 grid of atomic counters indexed by
/// [`Color::cube_index`]. Alpha never participates.
pub struct ColorHistogram {
    tally: Vec<AtomicU32>,
}

impl Default for ColorHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorHistogram {
    /// Allocate a zeroed tally grid.
    pub fn new() -> Self {
        let tally = std::iter::repeat_with(|| AtomicU32::new(0))
            .take(CUBE_CELLS)
            .collect();
        Self { tally }
    }

    /// Tally every pixel of every frame and return the non-zero cells.
    ///
    /// All frames must share the first frame's dimensions. Entries come out in
    /// grid-scan order (ascending cube index), not sorted by count.
    pub fn generate(&mut self, frames: &[Frame]) -> Result<Vec<ColorCount>, QuantizeError> {
        let Some(first) = frames.first() else {
            return Ok(Vec::new());
        };
        for frame in frames {
            ensure_dimensions(frame, first.width(), first.height())?;
        }

        self.clear();
        self.tally_frames(frames);

        let distinct = self.distinct_colors();
        let mut counts = Vec::with_capacity(distinct);
        counts.par_extend(
            self.tally
                .par_iter()
                .enumerate()
                .filter_map(|(cell, count)| {
                    let count = count.load(Ordering::Relaxed);
                    (count != 0).then(|| ColorCount {
                        color: Color::from_cube_index(cell),
                        count,
                    })
                }),
        );

        debug!(
            "Histogram: {} frames, {} distinct colors",
            frames.len(),
            counts.len()
        );
        Ok(counts)
    }

    /// Count of one RGB triple from the most recent [`ColorHistogram::generate`].
    pub fn count_of(&self, color: Color) -> u32 {
        self.tally[color.cube_index()].load(Ordering::Relaxed)
    }

    fn clear(&mut self) {
        self.tally
            .par_iter_mut()
            .for_each(|cell| *cell.get_mut() = 0);
    }

    fn tally_frames(&self, frames: &[Frame]) {
        frames.par_iter().for_each(|frame| {
            frame.pixels().par_iter().for_each(|pixel| {
                self.tally[pixel.cube_index()].fetch_add(1, Ordering::Relaxed);
            });
        });
    }

    fn distinct_colors(&self) -> usize {
        self.tally
            .par_iter()
            .filter(|cell| cell.load(Ordering::Relaxed) != 0)
            .count()
    }
}

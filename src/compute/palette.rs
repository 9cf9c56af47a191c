//! Palette selection and the final palette with its transparency slot.

use log::{debug, trace};

use super::{ColorCount, DistanceMatrix, QuantizeError};
use crate::schema::{Color, MAX_PALETTE_COLORS, QuantizerConfig};

/// Ordered palette of opaque colors followed by one transparent sentinel.
///
/// The sentinel always sits at `transparent_index() == colors().len()` and is
/// written to the container's color table as [`Color::TRANSPARENT`]. The
/// encoder must write [`Palette::entries`] in exactly this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<Color>,
}

impl Palette {
    /// Build a palette from at most 255 opaque colors.
    pub fn new(colors: Vec<Color>) -> Result<Self, QuantizeError> {
        if colors.is_empty() {
            return Err(QuantizeError::EmptyPalette);
        }
        if colors.len() > MAX_PALETTE_COLORS {
            return Err(QuantizeError::PaletteOverflow(colors.len()));
        }
        let mut entries = colors;
        entries.push(Color::TRANSPARENT);
        Ok(Self { entries })
    }

    /// All entries including the transparent sentinel.
    #[inline]
    pub fn entries(&self) -> &[Color] {
        &self.entries
    }

    /// Opaque entries only.
    #[inline]
    pub fn colors(&self) -> &[Color] {
        &self.entries[..self.entries.len() - 1]
    }

    /// Total number of entries, sentinel included (at most 256).
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; a palette holds at least one color plus the sentinel.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn transparent_index(&self) -> u8 {
        (self.entries.len() - 1) as u8
    }

    #[inline]
    pub fn get(&self, index: u8) -> Option<Color> {
        self.entries.get(index as usize).copied()
    }

    /// Map palette indices back to colors; the sentinel expands to [`Color::TRANSPARENT`].
    pub fn expand(&self, indices: &[u8]) -> Vec<Color> {
        indices
            .iter()
            .map(|&i| self.get(i).unwrap_or(Color::TRANSPARENT))
            .collect()
    }

    /// Color table as packed RGB triplets, in palette order.
    pub fn to_rgb_table(&self) -> Vec<u8> {
        self.entries.iter().flat_map(|c| [c.r, c.g, c.b]).collect()
    }
}

/// Greedy frequency-then-distance palette reduction.
///
/// Keeps the most frequent colors and, walking them from most to least
/// frequent, drops the nearest remaining neighbor of each visited color when
/// it lies closer than the merge threshold.
#[derive(Debug, Clone, Copy)]
pub struct PaletteSelector {
    max_palette_size: usize,
    merge_threshold: f32,
}

impl PaletteSelector {
    pub fn new(max_palette_size: usize, merge_threshold: f32) -> Self {
        Self {
            max_palette_size: max_palette_size.min(MAX_PALETTE_COLORS),
            merge_threshold,
        }
    }

    pub fn from_config(config: &QuantizerConfig) -> Self {
        Self::new(config.max_palette_size, config.merge_threshold)
    }

    pub fn max_palette_size(&self) -> usize {
        self.max_palette_size
    }

    pub fn merge_threshold(&self) -> f32 {
        self.merge_threshold
    }

    /// The top `max_palette_size` entries by count (ties keep input order).
    ///
    /// These are the only entries [`PaletteSelector::select`] ever compares, so
    /// a distance matrix over just these gives the same selection as one over
    /// the full histogram.
    pub fn candidates(&self, counts: &[ColorCount]) -> Vec<ColorCount> {
        self.working_set(counts)
            .into_iter()
            .map(|i| counts[i])
            .collect()
    }

    /// Select the palette colors.
    ///
    /// `distances` must be the matrix for `counts` in the same order.
    pub fn select(
        &self,
        counts: &[ColorCount],
        distances: &DistanceMatrix,
    ) -> Result<Vec<Color>, QuantizeError> {
        if distances.len() != counts.len() {
            return Err(QuantizeError::DistanceMatrixMismatch {
                colors: counts.len(),
                matrix: distances.len(),
            });
        }

        let working = self.working_set(counts);
        let mut present = vec![true; working.len()];
        let mut merged = 0usize;

        for visit in 0..working.len() {
            if !present[visit] {
                continue;
            }
            let i = working[visit];

            let mut nearest: Option<(usize, f32)> = None;
            for (slot, &j) in working.iter().enumerate() {
                if slot == visit || !present[slot] {
                    continue;
                }
                let d = distances.get(i, j);
                if nearest.is_none_or(|(_, best)| d < best) {
                    nearest = Some((slot, d));
                }
            }

            if let Some((slot, d)) = nearest {
                if d < self.merge_threshold {
                    trace!(
                        "Merging {} into {} (distance {:.3})",
                        counts[working[slot]].color, counts[i].color, d
                    );
                    present[slot] = false;
                    merged += 1;
                }
            }
        }

        let selected: Vec<Color> = working
            .iter()
            .zip(&present)
            .filter(|(_, keep)| **keep)
            .map(|(&i, _)| counts[i].color)
            .collect();

        debug!(
            "Palette selection: {} candidates, {} merged, {} kept",
            working.len(),
            merged,
            selected.len()
        );
        Ok(selected)
    }

    /// Indices into `counts` sorted by count descending, truncated to the palette size.
    fn working_set(&self, counts: &[ColorCount]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..counts.len()).collect();
        order.sort_by(|&a, &b| counts[b].count.cmp(&counts[a].count));
        order.truncate(self.max_palette_size);
        order
    }
}

//! Dense nearest-palette-index table over the full RGB cube.

use log::debug;
use rayon::prelude::*;

use super::{Palette, QuantizeError};
use crate::schema::{CUBE_CELLS, Color};

/// Edge length of the (g, b) tiles candidate pruning works on.
const TILE: usize = 8;

/// Palette index for every point of the 256^3 color cube.
///
/// Indexed by [`Color::cube_index`]. Each cell holds the index of the opaque
/// palette entry closest in RGB space, ties going to the lowest index. The
/// transparent sentinel is never assigned.
#[derive(Clone, PartialEq, Eq)]
pub struct PaletteIndexTable {
    indices: Vec<u8>,
}

impl std::fmt::Debug for PaletteIndexTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaletteIndexTable")
            .field("cells", &self.indices.len())
            .finish()
    }
}

impl PaletteIndexTable {
    /// Build the table for `palette`.
    ///
    /// Each plane of constant red is split into 8x8 (g, b) tiles. For a tile,
    /// only palette entries whose closest possible distance to the tile does
    /// not exceed the smallest farthest-possible distance of any entry can be
    /// the nearest neighbor of a cell in it; cells scan just those candidates,
    /// in palette order, so the result equals a full scan.
    pub fn build(palette: &Palette) -> Self {
        let colors = palette.colors();
        let mut indices = vec![0u8; CUBE_CELLS];

        indices
            .par_chunks_mut(256 * 256)
            .enumerate()
            .for_each(|(r, plane)| {
                let mut candidates: Vec<(u8, Color)> = Vec::with_capacity(colors.len());
                for g0 in (0..256).step_by(TILE) {
                    for b0 in (0..256).step_by(TILE) {
                        tile_candidates(colors, r, g0, b0, &mut candidates);
                        for g in g0..g0 + TILE {
                            for b in b0..b0 + TILE {
                                let cell = Color::rgb(r as u8, g as u8, b as u8);
                                plane[(g << 8) | b] = nearest(&candidates, cell);
                            }
                        }
                    }
                }
            });

        debug!("Built palette index table for {} colors", colors.len());
        Self { indices }
    }

    /// Wrap a table read back from elsewhere, checking its size and index range.
    pub(crate) fn from_indices(indices: Vec<u8>, palette: &Palette) -> Result<Self, QuantizeError> {
        if indices.len() != CUBE_CELLS {
            return Err(QuantizeError::LookupTableSize(indices.len()));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= palette.transparent_index()) {
            return Err(QuantizeError::PaletteIndexOutOfRange(bad));
        }
        Ok(Self { indices })
    }

    /// Palette index for a color (alpha ignored).
    #[inline]
    pub fn lookup(&self, color: Color) -> u8 {
        self.indices[color.cube_index()]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.indices
    }
}

/// Collect the palette entries that may be nearest to some cell of the tile
/// `r x [g0, g0 + TILE) x [b0, b0 + TILE)`, keeping palette order.
fn tile_candidates(
    colors: &[Color],
    r: usize,
    g0: usize,
    b0: usize,
    out: &mut Vec<(u8, Color)>,
) {
    out.clear();
    let ranges = [
        (r as i32, r as i32),
        (g0 as i32, (g0 + TILE - 1) as i32),
        (b0 as i32, (b0 + TILE - 1) as i32),
    ];

    let bounds = |c: Color| {
        let mut min_sq = 0i32;
        let mut max_sq = 0i32;
        for (v, (lo, hi)) in [c.r as i32, c.g as i32, c.b as i32].into_iter().zip(ranges) {
            let near = if v < lo {
                lo - v
            } else if v > hi {
                v - hi
            } else {
                0
            };
            let far = (v - lo).abs().max((v - hi).abs());
            min_sq += near * near;
            max_sq += far * far;
        }
        (min_sq, max_sq)
    };

    let limit = colors
        .iter()
        .map(|&c| bounds(c).1)
        .min()
        .unwrap_or(i32::MAX);

    out.extend(
        colors
            .iter()
            .enumerate()
            .filter(|&(_, &c)| bounds(c).0 <= limit)
            .map(|(i, &c)| (i as u8, c)),
    );
}

#[inline]
fn nearest(candidates: &[(u8, Color)], cell: Color) -> u8 {
    let mut best = 0u8;
    let mut best_dist = u32::MAX;
    for &(index, color) in candidates {
        let d = cell.rgb_distance_sq(color);
        if d < best_dist {
            best_dist = d;
            best = index;
        }
    }
    best
}

/// Reference full scan over every opaque entry, used to check the tiled build.
#[cfg(test)]
pub(crate) fn nearest_full_scan(palette: &Palette, cell: Color) -> u8 {
    let all: Vec<(u8, Color)> = palette
        .colors()
        .iter()
        .enumerate()
        .map(|(i, &c)| (i as u8, c))
        .collect();
    nearest(&all, cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_cells() -> impl Iterator<Item = Color> {
        (0..256usize)
            .step_by(17)
            .flat_map(|r| (0..256usize).step_by(13).map(move |g| (r, g)))
            .flat_map(|(r, g)| (0..256usize).step_by(7).map(move |b| Color::rgb(r as u8, g as u8, b as u8)))
    }

    #[test]
    fn test_palette_colors_map_to_themselves() {
        let colors = vec![
            Color::rgb(255, 0, 0),
            Color::rgb(0, 255, 0),
            Color::rgb(0, 0, 255),
            Color::rgb(17, 34, 51),
            Color::WHITE,
        ];
        let palette = Palette::new(colors.clone()).unwrap();
        let table = PaletteIndexTable::build(&palette);
        for (i, &c) in colors.iter().enumerate() {
            assert_eq!(table.lookup(c) as usize, i);
        }
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        // (100, 100, 100) is equidistant from both entries
        let palette = Palette::new(vec![Color::rgb(90, 100, 100), Color::rgb(110, 100, 100)]).unwrap();
        let table = PaletteIndexTable::build(&palette);
        assert_eq!(table.lookup(Color::rgb(100, 100, 100)), 0);
        assert_eq!(table.lookup(Color::rgb(101, 100, 100)), 1);
    }

    #[test]
    fn test_single_color_palette() {
        let palette = Palette::new(vec![Color::rgb(5, 5, 5)]).unwrap();
        let table = PaletteIndexTable::build(&palette);
        assert!(table.as_slice().iter().all(|&i| i == 0));
    }

    #[test]
    fn test_never_assigns_sentinel() {
        let palette = Palette::new(vec![Color::BLACK, Color::WHITE]).unwrap();
        let table = PaletteIndexTable::build(&palette);
        assert_eq!(table.as_slice().len(), CUBE_CELLS);
        assert!(table.as_slice().iter().all(|&i| i < palette.transparent_index()));
        // The sentinel's table color is black, but black maps to the opaque entry
        assert_eq!(table.lookup(Color::BLACK), 0);
    }

    #[test]
    fn test_build_is_idempotent() {
        let palette = Palette::new(vec![
            Color::rgb(12, 200, 40),
            Color::rgb(90, 90, 90),
            Color::rgb(250, 10, 128),
        ])
        .unwrap();
        assert_eq!(PaletteIndexTable::build(&palette), PaletteIndexTable::build(&palette));
    }

    #[test]
    fn test_from_indices_validates() {
        let palette = Palette::new(vec![Color::BLACK]).unwrap();
        assert!(matches!(
            PaletteIndexTable::from_indices(vec![0; 10], &palette),
            Err(QuantizeError::LookupTableSize(10))
        ));
        let mut indices = vec![0u8; CUBE_CELLS];
        indices[42] = 1;
        assert!(matches!(
            PaletteIndexTable::from_indices(indices, &palette),
            Err(QuantizeError::PaletteIndexOutOfRange(1))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(4))]

        #[test]
        fn prop_tiled_build_matches_full_scan(
            raw in prop::collection::vec(any::<[u8; 3]>(), 1..48),
        ) {
            let palette = Palette::new(raw.iter().map(|c| Color::rgb(c[0], c[1], c[2])).collect()).unwrap();
            let table = PaletteIndexTable::build(&palette);

            for cell in sample_cells() {
                prop_assert_eq!(table.lookup(cell), nearest_full_scan(&palette, cell));
            }
        }
    }
}

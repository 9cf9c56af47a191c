//! Pairwise perceptual distances between colors.

use rayon::prelude::*;

use super::{LabColor, QuantizeError};
use crate::schema::Color;

/// Largest color count for which a full distance matrix is materialized (1 GiB of f32).
pub const MAX_DISTANCE_COLORS: usize = 1 << 14;

/// Symmetric N x N matrix of Lab distances, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    len: usize,
    values: Vec<f32>,
}

impl DistanceMatrix {
    /// Wrap row-major values for `len` colors.
    pub(crate) fn from_values(len: usize, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), len * len);
        Self { len, values }
    }

    /// Number of colors (rows).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distance between colors `i` and `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.values[i * self.len + j]
    }

    /// All distances from color `i`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.len..(i + 1) * self.len]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

/// Embeds colors in Lab space and measures every pair.
pub struct ColorDistanceField;

impl ColorDistanceField {
    /// Compute the full distance matrix for `colors`.
    pub fn generate(colors: &[Color]) -> Result<DistanceMatrix, QuantizeError> {
        let n = colors.len();
        check_matrix_size(n)?;

        let labs: Vec<LabColor> = colors.par_iter().map(|&c| LabColor::from_color(c)).collect();

        let mut values = vec![0.0f32; n * n];
        values.par_chunks_mut(n.max(1)).enumerate().for_each(|(i, row)| {
            for (j, value) in row.iter_mut().enumerate() {
                *value = if i == j { 0.0 } else { labs[i].distance(&labs[j]) };
            }
        });

        Ok(DistanceMatrix::from_values(n, values))
    }
}

pub(crate) fn check_matrix_size(n: usize) -> Result<(), QuantizeError> {
    if n > MAX_DISTANCE_COLORS {
        return Err(QuantizeError::DistanceMatrixTooLarge(n));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_colors() {
        let matrix = ColorDistanceField::generate(&[]).unwrap();
        assert!(matrix.is_empty());
    }

    #[test]
    fn test_identical_colors_have_zero_distance() {
        let gray = Color::rgb(128, 128, 128);
        let matrix = ColorDistanceField::generate(&[gray, gray]).unwrap();
        assert_eq!(matrix.get(0, 1), 0.0);
    }

    #[test]
    fn test_black_white_distance() {
        let matrix = ColorDistanceField::generate(&[Color::BLACK, Color::WHITE]).unwrap();
        assert!((matrix.get(0, 1) - 100.0).abs() < 0.01);
        assert_eq!(matrix.row(1), &[matrix.get(1, 0), 0.0]);
    }

    #[test]
    fn test_rejects_oversized_input() {
        let colors = vec![Color::BLACK; MAX_DISTANCE_COLORS + 1];
        assert!(matches!(
            ColorDistanceField::generate(&colors),
            Err(QuantizeError::DistanceMatrixTooLarge(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_symmetric_with_zero_diagonal(raw in prop::collection::vec(any::<[u8; 3]>(), 1..40)) {
            let colors: Vec<Color> = raw.iter().map(|c| Color::rgb(c[0], c[1], c[2])).collect();
            let matrix = ColorDistanceField::generate(&colors).unwrap();

            prop_assert_eq!(matrix.len(), colors.len());
            for i in 0..colors.len() {
                prop_assert_eq!(matrix.get(i, i), 0.0);
                for j in 0..colors.len() {
                    prop_assert_eq!(matrix.get(i, j), matrix.get(j, i));
                    prop_assert!(matrix.get(i, j) >= 0.0);
                }
            }
        }
    }
}

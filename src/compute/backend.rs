//! Backend abstraction over the data-parallel stages.

use super::{
    ColorCount, ColorDistanceField, ColorHistogram, DiffResult, DistanceMatrix, FrameQuantizer,
    Palette, PaletteIndexTable, QuantizeError, QuantizedFrame, TemporalDiffTracker,
    ensure_dimensions,
};
use crate::schema::{Color, Frame};

/// Diffs consecutive frames for one encoding run.
pub trait FrameDiffer {
    /// Store the first frame as the reference.
    fn init_previous(&mut self, frame: &Frame) -> Result<(), QuantizeError>;

    /// Diff `frame` against the reference, writing `transparent_index` over
    /// unchanged pixels of `quantized`, then make `frame` the new reference.
    fn process_input(
        &mut self,
        frame: &Frame,
        transparent_index: u8,
        quantized: &mut QuantizedFrame,
    ) -> Result<DiffResult, QuantizeError>;

    fn is_tracking(&self) -> bool;
}

/// One implementation of every data-parallel stage.
///
/// Stages run strictly in order on the calling thread; any device work is
/// complete by the time a method returns.
pub trait ComputeBackend {
    /// Nearest-palette-index table as this backend stores it.
    type Lookup;
    type Differ: FrameDiffer;

    fn name(&self) -> &'static str;

    /// Distinct colors across `frames` with their counts, in grid-scan order.
    fn histogram(&mut self, frames: &[Frame]) -> Result<Vec<ColorCount>, QuantizeError>;

    /// Pairwise Lab distances.
    fn distance_field(&mut self, colors: &[Color]) -> Result<DistanceMatrix, QuantizeError>;

    fn build_lookup(&mut self, palette: &Palette) -> Result<Self::Lookup, QuantizeError>;

    fn quantize(
        &mut self,
        frame: &Frame,
        lookup: &Self::Lookup,
    ) -> Result<QuantizedFrame, QuantizeError>;

    /// A fresh, uninitialized differ for `width` x `height` frames.
    fn differ(&mut self, width: u32, height: u32) -> Result<Self::Differ, QuantizeError>;
}

impl FrameDiffer for TemporalDiffTracker {
    fn init_previous(&mut self, frame: &Frame) -> Result<(), QuantizeError> {
        TemporalDiffTracker::init_previous(self, frame)
    }

    fn process_input(
        &mut self,
        frame: &Frame,
        transparent_index: u8,
        quantized: &mut QuantizedFrame,
    ) -> Result<DiffResult, QuantizeError> {
        TemporalDiffTracker::process_input(self, frame, transparent_index, quantized)
    }

    fn is_tracking(&self) -> bool {
        TemporalDiffTracker::is_tracking(self)
    }
}

/// Rayon implementation of every stage.
#[derive(Default)]
pub struct CpuBackend {
    histogram: Option<ColorHistogram>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComputeBackend for CpuBackend {
    type Lookup = PaletteIndexTable;
    type Differ = TemporalDiffTracker;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn histogram(&mut self, frames: &[Frame]) -> Result<Vec<ColorCount>, QuantizeError> {
        // The 64 MiB tally grid is only allocated on first use
        self.histogram
            .get_or_insert_with(ColorHistogram::new)
            .generate(frames)
    }

    fn distance_field(&mut self, colors: &[Color]) -> Result<DistanceMatrix, QuantizeError> {
        ColorDistanceField::generate(colors)
    }

    fn build_lookup(&mut self, palette: &Palette) -> Result<PaletteIndexTable, QuantizeError> {
        Ok(PaletteIndexTable::build(palette))
    }

    fn quantize(
        &mut self,
        frame: &Frame,
        lookup: &PaletteIndexTable,
    ) -> Result<QuantizedFrame, QuantizeError> {
        Ok(FrameQuantizer::quantize(frame, lookup))
    }

    fn differ(&mut self, width: u32, height: u32) -> Result<TemporalDiffTracker, QuantizeError> {
        Ok(TemporalDiffTracker::new(width, height))
    }
}

/// Fail unless every frame is `width` x `height`.
pub(crate) fn ensure_all_dimensions(
    frames: &[Frame],
    width: u32,
    height: u32,
) -> Result<(), QuantizeError> {
    frames
        .iter()
        .try_for_each(|frame| ensure_dimensions(frame, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_backend_end_to_end_stages() {
        let red = Color::rgb(255, 0, 0);
        let green = Color::rgb(0, 255, 0);
        let frames = vec![
            Frame::new(2, 1, vec![red, green]).unwrap(),
            Frame::new(2, 1, vec![red, red]).unwrap(),
        ];
        let mut backend = CpuBackend::new();
        assert_eq!(backend.name(), "cpu");

        let counts = backend.histogram(&frames).unwrap();
        let colors: Vec<Color> = counts.iter().map(|c| c.color).collect();
        let distances = backend.distance_field(&colors).unwrap();
        assert_eq!(distances.len(), 2);

        let palette = Palette::new(colors).unwrap();
        let lookup = backend.build_lookup(&palette).unwrap();
        let mut quantized = backend.quantize(&frames[1], &lookup).unwrap();

        let mut differ = backend.differ(2, 1).unwrap();
        differ.init_previous(&frames[0]).unwrap();
        let diff = differ
            .process_input(&frames[1], palette.transparent_index(), &mut quantized)
            .unwrap();
        assert_eq!(diff.differing_pixels, 1);
        assert_eq!(quantized.indices()[0], palette.transparent_index());
    }

    #[test]
    fn test_ensure_all_dimensions() {
        let frames = vec![
            Frame::filled(2, 2, Color::BLACK).unwrap(),
            Frame::filled(2, 3, Color::BLACK).unwrap(),
        ];
        assert!(ensure_all_dimensions(&frames[..1], 2, 2).is_ok());
        assert!(matches!(
            ensure_all_dimensions(&frames, 2, 2),
            Err(QuantizeError::DimensionMismatch { actual_height: 3, .. })
        ));
    }
}

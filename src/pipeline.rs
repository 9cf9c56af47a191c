//! End-to-end encoding: palette construction, then per-frame quantize and diff.

use std::time::Duration;

use log::{debug, info};

use crate::animation::{AnimationInfo, ContainerSink, EncodedFrame, FrameSource, delay_centiseconds};
use crate::compute::{
    ComputeBackend, FrameDiffer, Palette, PaletteSelector, QuantizeError, QuantizedFrame,
    ensure_dimensions,
};
use crate::schema::{Color, Frame, QuantizerConfig};

/// Counters from one [`Palettizer::encode`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    /// Distinct RGB triples across all input frames.
    pub distinct_colors: usize,
    /// Palette entries including the transparent slot.
    pub palette_len: usize,
    pub frames_in: usize,
    pub frames_emitted: usize,
    /// Frames identical to their predecessor, folded into the next frame's delay.
    pub frames_skipped: usize,
    /// Index bytes handed to the sink.
    pub bytes_emitted: usize,
}

/// A palette and the histogram size it was chosen from.
#[derive(Debug, Clone)]
pub struct PaletteBuild {
    pub palette: Palette,
    pub distinct_colors: usize,
}

/// Emitted frame held back until its final delay is known.
struct PendingFrame {
    left: u32,
    top: u32,
    indices: QuantizedFrame,
    duration: Duration,
    uses_transparency: bool,
}

/// Drives a [`ComputeBackend`] through a whole animation.
pub struct Palettizer<B: ComputeBackend> {
    backend: B,
    config: QuantizerConfig,
    selector: PaletteSelector,
}

impl<B: ComputeBackend> Palettizer<B> {
    pub fn new(backend: B, config: QuantizerConfig) -> Result<Self, QuantizeError> {
        config.validate()?;
        let selector = PaletteSelector::from_config(&config);
        Ok(Self {
            backend,
            config,
            selector,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &QuantizerConfig {
        &self.config
    }

    /// Histogram `frames`, then select the palette.
    ///
    /// Distances are only computed among the selector's candidates, the only
    /// entries it ever compares.
    pub fn build_palette(&mut self, frames: &[Frame]) -> Result<PaletteBuild, QuantizeError> {
        let counts = self.backend.histogram(frames)?;
        if counts.is_empty() {
            return Err(QuantizeError::EmptyInput);
        }

        let candidates = self.selector.candidates(&counts);
        let colors: Vec<Color> = candidates.iter().map(|c| c.color).collect();
        let distances = self.backend.distance_field(&colors)?;
        let selected = self.selector.select(&candidates, &distances)?;

        info!(
            "Palette: {} distinct colors, {} candidates, {} selected",
            counts.len(),
            candidates.len(),
            selected.len()
        );
        Ok(PaletteBuild {
            palette: Palette::new(selected)?,
            distinct_colors: counts.len(),
        })
    }

    /// Quantize every frame of `source` and hand the result to `sink`.
    ///
    /// The first frame is emitted whole. Each later frame is diffed against
    /// its predecessor: unchanged frames are skipped and their duration is
    /// added to the next emitted frame, other frames are cropped to their
    /// dirty rectangle with unchanged pixels set to the transparent index.
    pub fn encode(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn ContainerSink,
    ) -> Result<EncodeSummary, QuantizeError> {
        let (width, height) = (source.width(), source.height());
        let composed = source.frames()?;
        if composed.is_empty() {
            return Err(QuantizeError::EmptyInput);
        }

        let (frames, durations): (Vec<Frame>, Vec<Duration>) =
            composed.into_iter().map(|c| (c.frame, c.duration)).unzip();
        for frame in &frames {
            ensure_dimensions(frame, width, height)?;
        }

        info!(
            "Encoding {} frames at {}x{} on the {} backend",
            frames.len(),
            width,
            height,
            self.backend.name()
        );

        let PaletteBuild {
            palette,
            distinct_colors,
        } = self.build_palette(&frames)?;
        let transparent = palette.transparent_index();
        let lookup = self.backend.build_lookup(&palette)?;

        sink.begin(&AnimationInfo {
            width,
            height,
            palette: palette.clone(),
        })?;

        let mut summary = EncodeSummary {
            distinct_colors,
            palette_len: palette.len(),
            frames_in: frames.len(),
            ..Default::default()
        };
        let mut differ = self.backend.differ(width, height)?;
        let mut pending: Option<PendingFrame> = None;
        let mut carry = Duration::ZERO;

        for (index, (frame, &duration)) in frames.iter().zip(&durations).enumerate() {
            let mut quantized = self.backend.quantize(frame, &lookup)?;

            let next = if differ.is_tracking() {
                let diff = differ.process_input(frame, transparent, &mut quantized)?;
                if diff.is_redundant() {
                    debug!("Frame {index} unchanged, skipping");
                    carry += duration;
                    summary.frames_skipped += 1;
                    continue;
                }
                let rect = diff.crop_rect(width, height);
                debug!(
                    "Frame {index}: {} pixels changed in {}x{} at ({}, {})",
                    diff.differing_pixels,
                    rect.width(),
                    rect.height(),
                    rect.left,
                    rect.top
                );
                PendingFrame {
                    left: rect.left,
                    top: rect.top,
                    indices: quantized.crop(rect),
                    duration: duration + carry,
                    uses_transparency: true,
                }
            } else {
                differ.init_previous(frame)?;
                PendingFrame {
                    left: 0,
                    top: 0,
                    indices: quantized,
                    duration,
                    uses_transparency: false,
                }
            };
            carry = Duration::ZERO;

            if let Some(previous) = pending.replace(next) {
                self.emit(sink, previous, &mut summary)?;
            }
        }

        // Trailing skipped frames extend the last emitted one
        if let Some(mut last) = pending {
            last.duration += carry;
            self.emit(sink, last, &mut summary)?;
        }
        sink.finish()?;

        info!(
            "Emitted {} of {} frames ({} skipped), {} index bytes",
            summary.frames_emitted, summary.frames_in, summary.frames_skipped, summary.bytes_emitted
        );
        Ok(summary)
    }

    fn emit(
        &self,
        sink: &mut dyn ContainerSink,
        frame: PendingFrame,
        summary: &mut EncodeSummary,
    ) -> Result<(), QuantizeError> {
        summary.frames_emitted += 1;
        summary.bytes_emitted += frame.indices.indices().len();
        sink.write_frame(EncodedFrame {
            left: frame.left,
            top: frame.top,
            indices: frame.indices,
            delay: delay_centiseconds(frame.duration, self.config.min_frame_delay),
            uses_transparency: frame.uses_transparency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{MemorySink, MemorySource};
    use crate::compute::CpuBackend;
    use crate::schema::{ComposedFrame, Scene};

    const RED: Color = Color::rgb(255, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);

    fn palettizer() -> Palettizer<CpuBackend> {
        Palettizer::new(CpuBackend::new(), QuantizerConfig::default()).unwrap()
    }

    fn composed(frame: Frame, ms: u64) -> ComposedFrame {
        ComposedFrame::new(frame, Duration::from_millis(ms))
    }

    #[test]
    fn test_first_frame_is_full_and_opaque() {
        let frame = Frame::new(2, 1, vec![RED, BLUE]).unwrap();
        let mut source = MemorySource::new(vec![composed(frame, 100)]).unwrap();
        let mut sink = MemorySink::new();

        let summary = palettizer().encode(&mut source, &mut sink).unwrap();

        assert_eq!(summary.frames_emitted, 1);
        assert_eq!(summary.distinct_colors, 2);
        assert_eq!(summary.palette_len, 3);
        let first = &sink.frames()[0];
        assert_eq!((first.left, first.top), (0, 0));
        assert_eq!((first.indices.width(), first.indices.height()), (2, 1));
        assert!(!first.uses_transparency);
        assert_eq!(first.delay, 10);
        assert!(sink.is_finished());

        let info = sink.info().unwrap();
        assert_eq!(info.palette.get(info.transparent_index()), Some(Color::TRANSPARENT));
    }

    #[test]
    fn test_redundant_frame_duration_carries_forward() {
        let a = Frame::filled(4, 4, RED).unwrap();
        let mut b = a.clone();
        b.set_pixel(2, 1, BLUE);
        let mut source = MemorySource::new(vec![
            composed(a.clone(), 100),
            composed(a, 50),
            composed(b, 70),
        ])
        .unwrap();
        let mut sink = MemorySink::new();

        let summary = palettizer().encode(&mut source, &mut sink).unwrap();

        assert_eq!(summary.frames_skipped, 1);
        assert_eq!(summary.frames_emitted, 2);
        let frames = sink.frames();
        assert_eq!(frames[0].delay, 10);
        assert_eq!(frames[1].delay, 12);
        assert_eq!((frames[1].left, frames[1].top), (2, 1));
        assert_eq!((frames[1].indices.width(), frames[1].indices.height()), (1, 1));
        assert!(frames[1].uses_transparency);
    }

    #[test]
    fn test_trailing_redundant_frames_extend_last_frame() {
        let a = Frame::filled(3, 3, RED).unwrap();
        let mut source = MemorySource::new(vec![
            composed(a.clone(), 100),
            composed(a.clone(), 100),
            composed(a, 30),
        ])
        .unwrap();
        let mut sink = MemorySink::new();

        let summary = palettizer().encode(&mut source, &mut sink).unwrap();

        assert_eq!(summary.frames_emitted, 1);
        assert_eq!(summary.frames_skipped, 2);
        assert_eq!(sink.frames()[0].delay, 23);
    }

    #[test]
    fn test_minimum_delay_applies() {
        let a = Frame::filled(1, 1, RED).unwrap();
        let mut source = MemorySource::new(vec![composed(a, 0)]).unwrap();
        let mut sink = MemorySink::new();
        palettizer().encode(&mut source, &mut sink).unwrap();
        assert_eq!(sink.frames()[0].delay, 2);
    }

    #[test]
    fn test_decoded_output_matches_quantized_input() {
        let mut scene = Scene::default();
        scene.width = 40;
        scene.height = 30;
        scene.frame_count = 8;
        let frames = scene.render().unwrap();

        let mut sink = MemorySink::new();
        let mut palettizer = palettizer();
        let summary = palettizer.encode(&mut scene, &mut sink).unwrap();
        assert_eq!(summary.frames_in, 8);
        assert_eq!(summary.frames_emitted + summary.frames_skipped, 8);

        let info = sink.info().unwrap();
        let table = crate::compute::PaletteIndexTable::build(&info.palette);
        let decoded = sink.composite();

        // Skipped frames never change the canvas, so compare against the
        // inputs that were actually emitted
        let mut emitted = Vec::new();
        let mut previous: Option<&Frame> = None;
        for composed in &frames {
            if previous != Some(&composed.frame) {
                emitted.push(&composed.frame);
            }
            previous = Some(&composed.frame);
        }
        assert_eq!(decoded.len(), emitted.len());
        for (decoded, source) in decoded.iter().zip(emitted) {
            let expected = info
                .palette
                .expand(crate::compute::FrameQuantizer::quantize(source, &table).indices());
            assert_eq!(decoded.pixels(), expected.as_slice());
        }
    }

    #[test]
    fn test_scene_with_static_frames_skips_them() {
        let mut scene = Scene::default();
        scene.width = 16;
        scene.height = 16;
        scene.frame_count = 4;
        // No moving layers: every frame equals the first
        scene.layers.truncate(1);

        let mut sink = MemorySink::new();
        let summary = palettizer().encode(&mut scene, &mut sink).unwrap();
        assert_eq!(summary.frames_emitted, 1);
        assert_eq!(summary.frames_skipped, 3);
        assert_eq!(sink.frames()[0].delay, 4 * 13);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = QuantizerConfig {
            max_palette_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            Palettizer::new(CpuBackend::new(), config),
            Err(QuantizeError::Config(_))
        ));
    }

    #[test]
    fn test_build_palette_respects_limits() {
        let pixels: Vec<Color> = (0..1000u32)
            .map(|i| Color::rgb((i % 256) as u8, (i / 4 % 256) as u8, (i * 7 % 256) as u8))
            .collect();
        let frame = Frame::new(1000, 1, pixels).unwrap();
        let config = QuantizerConfig {
            max_palette_size: 16,
            ..Default::default()
        };
        let mut palettizer = Palettizer::new(CpuBackend::new(), config).unwrap();
        let build = palettizer.build_palette(&[frame]).unwrap();
        assert!(build.palette.len() <= 17);
        assert_eq!(
            build.palette.entries().iter().filter(|&&c| c == Color::TRANSPARENT).count(),
            1
        );
    }
}

//! wgpu implementation of [`ComputeBackend`].

use std::sync::Arc;

use super::temporal::DiffKernel;
use super::{
    GpuContext, GpuDiffTracker, GpuDistanceField, GpuFrameQuantizer, GpuHistogram,
    GpuLookupBuilder, GpuLookupTable,
};
use crate::compute::{ColorCount, ComputeBackend, DistanceMatrix, Palette, QuantizeError, QuantizedFrame};
use crate::schema::{Color, Frame};

/// Runs every stage as compute shaders on one device.
pub struct GpuBackend {
    context: Arc<GpuContext>,
    histogram: Option<GpuHistogram>,
    distance: GpuDistanceField,
    lookup: GpuLookupBuilder,
    quantizer: GpuFrameQuantizer,
    diff_kernel: DiffKernel,
}

impl GpuBackend {
    /// Open a device and compile every pipeline.
    pub async fn new() -> Result<Self, QuantizeError> {
        let context = Arc::new(GpuContext::new().await?);
        Ok(Self::with_context(context))
    }

    pub fn with_context(context: Arc<GpuContext>) -> Self {
        Self {
            histogram: None,
            distance: GpuDistanceField::new(Arc::clone(&context)),
            lookup: GpuLookupBuilder::new(Arc::clone(&context)),
            quantizer: GpuFrameQuantizer::new(Arc::clone(&context)),
            diff_kernel: DiffKernel::new(&context),
            context,
        }
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }
}

impl ComputeBackend for GpuBackend {
    type Lookup = GpuLookupTable;
    type Differ = GpuDiffTracker;

    fn name(&self) -> &'static str {
        "gpu"
    }

    fn histogram(&mut self, frames: &[Frame]) -> Result<Vec<ColorCount>, QuantizeError> {
        let histogram = match &mut self.histogram {
            Some(histogram) => histogram,
            slot => slot.insert(GpuHistogram::new(Arc::clone(&self.context))?),
        };
        histogram.generate(frames)
    }

    fn distance_field(&mut self, colors: &[Color]) -> Result<DistanceMatrix, QuantizeError> {
        self.distance.generate(colors)
    }

    fn build_lookup(&mut self, palette: &Palette) -> Result<GpuLookupTable, QuantizeError> {
        self.lookup.build(palette)
    }

    fn quantize(
        &mut self,
        frame: &Frame,
        lookup: &GpuLookupTable,
    ) -> Result<QuantizedFrame, QuantizeError> {
        self.quantizer.quantize(frame, lookup)
    }

    fn differ(&mut self, width: u32, height: u32) -> Result<GpuDiffTracker, QuantizeError> {
        GpuDiffTracker::new(
            Arc::clone(&self.context),
            self.diff_kernel.clone(),
            width,
            height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::gpu::GpuError;
    use crate::compute::{CpuBackend, FrameDiffer};
    use crate::schema::Scene;

    #[test]
    fn test_gpu_backend_matches_cpu_backend() {
        let mut gpu = match pollster::block_on(GpuBackend::new()) {
            Ok(backend) => backend,
            Err(QuantizeError::Gpu(GpuError::NoAdapter)) => {
                eprintln!("Skipping GPU test: no adapter available");
                return;
            }
            Err(e) => panic!("Failed to create GPU backend: {:?}", e),
        };
        let mut cpu = CpuBackend::new();
        assert_eq!(gpu.name(), "gpu");

        let mut scene = Scene::default();
        scene.width = 48;
        scene.height = 32;
        scene.frame_count = 4;
        let frames: Vec<Frame> = scene.render().unwrap().into_iter().map(|f| f.frame).collect();

        let counts = gpu.histogram(&frames).unwrap();
        assert_eq!(counts, cpu.histogram(&frames).unwrap());

        let colors: Vec<Color> = counts.iter().take(64).map(|c| c.color).collect();
        assert_eq!(gpu.distance_field(&colors).unwrap().len(), colors.len());

        let palette = Palette::new(colors).unwrap();
        let gpu_lookup = gpu.build_lookup(&palette).unwrap();
        let cpu_lookup = cpu.build_lookup(&palette).unwrap();

        let mut gpu_differ = gpu.differ(scene.width, scene.height).unwrap();
        let mut cpu_differ = cpu.differ(scene.width, scene.height).unwrap();
        gpu_differ.init_previous(&frames[0]).unwrap();
        cpu_differ.init_previous(&frames[0]).unwrap();

        for frame in &frames[1..] {
            let mut g = gpu.quantize(frame, &gpu_lookup).unwrap();
            let mut c = cpu.quantize(frame, &cpu_lookup).unwrap();
            assert_eq!(g, c);
            let gd = gpu_differ.process_input(frame, palette.transparent_index(), &mut g).unwrap();
            let cd = cpu_differ.process_input(frame, palette.transparent_index(), &mut c).unwrap();
            assert_eq!(gd, cd);
            assert_eq!(g, c);
        }
    }
}

//! GPU Lab conversion and pairwise distance matrix.

use std::sync::Arc;

use super::GpuContext;
use super::context::{TILE, linear_groups, storage_entry, uniform_entry};
use crate::compute::distance::check_matrix_size;
use crate::compute::{DistanceMatrix, QuantizeError};
use crate::schema::Color;

const RGB_TO_LAB_SHADER: &str = include_str!("shaders/rgb_to_lab.wgsl");
const LAB_DISTANCES_SHADER: &str = include_str!("shaders/lab_distances.wgsl");

/// Uniform buffer struct shared by both distance shaders.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct CountParams {
    count: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

/// Distance-field stage on the GPU.
pub struct GpuDistanceField {
    context: Arc<GpuContext>,
    lab_pipeline: wgpu::ComputePipeline,
    lab_layout: wgpu::BindGroupLayout,
    distance_pipeline: wgpu::ComputePipeline,
    distance_layout: wgpu::BindGroupLayout,
}

impl GpuDistanceField {
    pub fn new(context: Arc<GpuContext>) -> Self {
        let entries = [uniform_entry(0), storage_entry(1, true), storage_entry(2, false)];
        let (lab_pipeline, lab_layout) =
            context.compute_pipeline("RGB To Lab", RGB_TO_LAB_SHADER, &entries);
        let (distance_pipeline, distance_layout) =
            context.compute_pipeline("Lab Distances", LAB_DISTANCES_SHADER, &entries);

        Self {
            context,
            lab_pipeline,
            lab_layout,
            distance_pipeline,
            distance_layout,
        }
    }

    /// Compute the full distance matrix for `colors`.
    pub fn generate(&self, colors: &[Color]) -> Result<DistanceMatrix, QuantizeError> {
        let n = colors.len();
        check_matrix_size(n)?;
        if n == 0 {
            return Ok(DistanceMatrix::from_values(0, Vec::new()));
        }

        let context = &self.context;
        let packed: Vec<u32> = colors.iter().map(|c| c.to_packed()).collect();
        let colors_buffer =
            context.storage_buffer_with("Distance Colors Buffer", &packed, wgpu::BufferUsages::empty())?;
        let labs = context.storage_buffer(
            "Lab Colors Buffer",
            (n * std::mem::size_of::<[f32; 4]>()) as u64,
            wgpu::BufferUsages::empty(),
        )?;
        let matrix_size = (n * n * std::mem::size_of::<f32>()) as u64;
        let distances = context.storage_buffer(
            "Distance Matrix Buffer",
            matrix_size,
            wgpu::BufferUsages::COPY_SRC,
        )?;
        let params = context.uniform_buffer(
            "Distance Params",
            &CountParams {
                count: n as u32,
                _pad0: 0,
                _pad1: 0,
                _pad2: 0,
            },
        );

        let lab_bind_group =
            context.bind_group("RGB To Lab Bind Group", &self.lab_layout, &[&params, &colors_buffer, &labs]);
        let distance_bind_group = context.bind_group(
            "Lab Distances Bind Group",
            &self.distance_layout,
            &[&params, &labs, &distances],
        );

        let mut encoder = context.encoder("Distance Field Encoder");
        GpuContext::dispatch(
            &mut encoder,
            "RGB To Lab Pass",
            &self.lab_pipeline,
            &lab_bind_group,
            linear_groups(n as u32),
        );
        let groups = (n as u32).div_ceil(TILE);
        GpuContext::dispatch(
            &mut encoder,
            "Lab Distances Pass",
            &self.distance_pipeline,
            &distance_bind_group,
            (groups, groups, 1),
        );

        let words = context.read_buffer(encoder, &distances, matrix_size)?;
        let values: Vec<f32> = bytemuck::cast_slice(&words).to_vec();
        Ok(DistanceMatrix::from_values(n, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ColorDistanceField;
    use crate::compute::gpu::GpuError;

    #[test]
    fn test_gpu_distances_match_cpu() {
        let context = match pollster::block_on(GpuContext::new()) {
            Ok(context) => Arc::new(context),
            Err(GpuError::NoAdapter) => {
                eprintln!("Skipping GPU test: no adapter available");
                return;
            }
            Err(e) => panic!("Failed to create GPU context: {:?}", e),
        };

        let colors: Vec<Color> = (0..40u32)
            .map(|i| Color::rgb((i * 37 % 256) as u8, (i * 91 % 256) as u8, (i * 13 % 256) as u8))
            .collect();
        let gpu = GpuDistanceField::new(context).generate(&colors).unwrap();
        let cpu = ColorDistanceField::generate(&colors).unwrap();

        assert_eq!(gpu.len(), cpu.len());
        for i in 0..colors.len() {
            assert_eq!(gpu.get(i, i), 0.0);
            for j in 0..colors.len() {
                let diff = (gpu.get(i, j) - cpu.get(i, j)).abs();
                assert!(diff < 0.05, "({i}, {j}): gpu {} cpu {}", gpu.get(i, j), cpu.get(i, j));
            }
        }
    }
}

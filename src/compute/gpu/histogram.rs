//! GPU color histogram: atomic tally, count, then compacting append.

use std::sync::Arc;

use log::debug;

use super::GpuContext;
use super::context::{TILE, storage_entry, uniform_entry};
use crate::compute::backend::ensure_all_dimensions;
use crate::compute::{ColorCount, QuantizeError};
use crate::schema::{CUBE_CELLS, Color, Frame};

const COLOR_TALLY_SHADER: &str = include_str!("shaders/color_tally.wgsl");
const COUNT_TALLIES_SHADER: &str = include_str!("shaders/count_tallies.wgsl");
const ACCUMULATE_TALLIES_SHADER: &str = include_str!("shaders/accumulate_tallies.wgsl");

/// Workgroups covering the cube for the count and append passes.
const CUBE_GROUPS: (u32, u32, u32) = (256 / 64, 256, 256);

/// Uniform buffer struct for the tally shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct TallyParams {
    width: u32,
    height: u32,
    _pad0: u32,
    _pad1: u32,
}

/// One appended histogram entry as the GPU writes it.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ColorTally {
    cell: u32,
    count: u32,
}

/// Histogram stage on the GPU.
///
/// Owns the 64 MiB tally grid, which is cleared at the start of every run.
pub struct GpuHistogram {
    context: Arc<GpuContext>,
    tally_pipeline: wgpu::ComputePipeline,
    tally_layout: wgpu::BindGroupLayout,
    count_pipeline: wgpu::ComputePipeline,
    count_layout: wgpu::BindGroupLayout,
    accumulate_pipeline: wgpu::ComputePipeline,
    accumulate_layout: wgpu::BindGroupLayout,
    tally: wgpu::Buffer,
    counter: wgpu::Buffer,
}

impl GpuHistogram {
    pub fn new(context: Arc<GpuContext>) -> Result<Self, QuantizeError> {
        let (tally_pipeline, tally_layout) = context.compute_pipeline(
            "Color Tally",
            COLOR_TALLY_SHADER,
            &[uniform_entry(0), storage_entry(1, true), storage_entry(2, false)],
        );
        let (count_pipeline, count_layout) = context.compute_pipeline(
            "Count Tallies",
            COUNT_TALLIES_SHADER,
            &[storage_entry(0, true), storage_entry(1, false)],
        );
        let (accumulate_pipeline, accumulate_layout) = context.compute_pipeline(
            "Accumulate Tallies",
            ACCUMULATE_TALLIES_SHADER,
            &[storage_entry(0, true), storage_entry(1, false), storage_entry(2, false)],
        );

        let tally = context.storage_buffer(
            "Color Tally Buffer",
            (CUBE_CELLS * std::mem::size_of::<u32>()) as u64,
            wgpu::BufferUsages::COPY_DST,
        )?;
        let counter = context.storage_buffer(
            "Tally Counter Buffer",
            std::mem::size_of::<u32>() as u64,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        )?;

        Ok(Self {
            context,
            tally_pipeline,
            tally_layout,
            count_pipeline,
            count_layout,
            accumulate_pipeline,
            accumulate_layout,
            tally,
            counter,
        })
    }

    /// Tally every pixel of every frame and return the non-zero cells in
    /// grid-scan order, same as [`crate::compute::ColorHistogram::generate`].
    pub fn generate(&mut self, frames: &[Frame]) -> Result<Vec<ColorCount>, QuantizeError> {
        let Some(first) = frames.first() else {
            return Ok(Vec::new());
        };
        let (width, height) = first.dimensions();
        ensure_all_dimensions(frames, width, height)?;

        let context = &self.context;
        let frame_buffer = context.storage_buffer(
            "Histogram Frame Buffer",
            first.as_bytes().len() as u64,
            wgpu::BufferUsages::COPY_DST,
        )?;
        let params = context.uniform_buffer(
            "Tally Params",
            &TallyParams {
                width,
                height,
                _pad0: 0,
                _pad1: 0,
            },
        );
        let tally_bind_group = context.bind_group(
            "Color Tally Bind Group",
            &self.tally_layout,
            &[&params, &frame_buffer, &self.tally],
        );

        let mut encoder = context.encoder("Clear Tally Encoder");
        encoder.clear_buffer(&self.tally, 0, None);
        encoder.clear_buffer(&self.counter, 0, None);
        context.queue().submit(std::iter::once(encoder.finish()));

        // write_buffer lands before the next submit, so each frame gets its own
        for frame in frames {
            context.queue().write_buffer(&frame_buffer, 0, frame.as_bytes());
            let mut encoder = context.encoder("Color Tally Encoder");
            GpuContext::dispatch(
                &mut encoder,
                "Color Tally Pass",
                &self.tally_pipeline,
                &tally_bind_group,
                (width.div_ceil(TILE), height.div_ceil(TILE), 1),
            );
            context.queue().submit(std::iter::once(encoder.finish()));
        }

        let count_bind_group = context.bind_group(
            "Count Tallies Bind Group",
            &self.count_layout,
            &[&self.tally, &self.counter],
        );
        let mut encoder = context.encoder("Count Tallies Encoder");
        GpuContext::dispatch(
            &mut encoder,
            "Count Tallies Pass",
            &self.count_pipeline,
            &count_bind_group,
            CUBE_GROUPS,
        );
        let distinct = context
            .read_buffer(encoder, &self.counter, std::mem::size_of::<u32>() as u64)?
            .first()
            .copied()
            .unwrap_or(0) as usize;

        if distinct == 0 {
            return Ok(Vec::new());
        }

        let entries_size = (distinct * std::mem::size_of::<ColorTally>()) as u64;
        let entries = context.storage_buffer(
            "Histogram Entries Buffer",
            entries_size,
            wgpu::BufferUsages::COPY_SRC,
        )?;
        let accumulate_bind_group = context.bind_group(
            "Accumulate Tallies Bind Group",
            &self.accumulate_layout,
            &[&self.tally, &self.counter, &entries],
        );

        let mut encoder = context.encoder("Accumulate Tallies Encoder");
        encoder.clear_buffer(&self.counter, 0, None);
        GpuContext::dispatch(
            &mut encoder,
            "Accumulate Tallies Pass",
            &self.accumulate_pipeline,
            &accumulate_bind_group,
            CUBE_GROUPS,
        );
        let words = context.read_buffer(encoder, &entries, entries_size)?;

        let mut tallies: Vec<ColorTally> = bytemuck::cast_slice(&words).to_vec();
        tallies.sort_unstable_by_key(|t| t.cell);

        debug!(
            "GPU histogram: {} frames, {} distinct colors",
            frames.len(),
            tallies.len()
        );
        Ok(tallies
            .into_iter()
            .map(|t| ColorCount {
                color: Color::from_cube_index(t.cell as usize),
                count: t.count,
            })
            .collect())
    }
}

//! GPU temporal diffing with transparency injection.

use std::sync::Arc;

use log::trace;

use super::GpuContext;
use super::context::{linear_groups, storage_entry, uniform_entry, word_bytes};
use crate::compute::{
    DiffResult, FrameDiffer, QuantizeError, QuantizedFrame, Rect, ensure_dimensions,
};
use crate::schema::Frame;

const FIX_TRANSPARENCY_SHADER: &str = include_str!("shaders/fix_transparency.wgsl");

/// Uniform buffer struct for the transparency shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct DiffParams {
    width: u32,
    height: u32,
    pixel_count: u32,
    transparent_index: u32,
}

/// Changed-pixel count and bounds as accumulated by the shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct DiffBounds {
    count: u32,
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
    _pad: u32,
}

/// Compiled transparency pipeline, shared by every tracker of a backend.
#[derive(Clone)]
pub(crate) struct DiffKernel {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl DiffKernel {
    pub(crate) fn new(context: &GpuContext) -> Self {
        let (pipeline, layout) = context.compute_pipeline(
            "Fix Transparency",
            FIX_TRANSPARENCY_SHADER,
            &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, false),
            ],
        );
        Self { pipeline, layout }
    }
}

/// [`FrameDiffer`] that keeps the reference frame in GPU memory.
///
/// Behaves exactly like [`crate::compute::TemporalDiffTracker`].
pub struct GpuDiffTracker {
    context: Arc<GpuContext>,
    kernel: DiffKernel,
    width: u32,
    height: u32,
    current: wgpu::Buffer,
    previous: wgpu::Buffer,
    indices: wgpu::Buffer,
    bounds: wgpu::Buffer,
    tracking: bool,
}

impl GpuDiffTracker {
    pub(crate) fn new(
        context: Arc<GpuContext>,
        kernel: DiffKernel,
        width: u32,
        height: u32,
    ) -> Result<Self, QuantizeError> {
        let pixel_count = width as usize * height as usize;
        let frame_bytes = (pixel_count * std::mem::size_of::<u32>()) as u64;
        let current = context.storage_buffer(
            "Diff Current Buffer",
            frame_bytes,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        )?;
        let previous = context.storage_buffer(
            "Diff Previous Buffer",
            frame_bytes,
            wgpu::BufferUsages::COPY_DST,
        )?;
        let indices = context.storage_buffer(
            "Diff Indices Buffer",
            word_bytes(pixel_count),
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        )?;
        let bounds = context.storage_buffer(
            "Diff Bounds Buffer",
            std::mem::size_of::<DiffBounds>() as u64,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        )?;

        Ok(Self {
            context,
            kernel,
            width,
            height,
            current,
            previous,
            indices,
            bounds,
            tracking: false,
        })
    }
}

impl FrameDiffer for GpuDiffTracker {
    fn init_previous(&mut self, frame: &Frame) -> Result<(), QuantizeError> {
        if self.tracking {
            return Err(QuantizeError::TrackerAlreadyInitialized);
        }
        ensure_dimensions(frame, self.width, self.height)?;
        self.context
            .queue()
            .write_buffer(&self.previous, 0, frame.as_bytes());
        self.tracking = true;
        Ok(())
    }

    fn process_input(
        &mut self,
        frame: &Frame,
        transparent_index: u8,
        quantized: &mut QuantizedFrame,
    ) -> Result<DiffResult, QuantizeError> {
        if !self.tracking {
            return Err(QuantizeError::TrackerUninitialized);
        }
        ensure_dimensions(frame, self.width, self.height)?;
        if (quantized.width(), quantized.height()) != (self.width, self.height) {
            return Err(QuantizeError::DimensionMismatch {
                expected_width: self.width,
                expected_height: self.height,
                actual_width: quantized.width(),
                actual_height: quantized.height(),
            });
        }

        let context = &self.context;
        let pixel_count = frame.pixel_count();
        let index_bytes = word_bytes(pixel_count);

        let mut padded = quantized.indices().to_vec();
        padded.resize(index_bytes as usize, 0);
        context.queue().write_buffer(&self.current, 0, frame.as_bytes());
        context.queue().write_buffer(&self.indices, 0, &padded);
        context.queue().write_buffer(
            &self.bounds,
            0,
            bytemuck::bytes_of(&DiffBounds {
                count: 0,
                left: self.width,
                top: self.height,
                right: 0,
                bottom: 0,
                _pad: 0,
            }),
        );

        let params = context.uniform_buffer(
            "Diff Params",
            &DiffParams {
                width: self.width,
                height: self.height,
                pixel_count: pixel_count as u32,
                transparent_index: u32::from(transparent_index),
            },
        );
        let bind_group = context.bind_group(
            "Fix Transparency Bind Group",
            &self.kernel.layout,
            &[&params, &self.current, &self.previous, &self.indices, &self.bounds],
        );

        let mut encoder = context.encoder("Fix Transparency Encoder");
        GpuContext::dispatch(
            &mut encoder,
            "Fix Transparency Pass",
            &self.kernel.pipeline,
            &bind_group,
            linear_groups(pixel_count.div_ceil(4) as u32),
        );
        // The reference becomes this frame for the next call
        encoder.copy_buffer_to_buffer(
            &self.current,
            0,
            &self.previous,
            0,
            (pixel_count * std::mem::size_of::<u32>()) as u64,
        );

        let mut words = context.read_words(
            encoder,
            &[
                (&self.indices, index_bytes),
                (&self.bounds, std::mem::size_of::<DiffBounds>() as u64),
            ],
        )?;
        let bounds_words = words.pop().unwrap_or_default();
        let index_words = words.pop().unwrap_or_default();

        let bytes: &[u8] = bytemuck::cast_slice(&index_words);
        quantized.indices_mut().copy_from_slice(&bytes[..pixel_count]);

        let bounds: DiffBounds = bytemuck::pod_read_unaligned(bytemuck::cast_slice(&bounds_words));
        let result = DiffResult {
            differing_pixels: u64::from(bounds.count),
            bounds: Rect {
                left: bounds.left,
                top: bounds.top,
                right: bounds.right,
                bottom: bounds.bottom,
            },
        };
        trace!(
            "GPU diff: {} pixels changed, bounds {:?}",
            result.differing_pixels, result.bounds
        );
        Ok(result)
    }

    fn is_tracking(&self) -> bool {
        self.tracking
    }
}

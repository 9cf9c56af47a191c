//! GPU per-pixel quantization through a resident lookup table.

use std::sync::Arc;

use super::context::{linear_groups, storage_entry, uniform_entry, word_bytes};
use super::{GpuContext, GpuLookupTable};
use crate::compute::{QuantizeError, QuantizedFrame};
use crate::schema::Frame;

const LUT_LOOKUP_SHADER: &str = include_str!("shaders/lut_lookup.wgsl");

/// Uniform buffer struct for the lookup shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct LookupParams {
    pixel_count: u32,
    word_count: u32,
    _pad0: u32,
    _pad1: u32,
}

/// Frame and index buffers sized for one frame size.
struct FrameBuffers {
    pixel_count: usize,
    frame: wgpu::Buffer,
    indices: wgpu::Buffer,
}

/// Quantization stage on the GPU.
pub struct GpuFrameQuantizer {
    context: Arc<GpuContext>,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    buffers: Option<FrameBuffers>,
}

impl GpuFrameQuantizer {
    pub fn new(context: Arc<GpuContext>) -> Self {
        let (pipeline, layout) = context.compute_pipeline(
            "LUT Lookup",
            LUT_LOOKUP_SHADER,
            &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
            ],
        );
        Self {
            context,
            pipeline,
            layout,
            buffers: None,
        }
    }

    /// Quantize every pixel of `frame`. Alpha is ignored.
    pub fn quantize(
        &mut self,
        frame: &Frame,
        table: &GpuLookupTable,
    ) -> Result<QuantizedFrame, QuantizeError> {
        let pixel_count = frame.pixel_count();
        let word_count = pixel_count.div_ceil(4);
        let context = Arc::clone(&self.context);

        let buffers = match self.buffers.take() {
            Some(buffers) if buffers.pixel_count == pixel_count => buffers,
            _ => FrameBuffers {
                pixel_count,
                frame: context.storage_buffer(
                    "Quantize Frame Buffer",
                    frame.as_bytes().len() as u64,
                    wgpu::BufferUsages::COPY_DST,
                )?,
                indices: context.storage_buffer(
                    "Quantize Indices Buffer",
                    word_bytes(pixel_count),
                    wgpu::BufferUsages::COPY_SRC,
                )?,
            },
        };

        context.queue().write_buffer(&buffers.frame, 0, frame.as_bytes());
        let params = context.uniform_buffer(
            "Lookup Params",
            &LookupParams {
                pixel_count: pixel_count as u32,
                word_count: word_count as u32,
                _pad0: 0,
                _pad1: 0,
            },
        );
        let bind_group = context.bind_group(
            "LUT Lookup Bind Group",
            &self.layout,
            &[&params, &buffers.frame, table.buffer(), &buffers.indices],
        );

        let mut encoder = context.encoder("Quantize Encoder");
        GpuContext::dispatch(
            &mut encoder,
            "LUT Lookup Pass",
            &self.pipeline,
            &bind_group,
            linear_groups(word_count as u32),
        );
        let words = context.read_buffer(encoder, &buffers.indices, word_bytes(pixel_count));
        self.buffers = Some(buffers);

        let mut indices: Vec<u8> = bytemuck::cast_slice(&words?).to_vec();
        indices.truncate(pixel_count);
        Ok(QuantizedFrame::from_raw(frame.width(), frame.height(), indices))
    }
}

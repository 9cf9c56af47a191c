//! GPU lookup table generation.

use std::sync::Arc;

use log::debug;

use super::GpuContext;
use super::context::{storage_entry, uniform_entry};
use crate::compute::{Palette, PaletteIndexTable, QuantizeError};
use crate::schema::CUBE_CELLS;

const LUT_GENERATION_SHADER: &str = include_str!("shaders/lut_generation.wgsl");

/// Size in bytes of the packed table (one byte per cell).
pub(crate) const LUT_BYTES: u64 = CUBE_CELLS as u64;

/// Uniform buffer struct for the generation shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct LutParams {
    palette_len: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

/// A palette index table resident in GPU memory.
///
/// Four cell indices are packed per 32-bit word, lowest byte first, so the
/// buffer's bytes are laid out exactly like [`PaletteIndexTable::as_slice`].
pub struct GpuLookupTable {
    context: Arc<GpuContext>,
    buffer: wgpu::Buffer,
    palette: Palette,
}

impl GpuLookupTable {
    pub(crate) fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Copy the table back to host memory.
    pub fn read_back(&self) -> Result<PaletteIndexTable, QuantizeError> {
        let encoder = self.context.encoder("LUT Readback Encoder");
        let words = self.context.read_buffer(encoder, &self.buffer, LUT_BYTES)?;
        let indices: Vec<u8> = bytemuck::cast_slice(&words).to_vec();
        PaletteIndexTable::from_indices(indices, &self.palette)
    }
}

/// Builds [`GpuLookupTable`]s.
pub struct GpuLookupBuilder {
    context: Arc<GpuContext>,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl GpuLookupBuilder {
    pub fn new(context: Arc<GpuContext>) -> Self {
        let (pipeline, layout) = context.compute_pipeline(
            "LUT Generation",
            LUT_GENERATION_SHADER,
            &[uniform_entry(0), storage_entry(1, true), storage_entry(2, false)],
        );
        Self {
            context,
            pipeline,
            layout,
        }
    }

    /// Fill every cube cell with its nearest opaque palette index.
    pub fn build(&self, palette: &Palette) -> Result<GpuLookupTable, QuantizeError> {
        let context = &self.context;
        let packed: Vec<u32> = palette.colors().iter().map(|c| c.to_packed()).collect();
        let palette_buffer =
            context.storage_buffer_with("Palette Buffer", &packed, wgpu::BufferUsages::empty())?;
        let buffer = context.storage_buffer("LUT Buffer", LUT_BYTES, wgpu::BufferUsages::COPY_SRC)?;
        let params = context.uniform_buffer(
            "LUT Params",
            &LutParams {
                palette_len: packed.len() as u32,
                _pad0: 0,
                _pad1: 0,
                _pad2: 0,
            },
        );
        let bind_group = context.bind_group(
            "LUT Generation Bind Group",
            &self.layout,
            &[&params, &palette_buffer, &buffer],
        );

        let mut encoder = context.encoder("LUT Generation Encoder");
        // 64 invocations cover one (r, g) row of 256 blue values
        GpuContext::dispatch(
            &mut encoder,
            "LUT Generation Pass",
            &self.pipeline,
            &bind_group,
            (1, 256, 256),
        );
        context.queue().submit(std::iter::once(encoder.finish()));

        debug!("Built GPU palette index table for {} colors", packed.len());
        Ok(GpuLookupTable {
            context: Arc::clone(context),
            buffer,
            palette: palette.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::gpu::GpuError;
    use crate::schema::Color;

    #[test]
    fn test_gpu_lut_matches_cpu() {
        let context = match pollster::block_on(GpuContext::new()) {
            Ok(context) => Arc::new(context),
            Err(GpuError::NoAdapter) => {
                eprintln!("Skipping GPU test: no adapter available");
                return;
            }
            Err(e) => panic!("Failed to create GPU context: {:?}", e),
        };

        let palette = Palette::new(vec![
            Color::rgb(255, 0, 0),
            Color::rgb(0, 255, 0),
            Color::rgb(0, 0, 255),
            Color::rgb(90, 100, 100),
            Color::rgb(110, 100, 100),
            Color::WHITE,
        ])
        .unwrap();

        let gpu = GpuLookupBuilder::new(context).build(&palette).unwrap().read_back().unwrap();
        let cpu = PaletteIndexTable::build(&palette);
        assert!(gpu == cpu, "GPU and CPU lookup tables differ");
    }
}

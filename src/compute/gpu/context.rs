//! Device, queue and the buffer/pipeline plumbing shared by every GPU stage.

use std::sync::mpsc;

use log::info;

use super::GpuError;

/// Workgroup edge for 2-D dispatches.
pub(crate) const TILE: u32 = 16;
/// Workgroup size for 1-D dispatches.
pub(crate) const LINEAR: u32 = 64;
/// Largest workgroup count per dispatch dimension.
const MAX_GROUPS_PER_DIM: u32 = 65_535;

/// An open wgpu device and its queue.
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Open the highest-performance adapter available.
    pub async fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Palette Quantizer GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        let adapter = adapter.get_info();
        info!("Using GPU adapter {} ({:?})", adapter.name, adapter.backend);

        Ok(Self {
            device,
            queue,
            adapter,
        })
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter
    }

    /// Compile `source` and build a compute pipeline with entry point `main`
    /// over a single bind group described by `entries`.
    pub(crate) fn compute_pipeline(
        &self,
        label: &str,
        source: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> (wgpu::ComputePipeline, wgpu::BindGroupLayout) {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries,
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&layout],
                ..Default::default()
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });
        (pipeline, layout)
    }

    /// Allocate a storage buffer of `size` bytes, rejecting sizes the device cannot bind.
    pub(crate) fn storage_buffer(
        &self,
        label: &str,
        size: u64,
        extra_usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer, GpuError> {
        let limit = u64::from(self.device.limits().max_storage_buffer_binding_size);
        if size > limit {
            return Err(GpuError::BufferTooLarge {
                label: label.to_string(),
                size,
                limit,
            });
        }
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.max(4),
            usage: wgpu::BufferUsages::STORAGE | extra_usage,
            mapped_at_creation: false,
        }))
    }

    /// Storage buffer initialized with `contents`.
    pub(crate) fn storage_buffer_with<T: bytemuck::Pod>(
        &self,
        label: &str,
        contents: &[T],
        extra_usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer, GpuError> {
        let bytes: &[u8] = bytemuck::cast_slice(contents);
        let buffer = self.storage_buffer(
            label,
            bytes.len() as u64,
            wgpu::BufferUsages::COPY_DST | extra_usage,
        )?;
        self.queue.write_buffer(&buffer, 0, bytes);
        Ok(buffer)
    }

    /// Uniform buffer holding `params`.
    pub(crate) fn uniform_buffer<T: bytemuck::Pod>(&self, label: &str, params: &T) -> wgpu::Buffer {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<T>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(&buffer, 0, bytemuck::bytes_of(params));
        buffer
    }

    /// Bind `buffers` to bindings 0, 1, 2, ... of `layout`.
    pub(crate) fn bind_group(
        &self,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        buffers: &[&wgpu::Buffer],
    ) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        })
    }

    pub(crate) fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    /// Record one compute pass with a single dispatch.
    pub(crate) fn dispatch(
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        groups: (u32, u32, u32),
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(groups.0, groups.1, groups.2);
    }

    /// Submit `encoder` after copying each `(buffer, size)` into a staging
    /// buffer, block until the GPU is done, and return the copied contents as
    /// 32-bit words. Sizes must be multiples of 4.
    pub(crate) fn read_words(
        &self,
        mut encoder: wgpu::CommandEncoder,
        sources: &[(&wgpu::Buffer, u64)],
    ) -> Result<Vec<Vec<u32>>, GpuError> {
        let staging: Vec<wgpu::Buffer> = sources
            .iter()
            .map(|&(source, size)| {
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Staging Buffer"),
                    size,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                encoder.copy_buffer_to_buffer(source, 0, &buffer, 0, size);
                buffer
            })
            .collect();

        self.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = mpsc::channel();
        for buffer in &staging {
            let tx = tx.clone();
            buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
        }
        drop(tx);

        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| GpuError::Poll(e.to_string()))?;
        for _ in &staging {
            rx.recv().map_err(|_| GpuError::ReadbackChannelClosed)??;
        }

        let mut out = Vec::with_capacity(staging.len());
        for buffer in &staging {
            {
                let data = buffer.slice(..).get_mapped_range();
                out.push(bytemuck::cast_slice::<u8, u32>(&data).to_vec());
            }
            buffer.unmap();
        }
        Ok(out)
    }

    /// Like [`GpuContext::read_words`] for a single buffer.
    pub(crate) fn read_buffer(
        &self,
        encoder: wgpu::CommandEncoder,
        source: &wgpu::Buffer,
        size: u64,
    ) -> Result<Vec<u32>, GpuError> {
        let mut words = self.read_words(encoder, &[(source, size)])?;
        Ok(words.pop().unwrap_or_default())
    }
}

/// Storage buffer binding visible to compute shaders.
pub(crate) fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Uniform buffer binding visible to compute shaders.
pub(crate) fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Workgroup counts covering `invocations` 1-D invocations of size [`LINEAR`],
/// folded into a second dimension once the first is full. Shaders recover the
/// linear id as `id.y * num_workgroups.x * LINEAR + id.x`.
pub(crate) fn linear_groups(invocations: u32) -> (u32, u32, u32) {
    let groups = invocations.div_ceil(LINEAR).max(1);
    if groups <= MAX_GROUPS_PER_DIM {
        (groups, 1, 1)
    } else {
        (MAX_GROUPS_PER_DIM, groups.div_ceil(MAX_GROUPS_PER_DIM), 1)
    }
}

/// Round a byte count up to a whole number of 32-bit words.
#[inline]
pub(crate) fn word_bytes(bytes: usize) -> u64 {
    (bytes.div_ceil(4) * 4) as u64
}

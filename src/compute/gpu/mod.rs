//! GPU Compute Backend for palette quantization
//!
//! Runs the data-parallel stages as WebGPU (wgpu) compute shaders.

mod backend;
mod context;
mod distance;
mod histogram;
mod lookup;
mod quantize;
mod temporal;

pub use backend::GpuBackend;
pub use context::GpuContext;
pub use distance::GpuDistanceField;
pub use histogram::GpuHistogram;
pub use lookup::{GpuLookupBuilder, GpuLookupTable};
pub use quantize::GpuFrameQuantizer;
pub use temporal::GpuDiffTracker;

/// Error type for GPU operations.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Waiting for the GPU failed: {0}")]
    Poll(String),

    #[error("Readback channel closed before the buffer was mapped")]
    ReadbackChannelClosed,

    #[error("{label} needs {size} bytes, device allows {limit}")]
    BufferTooLarge { label: String, size: u64, limit: u64 },
}

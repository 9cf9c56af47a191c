//! Schema module - Colors, frames and configuration for the quantization pipeline.

mod color;
mod config;
mod frame;
mod scene;

pub use color::*;
pub use config::*;
pub use frame::*;
pub use scene::*;

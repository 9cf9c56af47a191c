//! Animquant - Palette quantization and temporal diffing for animated images.
//!
//! This crate turns a sequence of full-color composited frames into a single
//! shared palette of at most 255 colors plus a transparent slot, and a
//! sequence of indexed frames cropped to what changed since the previous one.
//!
//! # Architecture
//!
//! The crate is split into four modules:
//!
//! - `schema`: Colors, frames and configuration
//! - `compute`: The data-parallel stages (histogram, Lab distances, palette
//!   selection, lookup table, quantization, temporal diff) on the CPU, with
//!   a wgpu implementation in `compute::gpu`
//! - `animation`: Frame source and container sink traits
//! - `pipeline`: The end-to-end [`Palettizer`]
//!
//! # Example
//!
//! ```rust,no_run
//! use animquant::{
//!     animation::MemorySink,
//!     compute::CpuBackend,
//!     pipeline::Palettizer,
//!     schema::{QuantizerConfig, Scene},
//! };
//!
//! // A synthetic layered animation
//! let mut scene = Scene::default();
//!
//! // Quantize on the CPU and collect the result in memory
//! let mut palettizer = Palettizer::new(CpuBackend::new(), QuantizerConfig::default())?;
//! let mut sink = MemorySink::new();
//! let summary = palettizer.encode(&mut scene, &mut sink)?;
//!
//! println!(
//!     "{} colors, {} of {} frames emitted",
//!     summary.palette_len, summary.frames_emitted, summary.frames_in
//! );
//! # Ok::<(), animquant::compute::QuantizeError>(())
//! ```

pub mod animation;
pub mod compute;
pub mod pipeline;
pub mod schema;

// Re-export commonly used types
pub use compute::{CpuBackend, Palette, QuantizeError, QuantizedFrame};
pub use pipeline::{EncodeSummary, Palettizer};
pub use schema::{Color, Frame, QuantizerConfig, Scene};

//! Boundaries between the quantizer and the outside world.
//!
//! Decoding source animations and writing the final container are not part
//! of this crate. They plug in through two traits:
//!
//! - [`FrameSource`] hands over composited full-color frames with their
//!   display durations.
//! - [`ContainerSink`] receives the palette once, then every emitted frame as
//!   a cropped index rectangle with its placement and delay.
//!
//! In-memory implementations of both are provided for tests, benchmarks and
//! the command-line demo.

mod sink;
mod source;
mod timing;

pub use sink::{AnimationInfo, ContainerSink, EncodedFrame, MemorySink};
pub use source::{FrameSource, MemorySource};
pub use timing::{delay_centiseconds, duration_from_centiseconds};

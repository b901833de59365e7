//! Pipeline finalization and pixel processing.
//!
//! Ops from `colorpipe-ops` are sequenced in a [`Pipeline`], then
//! [`Pipeline::finalize`] validates the chain, reconciles bit depths,
//! optimizes, and compiles it into an immutable [`Processor`]. The
//! processor applies the transform to RGBA f32 buffers in place or
//! converts between packed buffers via [`PixelSlice`] views.
//!
//! ```
//! use colorpipe_core::BitDepth;
//! use colorpipe_engine::Pipeline;
//! use colorpipe_ops::RangeOp;
//!
//! let mut pipeline = Pipeline::new();
//! pipeline.push(RangeOp::clamp_full_range(BitDepth::U8, BitDepth::F32));
//! let processor = pipeline.finalize().unwrap();
//!
//! let mut rgba = [255.0f32, 128.0, 0.0, 255.0];
//! processor.apply_rgba(&mut rgba);
//! assert!((rgba[0] - 1.0).abs() < 1e-6);
//! ```

pub mod observer;
pub mod packing;
pub mod pipeline;
pub mod processor;

mod renderer;

pub use observer::{FinalizeObserver, NullObserver};
pub use packing::{PixelSlice, PixelSliceMut};
pub use pipeline::Pipeline;
pub use processor::Processor;

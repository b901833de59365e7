//! Color operators for transform pipelines.
//!
//! Each op kind pairs a parameter payload with the shared [`OpHeader`]
//! metadata. Ops validate themselves, know their identity and inverse,
//! and can re-declare their bit depths without changing the transform
//! they represent. The pipeline engine (`colorpipe-engine`) sequences
//! and renders them.

pub mod lut1d;
pub mod lut1d_inv;
pub mod lut3d;
pub mod lut3d_inv;
pub mod matrix;
pub mod op;
pub mod range;

pub use lut1d::{HalfFlags, HueAdjust, Lut1dOp};
pub use lut1d_inv::{ComponentProperties, InvLut1dOp};
pub use lut3d::{Lut3dOp, MAX_GRID_SIZE};
pub use lut3d_inv::{InvLut3dOp, FAST_LUT3D_GRID_SIZE};
pub use matrix::MatrixOp;
pub use op::{InvStyle, Op, OpHeader};
pub use range::RangeOp;

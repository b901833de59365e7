//! Core types for color transform pipelines.
//!
//! This crate provides the foundation shared by the operator model
//! (`colorpipe-ops`) and the pipeline engine (`colorpipe-engine`):
//!
//! - [`BitDepth`] - declared numerical encoding of buffers and op arrays
//! - [`Interpolation`] - LUT interpolation styles and their concretization
//! - [`Array`] - dense row-major storage for LUT tables
//! - [`Error`] / [`Result`] - the validation error taxonomy
//! - [`halfs`] - half-float bit-pattern helpers for half-domain LUTs

pub mod array;
pub mod depth;
pub mod error;
pub mod halfs;
pub mod interp;

pub use array::{Array, ArrayLayout};
pub use depth::BitDepth;
pub use error::{Error, Result};
pub use interp::Interpolation;

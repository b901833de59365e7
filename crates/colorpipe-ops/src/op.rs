//! Common op metadata and the op sum type the pipeline works on.

use colorpipe_core::{BitDepth, Result};

use crate::lut1d::Lut1dOp;
use crate::lut1d_inv::InvLut1dOp;
use crate::lut3d::Lut3dOp;
use crate::lut3d_inv::InvLut3dOp;
use crate::matrix::MatrixOp;
use crate::range::RangeOp;

/// Rendering strategy for inverse LUT ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvStyle {
    /// Analytical inversion of the forward interpolant.
    #[default]
    Exact,
    /// Sample the exact inversion into a forward LUT once, then render
    /// that.
    Fast,
}

/// Metadata shared by every op: declared depths, identifiers, and free
/// form descriptions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpHeader {
    input_depth: BitDepth,
    output_depth: BitDepth,
    id: String,
    name: String,
    descriptions: Vec<String>,
}

impl OpHeader {
    pub fn new(input_depth: BitDepth, output_depth: BitDepth) -> Self {
        Self {
            input_depth,
            output_depth,
            id: String::new(),
            name: String::new(),
            descriptions: Vec::new(),
        }
    }

    #[inline]
    pub fn input_depth(&self) -> BitDepth {
        self.input_depth
    }

    #[inline]
    pub fn output_depth(&self) -> BitDepth {
        self.output_depth
    }

    pub fn set_input_depth(&mut self, depth: BitDepth) {
        self.input_depth = depth;
    }

    pub fn set_output_depth(&mut self, depth: BitDepth) {
        self.output_depth = depth;
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[inline]
    pub fn descriptions(&self) -> &[String] {
        &self.descriptions
    }

    pub fn set_descriptions(&mut self, descriptions: Vec<String>) {
        self.descriptions = descriptions;
    }

    pub fn add_description(&mut self, description: impl Into<String>) {
        self.descriptions.push(description.into());
    }
}

/// One element of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Matrix(MatrixOp),
    Range(RangeOp),
    Lut1d(Lut1dOp),
    InvLut1d(InvLut1dOp),
    Lut3d(Lut3dOp),
    InvLut3d(InvLut3dOp),
}

impl Op {
    /// Short tag naming the op kind, used in logs and error context.
    pub fn kind(&self) -> &'static str {
        match self {
            Op::Matrix(_) => "matrix",
            Op::Range(_) => "range",
            Op::Lut1d(_) => "lut1d",
            Op::InvLut1d(_) => "invlut1d",
            Op::Lut3d(_) => "lut3d",
            Op::InvLut3d(_) => "invlut3d",
        }
    }

    pub fn input_depth(&self) -> BitDepth {
        match self {
            Op::Matrix(op) => op.input_depth(),
            Op::Range(op) => op.input_depth(),
            Op::Lut1d(op) => op.input_depth(),
            Op::InvLut1d(op) => op.input_depth(),
            Op::Lut3d(op) => op.input_depth(),
            Op::InvLut3d(op) => op.input_depth(),
        }
    }

    pub fn output_depth(&self) -> BitDepth {
        match self {
            Op::Matrix(op) => op.output_depth(),
            Op::Range(op) => op.output_depth(),
            Op::Lut1d(op) => op.output_depth(),
            Op::InvLut1d(op) => op.output_depth(),
            Op::Lut3d(op) => op.output_depth(),
            Op::InvLut3d(op) => op.output_depth(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Op::Matrix(op) => op.validate(),
            Op::Range(op) => op.validate(),
            Op::Lut1d(op) => op.validate(),
            Op::InvLut1d(op) => op.validate(),
            Op::Lut3d(op) => op.validate(),
            Op::InvLut3d(op) => op.validate(),
        }
    }

    /// Re-declares the input depth, adjusting stored parameters so the op
    /// keeps representing the same transform.
    pub fn set_input_bit_depth(&mut self, depth: BitDepth) {
        match self {
            Op::Matrix(op) => op.set_input_bit_depth(depth),
            Op::Range(op) => op.set_input_bit_depth(depth),
            Op::Lut1d(op) => op.set_input_bit_depth(depth),
            Op::InvLut1d(op) => op.set_input_bit_depth(depth),
            Op::Lut3d(op) => op.set_input_bit_depth(depth),
            Op::InvLut3d(op) => op.set_input_bit_depth(depth),
        }
    }

    /// Re-declares the output depth, adjusting stored parameters so the op
    /// keeps representing the same transform.
    pub fn set_output_bit_depth(&mut self, depth: BitDepth) {
        match self {
            Op::Matrix(op) => op.set_output_bit_depth(depth),
            Op::Range(op) => op.set_output_bit_depth(depth),
            Op::Lut1d(op) => op.set_output_bit_depth(depth),
            Op::InvLut1d(op) => op.set_output_bit_depth(depth),
            Op::Lut3d(op) => op.set_output_bit_depth(depth),
            Op::InvLut3d(op) => op.set_output_bit_depth(depth),
        }
    }

    /// Whether the op is the identity conversion between its depths.
    pub fn is_identity(&self) -> bool {
        match self {
            Op::Matrix(op) => op.is_identity(),
            Op::Range(op) => op.is_identity(),
            Op::Lut1d(op) => op.is_identity(),
            Op::InvLut1d(op) => op.is_identity(),
            Op::Lut3d(op) => op.is_identity(),
            Op::InvLut3d(op) => op.is_identity(),
        }
    }

    /// Identity with equal depths.
    pub fn is_noop(&self) -> bool {
        match self {
            Op::Matrix(op) => op.is_noop(),
            Op::Range(op) => op.is_noop(),
            Op::Lut1d(op) => op.is_noop(),
            Op::InvLut1d(op) => op.is_noop(),
            Op::Lut3d(op) => op.is_noop(),
            Op::InvLut3d(op) => op.is_noop(),
        }
    }

    /// Whether the op restricts its input domain (only ranges do).
    pub fn clips(&self) -> bool {
        match self {
            Op::Range(op) => op.clips(),
            _ => false,
        }
    }

    /// Whether the two ops form a forward/inverse LUT pair, in either
    /// order. Adjacent pairs cancel and can be dropped from a pipeline.
    pub fn is_inverse_of(&self, other: &Op) -> bool {
        match (self, other) {
            (Op::Lut1d(fwd), Op::InvLut1d(inv)) | (Op::InvLut1d(inv), Op::Lut1d(fwd)) => {
                inv.is_inverse_of(fwd)
            }
            (Op::Lut3d(fwd), Op::InvLut3d(inv)) | (Op::InvLut3d(inv), Op::Lut3d(fwd)) => {
                inv.is_inverse_of(fwd)
            }
            _ => false,
        }
    }

    /// The inverse op, with depths swapped.
    pub fn inverse(&self) -> Result<Op> {
        Ok(match self {
            Op::Matrix(op) => Op::Matrix(op.inverse()?),
            Op::Range(op) => Op::Range(op.inverse()?),
            Op::Lut1d(op) => Op::InvLut1d(InvLut1dOp::from_forward(op)?),
            Op::InvLut1d(op) => Op::Lut1d(op.inverse()),
            Op::Lut3d(op) => Op::InvLut3d(InvLut3dOp::from_forward(op)?),
            Op::InvLut3d(op) => Op::Lut3d(op.inverse()),
        })
    }
}

impl From<MatrixOp> for Op {
    fn from(op: MatrixOp) -> Self {
        Op::Matrix(op)
    }
}

impl From<RangeOp> for Op {
    fn from(op: RangeOp) -> Self {
        Op::Range(op)
    }
}

impl From<Lut1dOp> for Op {
    fn from(op: Lut1dOp) -> Self {
        Op::Lut1d(op)
    }
}

impl From<InvLut1dOp> for Op {
    fn from(op: InvLut1dOp) -> Self {
        Op::InvLut1d(op)
    }
}

impl From<Lut3dOp> for Op {
    fn from(op: Lut3dOp) -> Self {
        Op::Lut3d(op)
    }
}

impl From<InvLut3dOp> for Op {
    fn from(op: InvLut3dOp) -> Self {
        Op::InvLut3d(op)
    }
}

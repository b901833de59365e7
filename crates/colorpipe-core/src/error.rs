//! Error taxonomy for pipeline construction and finalization.
//!
//! All failure modes surface at validate/finalize time, before a pipeline
//! becomes callable; the apply path is infallible. Each variant is a stable
//! tag; the payload carries a human-readable description of the op and the
//! constraint that was violated.

use thiserror::Error;

use crate::depth::BitDepth;
use crate::interp::Interpolation;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while constructing, validating, or finalizing ops.
#[derive(Debug, Error)]
pub enum Error {
    /// An op carries an unknown or unusable bit depth.
    #[error("invalid bit depth {depth} for {what}")]
    InvalidBitDepth {
        /// The offending depth.
        depth: BitDepth,
        /// Which op or field carried it.
        what: String,
    },

    /// An interpolation style is not usable for the op kind.
    #[error("interpolation '{interp}' is not supported for {what}")]
    InvalidInterpolation {
        /// The offending style.
        interp: Interpolation,
        /// Which op kind rejected it.
        what: String,
    },

    /// A matrix has no inverse.
    #[error("singular matrix cannot be inverted")]
    SingularMatrix,

    /// An array's declared dimensions do not match its storage.
    #[error("malformed array: expected {expected} values, got {got}")]
    MalformedArray {
        /// Expected number of stored values.
        expected: usize,
        /// Actual number of stored values.
        got: usize,
    },

    /// A semantic constraint on an op's parameters was violated.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// A 3D LUT grid exceeds the supported size.
    #[error("3D LUT grid size {got} exceeds the maximum of {max}")]
    GridTooLarge {
        /// Requested edge length.
        got: usize,
        /// Largest supported edge length.
        max: usize,
    },

    /// Adjacent ops or composed ops disagree on bit depth.
    #[error("incompatible bit depths: {out} feeds {inp}{context}")]
    IncompatibleBitDepths {
        /// Producer output depth.
        out: BitDepth,
        /// Consumer input depth.
        inp: BitDepth,
        /// Extra context (op ids), possibly empty.
        context: String,
    },

    /// A packed buffer does not match the processor's declared format.
    #[error("buffer mismatch: {0}")]
    BufferMismatch(String),
}

impl Error {
    /// Creates an [`Error::InvalidBitDepth`].
    #[inline]
    pub fn invalid_bit_depth(depth: BitDepth, what: impl Into<String>) -> Self {
        Self::InvalidBitDepth {
            depth,
            what: what.into(),
        }
    }

    /// Creates an [`Error::InvalidInterpolation`].
    #[inline]
    pub fn invalid_interpolation(interp: Interpolation, what: impl Into<String>) -> Self {
        Self::InvalidInterpolation {
            interp,
            what: what.into(),
        }
    }

    /// Creates an [`Error::MalformedArray`].
    #[inline]
    pub fn malformed_array(expected: usize, got: usize) -> Self {
        Self::MalformedArray { expected, got }
    }

    /// Creates an [`Error::ValidationFailed`].
    #[inline]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    /// Creates an [`Error::IncompatibleBitDepths`].
    #[inline]
    pub fn depth_mismatch(out: BitDepth, inp: BitDepth, context: impl Into<String>) -> Self {
        let context = context.into();
        let context = if context.is_empty() {
            context
        } else {
            format!(" ({context})")
        };
        Self::IncompatibleBitDepths { out, inp, context }
    }

    /// Stable tag name of the variant, for diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidBitDepth { .. } => "InvalidBitDepth",
            Self::InvalidInterpolation { .. } => "InvalidInterpolation",
            Self::SingularMatrix => "SingularMatrix",
            Self::MalformedArray { .. } => "MalformedArray",
            Self::ValidationFailed(_) => "ValidationFailed",
            Self::GridTooLarge { .. } => "GridTooLarge",
            Self::IncompatibleBitDepths { .. } => "IncompatibleBitDepths",
            Self::BufferMismatch(_) => "BufferMismatch",
        }
    }
}

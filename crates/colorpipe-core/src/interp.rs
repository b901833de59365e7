//! LUT interpolation styles.
//!
//! The public model carries abstract styles (`Default`, `Best`) that are
//! resolved to a concrete algorithm per op kind before rendering.

use crate::error::{Error, Result};

/// Interpolation style for 1D and 3D LUT evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    /// Nearest table entry, no blending.
    Nearest,
    /// Piecewise linear (trilinear for 3D LUTs).
    Linear,
    /// Six-tetrahedra cube split (3D LUTs only).
    Tetrahedral,
    /// Cubic spline. Not supported by this engine; rejected at validate.
    Cubic,
    /// Let the op pick its customary style.
    #[default]
    Default,
    /// Highest quality available for the op kind.
    Best,
    /// Unrecognized style from a loader. Rejected at validate.
    Unknown,
}

impl Interpolation {
    /// Resolves the style to a concrete algorithm for a 1D LUT.
    pub fn concretize_1d(self) -> Result<Interpolation> {
        match self {
            Self::Nearest => Ok(Self::Nearest),
            Self::Linear | Self::Default | Self::Best => Ok(Self::Linear),
            other => Err(Error::invalid_interpolation(other, "1D LUT")),
        }
    }

    /// Resolves the style to a concrete algorithm for a 3D LUT.
    pub fn concretize_3d(self) -> Result<Interpolation> {
        match self {
            Self::Nearest => Ok(Self::Nearest),
            Self::Linear | Self::Default => Ok(Self::Linear),
            Self::Tetrahedral | Self::Best => Ok(Self::Tetrahedral),
            other => Err(Error::invalid_interpolation(other, "3D LUT")),
        }
    }
}

impl std::fmt::Display for Interpolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
            Self::Tetrahedral => "tetrahedral",
            Self::Cubic => "cubic",
            Self::Default => "default",
            Self::Best => "best",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

//! Bit depth specification for pixel buffers and op arrays.
//!
//! Every array stored in an op is expressed in units of the associated
//! depth's max value (a U10 array stores 1.0 as 1023.0). All public inputs
//! and outputs of the engine use these scaled units.

/// Declared numerical encoding range of a buffer or op array.
///
/// Integer formats:
/// - `U8` - 8-bit unsigned [0, 255]
/// - `U10` - 10-bit unsigned [0, 1023] (DPX, broadcast)
/// - `U12` - 12-bit unsigned [0, 4095] (cinema cameras)
/// - `U16` - 16-bit unsigned [0, 65535]
///
/// Floating-point formats:
/// - `F16` - 16-bit half-precision IEEE 754
/// - `F32` - 32-bit single-precision (VFX working standard)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BitDepth {
    /// Unknown / not yet declared. Rejected by validate().
    Unknown,
    /// 8-bit unsigned integer.
    U8,
    /// 10-bit unsigned integer.
    U10,
    /// 12-bit unsigned integer.
    U12,
    /// 16-bit unsigned integer.
    U16,
    /// 16-bit half-precision float.
    F16,
    /// 32-bit single-precision float.
    #[default]
    F32,
}

impl BitDepth {
    /// Maximum representable code value of the depth.
    ///
    /// 1.0 for float depths, `2^bits - 1` for integer depths,
    /// NaN for [`BitDepth::Unknown`] (callers must validate before use).
    #[inline]
    pub fn max_value(self) -> f64 {
        match self {
            Self::Unknown => f64::NAN,
            Self::U8 => 255.0,
            Self::U10 => 1023.0,
            Self::U12 => 4095.0,
            Self::U16 => 65535.0,
            Self::F16 | Self::F32 => 1.0,
        }
    }

    /// Whether this is a floating-point depth.
    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, Self::F16 | Self::F32)
    }

    /// Whether this is an integer depth.
    #[inline]
    pub fn is_integer(self) -> bool {
        matches!(self, Self::U8 | Self::U10 | Self::U12 | Self::U16)
    }

    /// Spacing of identity-LUT entries: `max_value / (length - 1)`.
    #[inline]
    pub fn step_size(self, length: usize) -> f64 {
        debug_assert!(length > 1);
        self.max_value() / (length as f64 - 1.0)
    }

    /// Scale factor that converts values from `self` units to `to` units.
    #[inline]
    pub fn scale_to(self, to: BitDepth) -> f64 {
        to.max_value() / self.max_value()
    }
}

impl std::fmt::Display for BitDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::U8 => "8ui",
            Self::U10 => "10ui",
            Self::U12 => "12ui",
            Self::U16 => "16ui",
            Self::F16 => "16f",
            Self::F32 => "32f",
        };
        f.write_str(s)
    }
}

//! Packed pixel buffer views for the processor's apply path.
//!
//! Buffers are tightly packed RGBA in the declared depth's native storage:
//! U8 as bytes, U10/U12/U16 as u16, F16 as IEEE halfs, F32 as floats.
//! Values travel through the renderers as f32 in scaled units (a U10
//! buffer carries 0.0..=1023.0).

use colorpipe_core::BitDepth;
use half::f16;

/// Read-only view of a packed RGBA buffer.
#[derive(Debug, Clone, Copy)]
pub enum PixelSlice<'a> {
    U8(&'a [u8]),
    /// Storage for the U10, U12, and U16 depths.
    U16(&'a [u16]),
    F16(&'a [f16]),
    F32(&'a [f32]),
}

/// Mutable view of a packed RGBA buffer.
#[derive(Debug)]
pub enum PixelSliceMut<'a> {
    U8(&'a mut [u8]),
    /// Storage for the U10, U12, and U16 depths.
    U16(&'a mut [u16]),
    F16(&'a mut [f16]),
    F32(&'a mut [f32]),
}

fn storage_matches(depth: BitDepth, is_u8: bool, is_u16: bool, is_f16: bool, is_f32: bool) -> bool {
    match depth {
        BitDepth::U8 => is_u8,
        BitDepth::U10 | BitDepth::U12 | BitDepth::U16 => is_u16,
        BitDepth::F16 => is_f16,
        BitDepth::F32 => is_f32,
        BitDepth::Unknown => false,
    }
}

impl PixelSlice<'_> {
    /// Number of stored values (4 per pixel).
    pub fn len(&self) -> usize {
        match self {
            Self::U8(s) => s.len(),
            Self::U16(s) => s.len(),
            Self::F16(s) => s.len(),
            Self::F32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this storage kind can carry `depth`.
    pub fn matches(&self, depth: BitDepth) -> bool {
        storage_matches(
            depth,
            matches!(self, Self::U8(_)),
            matches!(self, Self::U16(_)),
            matches!(self, Self::F16(_)),
            matches!(self, Self::F32(_)),
        )
    }

    /// Copies `dst.len()` values starting at `start` into f32 scratch.
    pub(crate) fn load(&self, start: usize, dst: &mut [f32]) {
        match self {
            Self::U8(s) => {
                for (d, &v) in dst.iter_mut().zip(&s[start..]) {
                    *d = v as f32;
                }
            }
            Self::U16(s) => {
                for (d, &v) in dst.iter_mut().zip(&s[start..]) {
                    *d = v as f32;
                }
            }
            Self::F16(s) => {
                for (d, &v) in dst.iter_mut().zip(&s[start..]) {
                    *d = v.to_f32();
                }
            }
            Self::F32(s) => dst.copy_from_slice(&s[start..start + dst.len()]),
        }
    }
}

impl PixelSliceMut<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(s) => s.len(),
            Self::U16(s) => s.len(),
            Self::F16(s) => s.len(),
            Self::F32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn matches(&self, depth: BitDepth) -> bool {
        storage_matches(
            depth,
            matches!(self, Self::U8(_)),
            matches!(self, Self::U16(_)),
            matches!(self, Self::F16(_)),
            matches!(self, Self::F32(_)),
        )
    }

    /// Writes `src` into the buffer at `start`, rounding and clamping for
    /// integer depths. NaN stores as 0 in integer formats.
    pub(crate) fn store(&mut self, start: usize, src: &[f32], depth: BitDepth) {
        let max = depth.max_value() as f32;
        match self {
            Self::U8(s) => {
                for (d, &v) in s[start..].iter_mut().zip(src) {
                    *d = v.round().clamp(0.0, max) as u8;
                }
            }
            Self::U16(s) => {
                for (d, &v) in s[start..].iter_mut().zip(src) {
                    *d = v.round().clamp(0.0, max) as u16;
                }
            }
            Self::F16(s) => {
                for (d, &v) in s[start..].iter_mut().zip(src) {
                    *d = f16::from_f32(v);
                }
            }
            Self::F32(s) => s[start..start + src.len()].copy_from_slice(src),
        }
    }
}

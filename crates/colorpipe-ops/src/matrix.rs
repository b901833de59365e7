//! 4x4 matrix op with per-channel offsets.
//!
//! Coefficients and offsets are stored as f64 in the scaled units of the
//! declared bit depths: a matrix from U8 to F32 that preserves values has
//! 1/255 on its diagonal. Composition, inversion, and identity detection
//! all happen in these units.

use colorpipe_core::{BitDepth, Error, Result};

use crate::op::OpHeader;

/// Relative snap tolerance applied after composition.
pub const COMPOSE_SNAP_TOLERANCE: f64 = 1e-6;

/// A 4x4 matrix multiply followed by a per-channel offset add.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixOp {
    header: OpHeader,
    /// Row-major 4x4 coefficients.
    coeffs: [f64; 16],
    /// Post-multiply offsets, one per channel.
    offsets: [f64; 4],
}

impl MatrixOp {
    /// The identity conversion between two depths: a diagonal matrix whose
    /// diagonal is `max_value(output) / max_value(input)`, no offsets.
    pub fn identity(input: BitDepth, output: BitDepth) -> Self {
        let scale = input.scale_to(output);
        let mut coeffs = [0.0; 16];
        for i in 0..4 {
            coeffs[i * 4 + i] = scale;
        }
        Self {
            header: OpHeader::new(input, output),
            coeffs,
            offsets: [0.0; 4],
        }
    }

    /// Builds a matrix from explicit row-major coefficients and offsets.
    pub fn from_coeffs(
        input: BitDepth,
        output: BitDepth,
        coeffs: [f64; 16],
        offsets: [f64; 4],
    ) -> Self {
        Self {
            header: OpHeader::new(input, output),
            coeffs,
            offsets,
        }
    }

    /// Builds a matrix from a 3x3 RGB block; alpha passes through with the
    /// depth conversion scale.
    pub fn from_rgb(input: BitDepth, output: BitDepth, rgb: [f64; 9]) -> Self {
        let mut m = Self::identity(input, output);
        for r in 0..3 {
            for c in 0..3 {
                m.coeffs[r * 4 + c] = rgb[r * 3 + c];
            }
        }
        m
    }

    /// Op header (depths, id, name, descriptions).
    #[inline]
    pub fn header(&self) -> &OpHeader {
        &self.header
    }

    /// Mutable op header.
    #[inline]
    pub fn header_mut(&mut self) -> &mut OpHeader {
        &mut self.header
    }

    #[inline]
    pub fn input_depth(&self) -> BitDepth {
        self.header.input_depth()
    }

    #[inline]
    pub fn output_depth(&self) -> BitDepth {
        self.header.output_depth()
    }

    /// Row-major 4x4 coefficients.
    #[inline]
    pub fn coeffs(&self) -> &[f64; 16] {
        &self.coeffs
    }

    /// Per-channel offsets.
    #[inline]
    pub fn offsets(&self) -> &[f64; 4] {
        &self.offsets
    }

    /// Sets one coefficient (row-major index).
    pub fn set_coeff(&mut self, row: usize, col: usize, value: f64) {
        self.coeffs[row * 4 + col] = value;
    }

    /// Sets one offset.
    pub fn set_offset(&mut self, channel: usize, value: f64) {
        self.offsets[channel] = value;
    }

    /// Checks depths are declared and all parameters are finite.
    pub fn validate(&self) -> Result<()> {
        for (depth, side) in [
            (self.input_depth(), "matrix input"),
            (self.output_depth(), "matrix output"),
        ] {
            if depth == BitDepth::Unknown {
                return Err(Error::invalid_bit_depth(depth, side));
            }
        }
        if self.coeffs.iter().any(|v| !v.is_finite())
            || self.offsets.iter().any(|v| !v.is_finite())
        {
            return Err(Error::validation("matrix has non-finite coefficients"));
        }
        Ok(())
    }

    /// Whether all off-diagonal coefficients are zero.
    pub fn is_diagonal(&self) -> bool {
        for r in 0..4 {
            for c in 0..4 {
                if r != c && self.coeffs[r * 4 + c] != 0.0 {
                    return false;
                }
            }
        }
        true
    }

    /// Whether any offset is nonzero.
    pub fn has_offsets(&self) -> bool {
        self.offsets.iter().any(|&v| v != 0.0)
    }

    /// Whether the op mixes color channels: any off-diagonal element of the
    /// RGB 3x3 block is nonzero, or any offset is nonzero.
    pub fn has_channel_crosstalk(&self) -> bool {
        for r in 0..3 {
            for c in 0..3 {
                if r != c && self.coeffs[r * 4 + c] != 0.0 {
                    return true;
                }
            }
        }
        self.has_offsets()
    }

    /// Whether this matrix is exactly the identity conversion between its
    /// declared depths.
    pub fn is_identity(&self) -> bool {
        if self.has_offsets() || !self.is_diagonal() {
            return false;
        }
        let scale = self.input_depth().scale_to(self.output_depth());
        (0..4).all(|i| self.coeffs[i * 4 + i] == scale)
    }

    /// Identity with equal input and output depths.
    pub fn is_noop(&self) -> bool {
        self.input_depth() == self.output_depth() && self.is_identity()
    }

    /// Applies the matrix and offsets to one RGBA quad.
    pub fn apply(&self, rgba: [f64; 4]) -> [f64; 4] {
        let mut out = [0.0; 4];
        for r in 0..4 {
            let row = &self.coeffs[r * 4..r * 4 + 4];
            out[r] = row[0] * rgba[0]
                + row[1] * rgba[1]
                + row[2] * rgba[2]
                + row[3] * rgba[3]
                + self.offsets[r];
        }
        out
    }

    /// Re-declares the output depth, rescaling coefficients and offsets so
    /// the op represents the same transform in the new units.
    pub fn set_output_bit_depth(&mut self, depth: BitDepth) {
        let factor = self.output_depth().scale_to(depth);
        if factor != 1.0 {
            for v in &mut self.coeffs {
                *v *= factor;
            }
            for v in &mut self.offsets {
                *v *= factor;
            }
        }
        self.header.set_output_depth(depth);
    }

    /// Re-declares the input depth, rescaling coefficients only (offsets are
    /// in output units and do not move).
    pub fn set_input_bit_depth(&mut self, depth: BitDepth) {
        let factor = depth.scale_to(self.input_depth());
        if factor != 1.0 {
            for v in &mut self.coeffs {
                *v *= factor;
            }
        }
        self.header.set_input_depth(depth);
    }

    /// Composes `self` followed by `rhs` into a single matrix, using the
    /// default snap tolerance.
    pub fn compose(&self, rhs: &MatrixOp) -> Result<MatrixOp> {
        self.compose_with_tolerance(rhs, COMPOSE_SNAP_TOLERANCE)
    }

    /// Composes `self` followed by `rhs`, snapping near-integer results to
    /// integers with the given relative tolerance.
    ///
    /// The output depth of `self` must equal the input depth of `rhs`.
    pub fn compose_with_tolerance(&self, rhs: &MatrixOp, rel_tol: f64) -> Result<MatrixOp> {
        if self.output_depth() != rhs.input_depth() {
            return Err(Error::depth_mismatch(
                self.output_depth(),
                rhs.input_depth(),
                "matrix compose",
            ));
        }
        let mut coeffs = [0.0; 16];
        for r in 0..4 {
            for c in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += rhs.coeffs[r * 4 + k] * self.coeffs[k * 4 + c];
                }
                coeffs[r * 4 + c] = sum;
            }
        }
        let mut offsets = [0.0; 4];
        for r in 0..4 {
            let mut sum = rhs.offsets[r];
            for k in 0..4 {
                sum += rhs.coeffs[r * 4 + k] * self.offsets[k];
            }
            offsets[r] = sum;
        }
        let mut header = OpHeader::new(self.input_depth(), rhs.output_depth());
        header.set_id(format!("{}{}", self.header.id(), rhs.header.id()));
        let mut descriptions = self.header.descriptions().to_vec();
        descriptions.extend_from_slice(rhs.header.descriptions());
        header.set_descriptions(descriptions);
        let mut out = MatrixOp {
            header,
            coeffs,
            offsets,
        };
        out.clean_up(rel_tol);
        Ok(out)
    }

    /// Snaps coefficients and offsets that are within tolerance of an
    /// integer to that integer. The tolerance is absolute, derived from the
    /// magnitude of the values: `max(|largest|, 1e-4) * rel_tol`.
    fn clean_up(&mut self, rel_tol: f64) {
        let mut max_m = 0.0f64;
        for &v in &self.coeffs {
            max_m = max_m.max(v.abs());
        }
        let tol = max_m.max(1e-4) * rel_tol;
        for v in &mut self.coeffs {
            let r = v.round();
            if (*v - r).abs() < tol {
                *v = r;
            }
        }
        let mut max_o = 0.0f64;
        for &v in &self.offsets {
            max_o = max_o.max(v.abs());
        }
        let off_tol = max_o.max(1e-4) * rel_tol;
        for v in &mut self.offsets {
            let r = v.round();
            if (*v - r).abs() < off_tol {
                *v = r;
            }
        }
    }

    /// The inverse matrix op: swapped depths, inverted coefficients, and
    /// offsets mapped through the inverse.
    ///
    /// Fails with [`Error::SingularMatrix`] when no inverse exists.
    pub fn inverse(&self) -> Result<MatrixOp> {
        let inv = gj_inverse(&self.coeffs)?;
        let mut offsets = [0.0; 4];
        for r in 0..4 {
            let mut sum = 0.0;
            for c in 0..4 {
                sum += inv[r * 4 + c] * self.offsets[c];
            }
            offsets[r] = -sum;
        }
        let mut header = self.header.clone();
        header.set_input_depth(self.output_depth());
        header.set_output_depth(self.input_depth());
        Ok(MatrixOp {
            header,
            coeffs: inv,
            offsets,
        })
    }
}

/// Gauss-Jordan 4x4 inversion with partial pivoting.
///
/// A pivot of exactly zero after row selection means the matrix is singular.
fn gj_inverse(m: &[f64; 16]) -> Result<[f64; 16]> {
    let mut t = *m;
    let mut s = [0.0; 16];
    for i in 0..4 {
        s[i * 4 + i] = 1.0;
    }

    // Forward elimination.
    for i in 0..3 {
        let mut pivot = i;
        let mut pivot_size = t[i * 4 + i].abs();
        for j in (i + 1)..4 {
            let tmp = t[j * 4 + i].abs();
            if tmp > pivot_size {
                pivot = j;
                pivot_size = tmp;
            }
        }
        if pivot_size == 0.0 {
            return Err(Error::SingularMatrix);
        }
        if pivot != i {
            for k in 0..4 {
                t.swap(i * 4 + k, pivot * 4 + k);
                s.swap(i * 4 + k, pivot * 4 + k);
            }
        }
        for j in (i + 1)..4 {
            let f = t[j * 4 + i] / t[i * 4 + i];
            for k in 0..4 {
                t[j * 4 + k] -= f * t[i * 4 + k];
                s[j * 4 + k] -= f * s[i * 4 + k];
            }
        }
    }

    // Backward substitution.
    for i in (0..4).rev() {
        let f = t[i * 4 + i];
        if f == 0.0 {
            return Err(Error::SingularMatrix);
        }
        for j in 0..4 {
            t[i * 4 + j] /= f;
            s[i * 4 + j] /= f;
        }
        for j in 0..i {
            let g = t[j * 4 + i];
            for k in 0..4 {
                t[j * 4 + k] -= g * t[i * 4 + k];
                s[j * 4 + k] -= g * s[i * 4 + k];
            }
        }
    }
    Ok(s)
}

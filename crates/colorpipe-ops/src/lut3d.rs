//! 3D LUT op: cube lookup with trilinear or tetrahedral interpolation.
//!
//! The cube is stored blue-fastest: entry `(r, g, b)` lives at index
//! `(r * n + g) * n + b`. Values are in output-depth units.

use colorpipe_core::{Array, ArrayLayout, BitDepth, Error, Interpolation, Result};

use crate::op::OpHeader;

/// Largest supported cube edge length.
pub const MAX_GRID_SIZE: usize = 129;

/// 3D cube lookup over the RGB channels. Alpha passes through unchanged
/// apart from depth conversion, handled by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut3dOp {
    header: OpHeader,
    interpolation: Interpolation,
    array: Array,
}

impl Lut3dOp {
    /// An identity cube of edge length `n`.
    pub fn identity(input: BitDepth, output: BitDepth, n: usize) -> Self {
        let mut array = Array::new(ArrayLayout::Cube, n, 3);
        let step = output.step_size(n) as f32;
        {
            let values = array.values_mut();
            for r in 0..n {
                for g in 0..n {
                    for b in 0..n {
                        let e = ((r * n + g) * n + b) * Array::MAX_COMPONENTS;
                        values[e] = r as f32 * step;
                        values[e + 1] = g as f32 * step;
                        values[e + 2] = b as f32 * step;
                    }
                }
            }
        }
        Self {
            header: OpHeader::new(input, output),
            interpolation: Interpolation::Default,
            array,
        }
    }

    /// Builds a cube from `n^3 * 3` values in blue-fastest RGB order.
    pub fn from_values(
        input: BitDepth,
        output: BitDepth,
        interpolation: Interpolation,
        n: usize,
        values: &[f32],
    ) -> Result<Self> {
        let expected = n * n * n * 3;
        if values.len() != expected {
            return Err(Error::malformed_array(expected, values.len()));
        }
        let mut array = Array::new(ArrayLayout::Cube, n, 3);
        {
            let dst = array.values_mut();
            for e in 0..n * n * n {
                dst[e * Array::MAX_COMPONENTS] = values[e * 3];
                dst[e * Array::MAX_COMPONENTS + 1] = values[e * 3 + 1];
                dst[e * Array::MAX_COMPONENTS + 2] = values[e * 3 + 2];
            }
        }
        Ok(Self {
            header: OpHeader::new(input, output),
            interpolation,
            array,
        })
    }

    #[inline]
    pub fn header(&self) -> &OpHeader {
        &self.header
    }

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

    #[inline]
    pub fn array(&self) -> &Array {
        &self.array
    }

    #[inline]
    pub fn array_mut(&mut self) -> &mut Array {
        &mut self.array
    }

    #[inline]
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }

    /// Cube edge length.
    #[inline]
    pub fn grid_size(&self) -> usize {
        self.array.length()
    }

    pub(crate) fn swap_depths(&mut self) {
        let inp = self.header.input_depth();
        let out = self.header.output_depth();
        self.header.set_input_depth(out);
        self.header.set_output_depth(inp);
    }

    pub fn validate(&self) -> Result<()> {
        for (depth, side) in [
            (self.input_depth(), "3D LUT input"),
            (self.output_depth(), "3D LUT output"),
        ] {
            if depth == BitDepth::Unknown {
                return Err(Error::invalid_bit_depth(depth, side));
            }
        }
        self.interpolation.concretize_3d()?;
        self.array.validate()?;
        if self.array.num_components() != 3 {
            return Err(Error::validation(format!(
                "3D LUT must have 3 components, got {}",
                self.array.num_components()
            )));
        }
        let n = self.grid_size();
        if n < 2 {
            return Err(Error::validation(format!(
                "3D LUT edge length must be at least 2, got {n}"
            )));
        }
        if n > MAX_GRID_SIZE {
            return Err(Error::GridTooLarge {
                got: n,
                max: MAX_GRID_SIZE,
            });
        }
        Ok(())
    }

    /// The RGB value stored at grid point `(r, g, b)`.
    #[inline]
    pub fn rgb_at(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        let n = self.grid_size();
        let e = ((r * n + g) * n + b) * Array::MAX_COMPONENTS;
        let v = self.array.values();
        [v[e], v[e + 1], v[e + 2]]
    }

    /// Sets the RGB value at grid point `(r, g, b)`.
    pub fn set_rgb_at(&mut self, r: usize, g: usize, b: usize, rgb: [f32; 3]) {
        let n = self.grid_size();
        let e = ((r * n + g) * n + b) * Array::MAX_COMPONENTS;
        let v = self.array.values_mut();
        v[e] = rgb[0];
        v[e + 1] = rgb[1];
        v[e + 2] = rgb[2];
    }

    /// Evaluates the cube on one RGB triple.
    ///
    /// Inputs are scaled from input-depth units onto the grid and clamped;
    /// NaN components index grid position 0.
    pub fn eval_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        let n = self.grid_size();
        let last = (n - 1) as f32;
        let scale = last / self.input_depth().max_value() as f32;
        let mut idx = [0usize; 3];
        let mut frac = [0.0f32; 3];
        for c in 0..3 {
            let mut t = rgb[c] * scale;
            if t.is_nan() {
                t = 0.0;
            }
            t = t.clamp(0.0, last);
            let lo = (t as usize).min(n - 2);
            idx[c] = lo;
            frac[c] = t - lo as f32;
        }
        let interp = self
            .interpolation
            .concretize_3d()
            .unwrap_or(Interpolation::Linear);
        match interp {
            Interpolation::Nearest => {
                let r = if frac[0] < 0.5 { idx[0] } else { idx[0] + 1 };
                let g = if frac[1] < 0.5 { idx[1] } else { idx[1] + 1 };
                let b = if frac[2] < 0.5 { idx[2] } else { idx[2] + 1 };
                self.rgb_at(r, g, b)
            }
            Interpolation::Tetrahedral => self.eval_tetrahedral(idx, frac),
            _ => self.eval_trilinear(idx, frac),
        }
    }

    fn eval_trilinear(&self, idx: [usize; 3], frac: [f32; 3]) -> [f32; 3] {
        let [r, g, b] = idx;
        let [fr, fg, fb] = frac;
        let mut out = [0.0f32; 3];
        for c in 0..3 {
            // Blend blue, then green, then red.
            let c00 = lerp(self.rgb_at(r, g, b)[c], self.rgb_at(r, g, b + 1)[c], fb);
            let c01 = lerp(
                self.rgb_at(r, g + 1, b)[c],
                self.rgb_at(r, g + 1, b + 1)[c],
                fb,
            );
            let c10 = lerp(
                self.rgb_at(r + 1, g, b)[c],
                self.rgb_at(r + 1, g, b + 1)[c],
                fb,
            );
            let c11 = lerp(
                self.rgb_at(r + 1, g + 1, b)[c],
                self.rgb_at(r + 1, g + 1, b + 1)[c],
                fb,
            );
            let c0 = lerp(c00, c01, fg);
            let c1 = lerp(c10, c11, fg);
            out[c] = lerp(c0, c1, fr);
        }
        out
    }

    fn eval_tetrahedral(&self, idx: [usize; 3], frac: [f32; 3]) -> [f32; 3] {
        let [r, g, b] = idx;
        let [fr, fg, fb] = frac;
        let c000 = self.rgb_at(r, g, b);
        let c111 = self.rgb_at(r + 1, g + 1, b + 1);
        let mut out = [0.0f32; 3];
        if fr >= fg {
            if fg >= fb {
                let c100 = self.rgb_at(r + 1, g, b);
                let c110 = self.rgb_at(r + 1, g + 1, b);
                for c in 0..3 {
                    out[c] = (1.0 - fr) * c000[c]
                        + (fr - fg) * c100[c]
                        + (fg - fb) * c110[c]
                        + fb * c111[c];
                }
            } else if fr >= fb {
                let c100 = self.rgb_at(r + 1, g, b);
                let c101 = self.rgb_at(r + 1, g, b + 1);
                for c in 0..3 {
                    out[c] = (1.0 - fr) * c000[c]
                        + (fr - fb) * c100[c]
                        + (fb - fg) * c101[c]
                        + fg * c111[c];
                }
            } else {
                let c001 = self.rgb_at(r, g, b + 1);
                let c101 = self.rgb_at(r + 1, g, b + 1);
                for c in 0..3 {
                    out[c] = (1.0 - fb) * c000[c]
                        + (fb - fr) * c001[c]
                        + (fr - fg) * c101[c]
                        + fg * c111[c];
                }
            }
        } else if fb >= fg {
            let c001 = self.rgb_at(r, g, b + 1);
            let c011 = self.rgb_at(r, g + 1, b + 1);
            for c in 0..3 {
                out[c] = (1.0 - fb) * c000[c]
                    + (fb - fg) * c001[c]
                    + (fg - fr) * c011[c]
                    + fr * c111[c];
            }
        } else if fb >= fr {
            let c010 = self.rgb_at(r, g + 1, b);
            let c011 = self.rgb_at(r, g + 1, b + 1);
            for c in 0..3 {
                out[c] = (1.0 - fg) * c000[c]
                    + (fg - fb) * c010[c]
                    + (fb - fr) * c011[c]
                    + fr * c111[c];
            }
        } else {
            let c010 = self.rgb_at(r, g + 1, b);
            let c110 = self.rgb_at(r + 1, g + 1, b);
            for c in 0..3 {
                out[c] = (1.0 - fg) * c000[c]
                    + (fg - fr) * c010[c]
                    + (fr - fb) * c110[c]
                    + fb * c111[c];
            }
        }
        out
    }

    /// Identity detection: every grid point matches the identity cube
    /// within `1e-4 * max_value(output)`.
    pub fn is_identity(&self) -> bool {
        let n = self.grid_size();
        let step = self.output_depth().step_size(n) as f32;
        let tol = self.output_depth().max_value() as f32 * 1e-4;
        for r in 0..n {
            for g in 0..n {
                for b in 0..n {
                    let v = self.rgb_at(r, g, b);
                    if (v[0] - r as f32 * step).abs() > tol
                        || (v[1] - g as f32 * step).abs() > tol
                        || (v[2] - b as f32 * step).abs() > tol
                    {
                        return false;
                    }
                }
            }
        }
        true
    }

    pub fn is_noop(&self) -> bool {
        self.input_depth() == self.output_depth() && self.is_identity()
    }

    /// Re-declares the output depth, rescaling the cube values.
    pub fn set_output_bit_depth(&mut self, depth: BitDepth) {
        let factor = self.output_depth().scale_to(depth) as f32;
        self.array.scale(factor);
        self.header.set_output_depth(depth);
    }

    /// Re-declares the input depth; the domain rescale happens at eval.
    pub fn set_input_bit_depth(&mut self, depth: BitDepth) {
        self.header.set_input_depth(depth);
    }

    /// Composes `self` followed by `rhs` into a single cube of edge length
    /// `max(n_a, n_b)` by evaluating both on an identity grid.
    ///
    /// The output depth of `self` must equal the input depth of `rhs`.
    pub fn compose(&self, rhs: &Lut3dOp) -> Result<Lut3dOp> {
        if self.output_depth() != rhs.input_depth() {
            return Err(Error::depth_mismatch(
                self.output_depth(),
                rhs.input_depth(),
                "3D LUT compose",
            ));
        }
        let n = self.grid_size().max(rhs.grid_size());
        let step = self.input_depth().step_size(n) as f32;
        let mut out = Lut3dOp::identity(self.input_depth(), rhs.output_depth(), n);
        out.interpolation = self.interpolation;
        for r in 0..n {
            for g in 0..n {
                for b in 0..n {
                    let x = [r as f32 * step, g as f32 * step, b as f32 * step];
                    let y = rhs.eval_rgb(self.eval_rgb(x));
                    out.set_rgb_at(r, g, b, y);
                }
            }
        }
        Ok(out)
    }
}

#[inline]
fn lerp(a: f32, b: f32, f: f32) -> f32 {
    a + (b - a) * f
}

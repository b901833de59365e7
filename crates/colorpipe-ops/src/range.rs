//! Range op: affine rescale with optional clamping at one or both ends.
//!
//! Bounds are stored in the scaled units of the declared depths. A bound is
//! either present on both sides of the mapping (input and output) or absent
//! on both; the scale and offset are derived from whatever bounds exist.

use colorpipe_core::{BitDepth, Error, Result};

use crate::matrix::MatrixOp;
use crate::op::OpHeader;

/// Hybrid absolute/relative comparison used for scale and offset checks.
///
/// Near zero (either magnitude below 1e-3) the comparison is absolute with
/// tolerance 1e-6; otherwise it is relative with tolerance 1e-6.
pub(crate) fn floats_differ(x1: f64, x2: f64) -> bool {
    const TOL: f64 = 1e-6;
    if x1.abs() < 1e-3 || x2.abs() < 1e-3 {
        (x1 - x2).abs() > TOL
    } else {
        (x1 - x2).abs() > x1.abs().max(x2.abs()) * TOL
    }
}

/// Clamp and affine rescale of the RGB channels.
///
/// Alpha is never clamped; it only picks up the depth conversion scale.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeOp {
    header: OpHeader,
    min_in: Option<f64>,
    max_in: Option<f64>,
    min_out: Option<f64>,
    max_out: Option<f64>,
}

impl RangeOp {
    /// Builds a range with the given bounds. Each in/out pair must be both
    /// present or both absent; this is checked by [`RangeOp::validate`].
    pub fn new(
        input: BitDepth,
        output: BitDepth,
        min_in: Option<f64>,
        max_in: Option<f64>,
        min_out: Option<f64>,
        max_out: Option<f64>,
    ) -> Self {
        Self {
            header: OpHeader::new(input, output),
            min_in,
            max_in,
            min_out,
            max_out,
        }
    }

    /// A clamp of the full encoding range of `input`, mapped to `output`.
    pub fn clamp_full_range(input: BitDepth, output: BitDepth) -> Self {
        Self::new(
            input,
            output,
            Some(0.0),
            Some(input.max_value()),
            Some(0.0),
            Some(output.max_value()),
        )
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
    pub fn min_in(&self) -> Option<f64> {
        self.min_in
    }

    #[inline]
    pub fn max_in(&self) -> Option<f64> {
        self.max_in
    }

    #[inline]
    pub fn min_out(&self) -> Option<f64> {
        self.min_out
    }

    #[inline]
    pub fn max_out(&self) -> Option<f64> {
        self.max_out
    }

    /// Checks bound pairing, finiteness, ordering, and depth declarations.
    pub fn validate(&self) -> Result<()> {
        for (depth, side) in [
            (self.input_depth(), "range input"),
            (self.output_depth(), "range output"),
        ] {
            if depth == BitDepth::Unknown {
                return Err(Error::invalid_bit_depth(depth, side));
            }
        }
        if self.min_in.is_some() != self.min_out.is_some() {
            return Err(Error::validation(
                "range minimum must be set on both input and output, or neither",
            ));
        }
        if self.max_in.is_some() != self.max_out.is_some() {
            return Err(Error::validation(
                "range maximum must be set on both input and output, or neither",
            ));
        }
        if self.min_in.is_none() && self.max_in.is_none() {
            return Err(Error::validation("range must have at least one bound"));
        }
        for v in [self.min_in, self.max_in, self.min_out, self.max_out]
            .into_iter()
            .flatten()
        {
            if !v.is_finite() {
                return Err(Error::validation("range bound is not finite"));
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_in, self.max_in) {
            if (hi - lo).abs() < 1e-6 {
                return Err(Error::validation(
                    "range input maximum is too close to the input minimum",
                ));
            }
            if lo > hi {
                return Err(Error::validation(
                    "range input minimum must not exceed the input maximum",
                ));
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_out, self.max_out) {
            if lo > hi {
                return Err(Error::validation(
                    "range output minimum must not exceed the output maximum",
                ));
            }
        }
        Ok(())
    }

    /// The derived scale of the affine part.
    ///
    /// With both bounds set it is `(max_out - min_out) / (max_in - min_in)`;
    /// otherwise the depth conversion ratio.
    pub fn scale(&self) -> f64 {
        match (self.min_in, self.max_in) {
            (Some(lo_in), Some(hi_in)) => {
                (self.max_out.unwrap_or(0.0) - self.min_out.unwrap_or(0.0)) / (hi_in - lo_in)
            }
            _ => self.input_depth().scale_to(self.output_depth()),
        }
    }

    /// The derived offset: chosen so the present bound maps exactly.
    pub fn offset(&self) -> f64 {
        let scale = self.scale();
        if let (Some(lo_in), Some(lo_out)) = (self.min_in, self.min_out) {
            lo_out - scale * lo_in
        } else if let (Some(hi_in), Some(hi_out)) = (self.max_in, self.max_out) {
            hi_out - scale * hi_in
        } else {
            0.0
        }
    }

    /// Lower clamp bound in output units, when the low bound actually clips.
    pub fn low_bound(&self) -> Option<f64> {
        self.clip_override(true)
    }

    /// Upper clamp bound in output units, when the high bound actually clips.
    pub fn high_bound(&self) -> Option<f64> {
        self.clip_override(false)
    }

    /// Whether the value at `val` (in input units) would be altered by the
    /// requested bounds or by the output encoding range.
    fn would_clip(&self, val: f64) -> bool {
        let out = val * self.scale() + self.offset();
        let mut lim = out;
        if let Some(lo) = self.min_out {
            lim = lim.max(lo);
        }
        if let Some(hi) = self.max_out {
            lim = lim.min(hi);
        }
        if self.output_depth().is_integer() {
            lim = lim.clamp(0.0, self.output_depth().max_value());
        }
        floats_differ(out, lim)
    }

    /// The effective clamp for one side, in output units.
    ///
    /// A requested bound is dropped when the integer input domain can never
    /// reach it, and tightened to the output encoding range when it exceeds
    /// it. Conversely a clip may be required with no bound requested at all:
    /// integer outputs always clamp, so float or offset inputs that leave the
    /// encoding range pick up the boundary as an implied bound.
    fn clip_override(&self, is_lower: bool) -> Option<f64> {
        let (in_bnd, out_bnd, orig) = if is_lower {
            (0.0, 0.0, self.min_out)
        } else {
            (
                self.input_depth().max_value(),
                self.output_depth().max_value(),
                self.max_out,
            )
        };
        match orig {
            None => {
                if self.output_depth().is_integer()
                    && (self.input_depth().is_float() || self.would_clip(in_bnd))
                {
                    return Some(out_bnd);
                }
                None
            }
            Some(orig) => {
                if self.input_depth().is_integer() && !self.would_clip(in_bnd) {
                    return None;
                }
                if self.output_depth().is_integer()
                    && ((is_lower && orig < out_bnd) || (!is_lower && orig > out_bnd))
                {
                    return Some(out_bnd);
                }
                Some(orig)
            }
        }
    }

    /// Whether any bound actually restricts the output.
    pub fn clips(&self) -> bool {
        self.low_bound().is_some() || self.high_bound().is_some()
    }

    /// Whether the affine part does more than the plain depth conversion.
    fn scales(&self) -> bool {
        let depth_scale = self.input_depth().scale_to(self.output_depth());
        floats_differ(self.scale(), depth_scale) || floats_differ(self.offset(), 0.0)
    }

    /// Identity: no effective clipping and no scaling beyond the depth
    /// conversion.
    pub fn is_identity(&self) -> bool {
        !self.clips() && !self.scales()
    }

    /// Identity with equal input and output depths.
    pub fn is_noop(&self) -> bool {
        self.input_depth() == self.output_depth() && self.is_identity()
    }

    /// Applies the range to one RGBA quad. RGB channels are rescaled and
    /// clamped; alpha gets the depth conversion scale only.
    pub fn apply(&self, rgba: [f64; 4]) -> [f64; 4] {
        let scale = self.scale();
        let offset = self.offset();
        let lo = self.low_bound();
        let hi = self.high_bound();
        let mut out = [0.0; 4];
        for c in 0..3 {
            let mut v = rgba[c] * scale + offset;
            if let Some(lo) = lo {
                v = v.max(lo);
            }
            if let Some(hi) = hi {
                v = v.min(hi);
            }
            out[c] = v;
        }
        out[3] = rgba[3] * self.input_depth().scale_to(self.output_depth());
        out
    }

    /// Re-declares the input depth, rescaling the input-side bounds.
    pub fn set_input_bit_depth(&mut self, depth: BitDepth) {
        let factor = self.input_depth().scale_to(depth);
        if factor != 1.0 {
            self.min_in = self.min_in.map(|v| v * factor);
            self.max_in = self.max_in.map(|v| v * factor);
        }
        self.header.set_input_depth(depth);
    }

    /// Re-declares the output depth, rescaling the output-side bounds.
    pub fn set_output_bit_depth(&mut self, depth: BitDepth) {
        let factor = self.output_depth().scale_to(depth);
        if factor != 1.0 {
            self.min_out = self.min_out.map(|v| v * factor);
            self.max_out = self.max_out.map(|v| v * factor);
        }
        self.header.set_output_depth(depth);
    }

    /// The inverse range: depths swapped and bound pairs exchanged.
    ///
    /// Exists only when the forward scale is nonzero.
    pub fn inverse(&self) -> Result<RangeOp> {
        if self.scale() == 0.0 {
            return Err(Error::validation(
                "range with zero scale has no inverse",
            ));
        }
        let mut header = self.header.clone();
        header.set_input_depth(self.output_depth());
        header.set_output_depth(self.input_depth());
        Ok(RangeOp {
            header,
            min_in: self.min_out,
            max_in: self.max_out,
            min_out: self.min_in,
            max_out: self.max_in,
        })
    }

    /// Expresses a non-clipping range as the equivalent diagonal matrix.
    ///
    /// Callers must only use this when [`RangeOp::clips`] is false; the
    /// matrix cannot represent the clamp.
    pub fn convert_to_matrix(&self) -> MatrixOp {
        let scale = self.scale();
        let offset = self.offset();
        let mut m = MatrixOp::identity(self.input_depth(), self.output_depth());
        for c in 0..3 {
            m.set_coeff(c, c, scale);
            m.set_offset(c, offset);
        }
        m
    }
}

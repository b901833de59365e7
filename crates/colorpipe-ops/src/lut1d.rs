//! 1D LUT op: per-channel table lookup with optional half-float domain
//! and optional hue preservation.

use colorpipe_core::halfs;
use colorpipe_core::{Array, ArrayLayout, BitDepth, Error, Interpolation, Result};
use half::f16;

use crate::op::OpHeader;

/// Domain and storage encoding flags of a 1D LUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HalfFlags {
    /// The table is indexed by the half bit pattern of the input
    /// (65536 entries) instead of by scaled position.
    pub input_half_domain: bool,
    /// The table values were supplied as raw half bit patterns. They are
    /// converted to float at construction; the flag is kept for round
    /// tripping through serializers.
    pub output_raw_halfs: bool,
}

impl HalfFlags {
    /// Plain scaled-position domain, float values.
    pub const STANDARD: HalfFlags = HalfFlags {
        input_half_domain: false,
        output_raw_halfs: false,
    };

    /// Half-bit-pattern domain.
    pub const HALF_DOMAIN: HalfFlags = HalfFlags {
        input_half_domain: true,
        output_raw_halfs: false,
    };
}

/// Hue preservation mode applied after the per-channel lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HueAdjust {
    /// Per-channel lookup only.
    #[default]
    None,
    /// Restore the ratio of the middle channel within the chroma span so
    /// the hue of the input survives a per-channel tone curve.
    Dw3,
}

/// Returns the channel indices of `rgb` ordered `(min, mid, max)`.
///
/// All comparisons are false for NaN, which yields a consistent arbitrary
/// order instead of a panic.
pub(crate) fn order3(rgb: [f32; 3]) -> (usize, usize, usize) {
    let [a, b, c] = rgb;
    if a > b {
        if b > c {
            (2, 1, 0)
        } else if a > c {
            (1, 2, 0)
        } else {
            (1, 0, 2)
        }
    } else if a > c {
        (2, 0, 1)
    } else if b > c {
        (0, 2, 1)
    } else {
        (0, 1, 2)
    }
}

/// Per-channel 1D table lookup.
///
/// Table values are stored in output-depth units. A mono (1-component)
/// table applies the same curve to R, G, and B.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut1dOp {
    header: OpHeader,
    interpolation: Interpolation,
    array: Array,
    half_flags: HalfFlags,
    hue_adjust: HueAdjust,
}

impl Lut1dOp {
    /// An identity LUT of `length` entries: entry `i` holds
    /// `i * step_size(output, length)` in every channel.
    pub fn identity(input: BitDepth, output: BitDepth, length: usize) -> Self {
        let mut array = Array::new(ArrayLayout::Table, length, 3);
        let step = output.step_size(length) as f32;
        {
            let values = array.values_mut();
            for i in 0..length {
                let v = i as f32 * step;
                for c in 0..3 {
                    values[i * Array::MAX_COMPONENTS + c] = v;
                }
            }
        }
        Self {
            header: OpHeader::new(input, output),
            interpolation: Interpolation::Default,
            array,
            half_flags: HalfFlags::STANDARD,
            hue_adjust: HueAdjust::None,
        }
    }

    /// An identity half-domain LUT: entry `i` holds the value of the half
    /// with bit pattern `i`, scaled to output units. NaN patterns stay NaN.
    pub fn identity_half_domain(input: BitDepth, output: BitDepth) -> Self {
        let length = halfs::HALF_DOMAIN_ENTRIES;
        let mut array = Array::new(ArrayLayout::Table, length, 3);
        let scale = output.max_value() as f32;
        {
            let values = array.values_mut();
            for i in 0..length {
                let v = halfs::half_bits_to_f32(i as u16) * scale;
                for c in 0..3 {
                    values[i * Array::MAX_COMPONENTS + c] = v;
                }
            }
        }
        Self {
            header: OpHeader::new(input, output),
            interpolation: Interpolation::Default,
            array,
            half_flags: HalfFlags::HALF_DOMAIN,
            hue_adjust: HueAdjust::None,
        }
    }

    /// Builds a LUT from per-entry channel values.
    ///
    /// `values` is row-major with `components` values per entry (1 or 3).
    pub fn from_values(
        input: BitDepth,
        output: BitDepth,
        interpolation: Interpolation,
        components: usize,
        values: &[f32],
    ) -> Result<Self> {
        if components == 0 || values.len() % components != 0 {
            return Err(Error::malformed_array(
                components.max(1),
                values.len(),
            ));
        }
        let length = values.len() / components;
        let mut array = Array::new(ArrayLayout::Table, length, components);
        {
            let dst = array.values_mut();
            for i in 0..length {
                for c in 0..components {
                    dst[i * Array::MAX_COMPONENTS + c] = values[i * components + c];
                }
            }
        }
        Ok(Self {
            header: OpHeader::new(input, output),
            interpolation,
            array,
            half_flags: HalfFlags::STANDARD,
            hue_adjust: HueAdjust::None,
        })
    }

    /// Builds a LUT whose values are supplied as raw half bit patterns.
    ///
    /// The patterns are decoded to float at construction and the
    /// `output_raw_halfs` flag is set.
    pub fn from_raw_halfs(
        input: BitDepth,
        output: BitDepth,
        interpolation: Interpolation,
        components: usize,
        raw: &[u16],
    ) -> Result<Self> {
        let decoded: Vec<f32> = raw
            .iter()
            .map(|&bits| f16::from_bits(bits).to_f32())
            .collect();
        let mut lut = Self::from_values(input, output, interpolation, components, &decoded)?;
        lut.half_flags.output_raw_halfs = true;
        Ok(lut)
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

    #[inline]
    pub fn hue_adjust(&self) -> HueAdjust {
        self.hue_adjust
    }

    pub fn set_hue_adjust(&mut self, hue_adjust: HueAdjust) {
        self.hue_adjust = hue_adjust;
    }

    #[inline]
    pub fn half_flags(&self) -> HalfFlags {
        self.half_flags
    }

    pub(crate) fn set_half_flags(&mut self, flags: HalfFlags) {
        self.half_flags = flags;
    }

    #[inline]
    pub fn is_input_half_domain(&self) -> bool {
        self.half_flags.input_half_domain
    }

    #[inline]
    pub fn is_output_raw_halfs(&self) -> bool {
        self.half_flags.output_raw_halfs
    }

    /// Table length.
    #[inline]
    pub fn length(&self) -> usize {
        self.array.length()
    }

    /// Swaps the declared depths in place. Used when building inverses;
    /// the array is deliberately left in its original units.
    pub(crate) fn swap_depths(&mut self) {
        let inp = self.header.input_depth();
        let out = self.header.output_depth();
        self.header.set_input_depth(out);
        self.header.set_output_depth(inp);
    }

    pub fn validate(&self) -> Result<()> {
        for (depth, side) in [
            (self.input_depth(), "1D LUT input"),
            (self.output_depth(), "1D LUT output"),
        ] {
            if depth == BitDepth::Unknown {
                return Err(Error::invalid_bit_depth(depth, side));
            }
        }
        self.interpolation.concretize_1d()?;
        self.array.validate()?;
        let components = self.array.num_components();
        if components != 1 && components != 3 {
            return Err(Error::validation(format!(
                "1D LUT must have 1 or 3 components, got {components}"
            )));
        }
        if self.length() < 2 {
            return Err(Error::validation(format!(
                "1D LUT must have at least 2 entries, got {}",
                self.length()
            )));
        }
        if self.is_input_half_domain() && self.length() != halfs::HALF_DOMAIN_ENTRIES {
            return Err(Error::validation(format!(
                "half-domain 1D LUT must have {} entries, got {}",
                halfs::HALF_DOMAIN_ENTRIES,
                self.length()
            )));
        }
        Ok(())
    }

    /// Value of `component` at `entry`, with mono tables replicated across
    /// channels.
    #[inline]
    pub(crate) fn channel_value(&self, entry: usize, component: usize) -> f32 {
        let c = if self.array.num_components() == 1 {
            0
        } else {
            component
        };
        self.array.values()[entry * Array::MAX_COMPONENTS + c]
    }

    fn eval_channel(&self, x: f32, component: usize) -> f32 {
        if self.is_input_half_domain() {
            // Direct lookup by half bit pattern; no interpolation between
            // adjacent codes.
            let idx = halfs::f32_to_half_bits(x) as usize;
            return self.channel_value(idx, component);
        }
        let last = (self.length() - 1) as f32;
        let scale = last / self.input_depth().max_value() as f32;
        let mut t = x * scale;
        if t.is_nan() {
            t = 0.0;
        }
        t = t.clamp(0.0, last);
        match self.interpolation.concretize_1d().unwrap_or(Interpolation::Linear) {
            Interpolation::Nearest => {
                let idx = ((t + 0.5) as usize).min(self.length() - 1);
                self.channel_value(idx, component)
            }
            _ => {
                let lo = t as usize;
                let hi = (lo + 1).min(self.length() - 1);
                let f = t - lo as f32;
                let a = self.channel_value(lo, component);
                let b = self.channel_value(hi, component);
                a + (b - a) * f
            }
        }
    }

    /// Evaluates the LUT on one RGB triple.
    pub fn eval_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        let mut out = [
            self.eval_channel(rgb[0], 0),
            self.eval_channel(rgb[1], 1),
            self.eval_channel(rgb[2], 2),
        ];
        if self.hue_adjust == HueAdjust::Dw3 {
            let (min, mid, max) = order3(rgb);
            let orig_chroma = rgb[max] - rgb[min];
            let hue_factor = if orig_chroma == 0.0 {
                0.0
            } else {
                (rgb[mid] - rgb[min]) / orig_chroma
            };
            out[mid] = hue_factor * (out[max] - out[min]) + out[min];
        }
        out
    }

    /// Identity detection.
    ///
    /// Standard domain: each entry matches the identity ramp within
    /// `step_size * 1e-4`. Half domain: each finite entry matches its half
    /// code within one half ULP.
    pub fn is_identity(&self) -> bool {
        let components = self.array.num_components().min(3);
        if self.is_input_half_domain() {
            let scale = self.output_depth().max_value() as f32;
            for i in 0..self.length() {
                let aim = f16::from_bits(i as u16);
                if aim.is_nan() || aim.is_infinite() {
                    continue;
                }
                for c in 0..components {
                    let got = f16::from_f32(self.channel_value(i, c) / scale);
                    if halfs::halfs_differ(aim, got, 1) {
                        return false;
                    }
                }
            }
            true
        } else {
            let step = self.output_depth().step_size(self.length()) as f32;
            let tol = step * 1e-4;
            for i in 0..self.length() {
                let aim = i as f32 * step;
                for c in 0..components {
                    if (self.channel_value(i, c) - aim).abs() > tol {
                        return false;
                    }
                }
            }
            true
        }
    }

    pub fn is_noop(&self) -> bool {
        self.input_depth() == self.output_depth() && self.is_identity()
    }

    /// Re-declares the output depth, rescaling the table values.
    pub fn set_output_bit_depth(&mut self, depth: BitDepth) {
        let factor = self.output_depth().scale_to(depth) as f32;
        self.array.scale(factor);
        self.header.set_output_depth(depth);
    }

    /// Re-declares the input depth. The table is untouched; the domain
    /// rescale happens in evaluation.
    pub fn set_input_bit_depth(&mut self, depth: BitDepth) {
        self.header.set_input_depth(depth);
    }
}

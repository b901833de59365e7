//! Exact and fast inversion of 1D LUTs.
//!
//! The stored array stays bitwise identical to the forward LUT; only the
//! declared depths are swapped. Inversion works on derived per-channel
//! search tables that are monotonized copies of the forward curve.

use colorpipe_core::halfs::{
    self, HALF_DOMAIN_ENTRIES, MAX_NEG_BITS, MAX_POS_BITS, NEG_ZERO_BITS, ONE_BITS,
};
use colorpipe_core::{Array, BitDepth, Interpolation, Result};

use crate::lut1d::{HalfFlags, Lut1dOp};
use crate::op::InvStyle;

/// Effective domain and direction of one channel of the forward curve.
///
/// For half-domain LUTs the positive and negative halves are handled
/// separately; `neg_*` fields are absolute bit-pattern indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComponentProperties {
    /// Direction of the curve over the positive (or whole) domain.
    pub is_increasing: bool,
    /// First index of the effective domain.
    pub start_domain: usize,
    /// Last index of the effective domain.
    pub end_domain: usize,
    /// First bit-pattern index of the negative effective domain.
    pub neg_start_domain: usize,
    /// Last bit-pattern index of the negative effective domain.
    pub neg_end_domain: usize,
}

/// Monotonized search table for one channel.
#[derive(Debug, Clone)]
struct InvChannel {
    props: ComponentProperties,
    /// Flattened copy of the forward channel, natural sign.
    table: Vec<f32>,
}

impl InvChannel {
    fn flip(&self) -> f32 {
        if self.props.is_increasing { 1.0 } else { -1.0 }
    }

    /// Lower-bound search over `table[start..=end]` in flipped space.
    ///
    /// Returns the absolute index of the lower entry and the fractional
    /// position of `target` between it and the next entry.
    fn search(&self, start: usize, end: usize, flip: f32, val: f32) -> (usize, f32) {
        let lo_val = self.table[start] * flip;
        let hi_val = self.table[end] * flip;
        let mut target = val * flip;
        if target.is_nan() {
            target = lo_val;
        }
        target = target.clamp(lo_val, hi_val);
        let seg = &self.table[start..=end];
        let mut rel = seg.partition_point(|&v| v * flip < target);
        if rel > 0 {
            rel -= 1;
        }
        let lo = seg[rel] * flip;
        let delta = if rel + 1 < seg.len() {
            let hi = seg[rel + 1] * flip;
            // Flat segments invert to their left edge.
            if hi > lo { (target - lo) / (hi - lo) } else { 0.0 }
        } else {
            0.0
        };
        (start + rel, delta)
    }

    /// Inverts `val` through a standard-domain channel, returning a value
    /// in `[0, (len-1) * out_step]`.
    fn invert_standard(&self, val: f32, out_step: f32) -> f32 {
        let flip = self.flip();
        let (idx, delta) = self.search(self.props.start_domain, self.props.end_domain, flip, val);
        (idx as f32 + delta) * out_step
    }

    /// Inverts `val` through a half-domain channel, returning a value in
    /// output units.
    fn invert_half(&self, val: f32, out_max: f32) -> f32 {
        let flip = self.flip();
        // The value at +0 splits the output range between the halves.
        let bisect = self.table[0] * flip;
        let (idx, delta) = if !(val * flip < bisect) {
            self.search(self.props.start_domain, self.props.end_domain, flip, val)
        } else {
            self.search(
                self.props.neg_start_domain,
                self.props.neg_end_domain,
                -flip,
                val,
            )
        };
        let d0 = halfs::half_bits_to_f32(idx as u16);
        let domain = if delta > 0.0 {
            let d1 = halfs::half_bits_to_f32((idx + 1) as u16);
            d0 + delta * (d1 - d0)
        } else {
            d0
        };
        domain * out_max
    }
}

/// Monotonizes one half of a table in flipped space.
///
/// `seed` initializes the running maximum so the negative half stays
/// consistent with the value at +0.
fn flatten(table: &mut [f32], range: std::ops::RangeInclusive<usize>, flip: f32, seed: f32) {
    let mut prev = seed * flip;
    for i in range {
        let w = table[i] * flip;
        if w < prev {
            table[i] = prev * flip;
        } else {
            prev = w;
        }
    }
}

/// Shrinks `[lo, hi]` to the effective domain by skipping flat runs at
/// both ends.
fn effective_domain(table: &[f32], lo: usize, hi: usize) -> (usize, usize) {
    let mut start = lo;
    while start < hi && table[start + 1] == table[start] {
        start += 1;
    }
    let mut end = hi;
    while end > lo && table[end - 1] == table[end] {
        end -= 1;
    }
    if end < start {
        end = start;
    }
    (start, end)
}

fn prepare_standard(values: Vec<f32>) -> InvChannel {
    let l = values.len();
    let is_increasing = values[0] <= values[l - 1];
    let flip = if is_increasing { 1.0 } else { -1.0 };
    let mut table = values;
    let seed = table[0];
    flatten(&mut table, 1..=(l - 1), flip, seed);
    let (start_domain, end_domain) = effective_domain(&table, 0, l - 1);
    InvChannel {
        props: ComponentProperties {
            is_increasing,
            start_domain,
            end_domain,
            neg_start_domain: 0,
            neg_end_domain: 0,
        },
        table,
    }
}

fn prepare_half(values: Vec<f32>) -> InvChannel {
    let is_increasing = values[0] <= values[ONE_BITS as usize];
    let flip = if is_increasing { 1.0 } else { -1.0 };
    let mut table = values;
    // Positive half: bit patterns of +0 through the largest finite half.
    let seed = table[0];
    flatten(&mut table, 1..=(MAX_POS_BITS as usize), flip, seed);
    let (start_domain, end_domain) = effective_domain(&table, 0, MAX_POS_BITS as usize);
    // Negative half runs the other way and is seeded with the value at +0
    // so the curve is continuous through zero.
    let seed = table[0];
    flatten(
        &mut table,
        (NEG_ZERO_BITS as usize)..=(MAX_NEG_BITS as usize),
        -flip,
        seed,
    );
    let (neg_start_domain, neg_end_domain) =
        effective_domain(&table, NEG_ZERO_BITS as usize, MAX_NEG_BITS as usize);
    InvChannel {
        props: ComponentProperties {
            is_increasing,
            start_domain,
            end_domain,
            neg_start_domain,
            neg_end_domain,
        },
        table,
    }
}

/// Exact inverse of a [`Lut1dOp`].
///
/// Holds the forward array unchanged with swapped depths, plus the derived
/// monotone search tables used by the inversion.
#[derive(Debug, Clone)]
pub struct InvLut1dOp {
    lut: Lut1dOp,
    style: InvStyle,
    channels: Vec<InvChannel>,
}

impl PartialEq for InvLut1dOp {
    fn eq(&self, other: &Self) -> bool {
        // The search tables are a pure function of the forward array.
        self.lut == other.lut && self.style == other.style
    }
}

impl InvLut1dOp {
    /// Builds the inverse of `forward`: same array, depths swapped.
    pub fn from_forward(forward: &Lut1dOp) -> Result<Self> {
        forward.validate()?;
        let mut lut = forward.clone();
        lut.swap_depths();
        let mut inv = Self {
            lut,
            style: InvStyle::Exact,
            channels: Vec::new(),
        };
        inv.rebuild();
        Ok(inv)
    }

    fn rebuild(&mut self) {
        let components = self.lut.array().num_components().min(3);
        let length = self.lut.length();
        let values = self.lut.array().values();
        self.channels.clear();
        for c in 0..components {
            let channel: Vec<f32> = (0..length)
                .map(|i| values[i * Array::MAX_COMPONENTS + c])
                .collect();
            self.channels.push(if self.lut.is_input_half_domain() {
                prepare_half(channel)
            } else {
                prepare_standard(channel)
            });
        }
    }

    #[inline]
    pub fn input_depth(&self) -> BitDepth {
        self.lut.input_depth()
    }

    #[inline]
    pub fn output_depth(&self) -> BitDepth {
        self.lut.output_depth()
    }

    /// The forward LUT payload carried by this op (depths swapped).
    #[inline]
    pub fn lut(&self) -> &Lut1dOp {
        &self.lut
    }

    #[inline]
    pub fn style(&self) -> InvStyle {
        self.style
    }

    pub fn set_style(&mut self, style: InvStyle) {
        self.style = style;
    }

    /// Properties of one channel's effective domain.
    pub fn component_properties(&self, channel: usize) -> ComponentProperties {
        self.channels[channel.min(self.channels.len() - 1)].props
    }

    /// The monotonized search table of one channel.
    pub fn flattened_values(&self, channel: usize) -> &[f32] {
        &self.channels[channel.min(self.channels.len() - 1)].table
    }

    pub fn validate(&self) -> Result<()> {
        self.lut.validate()
    }

    pub fn is_identity(&self) -> bool {
        self.lut.is_identity()
    }

    pub fn is_noop(&self) -> bool {
        self.input_depth() == self.output_depth() && self.is_identity()
    }

    /// Whether this op undoes `forward`: same table bitwise, same half
    /// flags, same hue adjust. Declared depths are not compared.
    pub fn is_inverse_of(&self, forward: &Lut1dOp) -> bool {
        self.lut.array() == forward.array()
            && self.lut.half_flags() == forward.half_flags()
            && self.lut.hue_adjust() == forward.hue_adjust()
    }

    /// Whether the inversion domain extends beyond `[0, max_in]`: either
    /// the forward LUT was half-domain, or its values leave that interval.
    pub fn has_extended_domain(&self) -> bool {
        if self.lut.is_input_half_domain() {
            return true;
        }
        let max = self.input_depth().max_value() as f32;
        let components = self.lut.array().num_components().min(3);
        let values = self.lut.array().values();
        for i in 0..self.lut.length() {
            for c in 0..components {
                let v = values[i * Array::MAX_COMPONENTS + c];
                if v < 0.0 || v > max {
                    return true;
                }
            }
        }
        false
    }

    fn channel(&self, component: usize) -> &InvChannel {
        if self.channels.len() == 1 {
            &self.channels[0]
        } else {
            &self.channels[component]
        }
    }

    /// Exact inversion of one RGB triple.
    ///
    /// Out-of-range inputs clamp to the nearest achievable value; flat
    /// regions of the forward curve invert to their left edge.
    pub fn eval_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        let mut out = [0.0f32; 3];
        if self.lut.is_input_half_domain() {
            let out_max = self.output_depth().max_value() as f32;
            for c in 0..3 {
                out[c] = self.channel(c).invert_half(rgb[c], out_max);
            }
        } else {
            let out_step = self.output_depth().step_size(self.lut.length()) as f32;
            for c in 0..3 {
                out[c] = self.channel(c).invert_standard(rgb[c], out_step);
            }
        }
        out
    }

    /// Re-declares the input depth.
    ///
    /// The array lives in input units here (it is the forward output), so
    /// it is rescaled, and the search tables are rebuilt.
    pub fn set_input_bit_depth(&mut self, depth: BitDepth) {
        let factor = self.input_depth().scale_to(depth) as f32;
        self.lut.array_mut().scale(factor);
        self.lut.header_mut().set_input_depth(depth);
        self.rebuild();
    }

    /// Re-declares the output depth. The array is untouched; the output
    /// scale is applied at evaluation.
    pub fn set_output_bit_depth(&mut self, depth: BitDepth) {
        self.lut.header_mut().set_output_depth(depth);
    }

    /// The forward LUT: a bitwise copy of the stored array with the depths
    /// swapped back.
    pub fn inverse(&self) -> Lut1dOp {
        let mut lut = self.lut.clone();
        lut.swap_depths();
        lut
    }

    /// Samples the exact inversion into a forward LUT suitable for fast
    /// rendering.
    ///
    /// Standard-domain sources use a lookup table sized to the input depth
    /// (or 4096 entries for float inputs). Sources with an extended domain
    /// get a half-domain LUT so negative and >1 values stay invertible.
    pub fn make_fast_lut1d(&self) -> Result<Lut1dOp> {
        let components = self.lut.array().num_components().min(3);
        if self.has_extended_domain() {
            let mut values = Vec::with_capacity(HALF_DOMAIN_ENTRIES * components);
            for i in 0..HALF_DOMAIN_ENTRIES {
                let x = halfs::half_bits_to_f32(i as u16);
                let out = self.eval_rgb([x, x, x]);
                values.extend_from_slice(&out[..components]);
            }
            let mut fast = Lut1dOp::from_values(
                self.input_depth(),
                self.output_depth(),
                Interpolation::Linear,
                components,
                &values,
            )?;
            fast.set_half_flags(HalfFlags::HALF_DOMAIN);
            fast.validate()?;
            Ok(fast)
        } else {
            let depth = if self.input_depth().is_integer() {
                self.input_depth()
            } else {
                BitDepth::U12
            };
            let length = depth.max_value() as usize + 1;
            let max_in = self.input_depth().max_value() as f32;
            let step = max_in / (length - 1) as f32;
            let mut values = Vec::with_capacity(length * components);
            for i in 0..length {
                let x = i as f32 * step;
                let out = self.eval_rgb([x, x, x]);
                values.extend_from_slice(&out[..components]);
            }
            let fast = Lut1dOp::from_values(
                self.input_depth(),
                self.output_depth(),
                Interpolation::Linear,
                components,
                &values,
            )?;
            fast.validate()?;
            Ok(fast)
        }
    }
}

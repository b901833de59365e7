//! Per-op renderers.
//!
//! Finalization turns each surviving op into a renderer that owns all the
//! data it needs, so applying a processor never touches the pipeline or
//! allocates. Renderers process RGBA f32 buffers in place, one op over
//! the whole buffer at a time.

use colorpipe_core::Result;
use colorpipe_ops::{
    FAST_LUT3D_GRID_SIZE, InvLut1dOp, InvLut3dOp, InvStyle, Lut1dOp, Lut3dOp, Op,
};

#[derive(Debug)]
pub(crate) enum Renderer {
    Matrix {
        coeffs: [f32; 16],
        offsets: [f32; 4],
    },
    Range {
        scale: f32,
        offset: f32,
        lo: Option<f32>,
        hi: Option<f32>,
        alpha_scale: f32,
    },
    Lut1d {
        op: Lut1dOp,
        alpha_scale: f32,
    },
    InvLut1d {
        op: InvLut1dOp,
        alpha_scale: f32,
    },
    Lut3d {
        op: Lut3dOp,
        alpha_scale: f32,
    },
    InvLut3d {
        op: InvLut3dOp,
        alpha_scale: f32,
    },
}

impl Renderer {
    /// Picks the renderer for an op.
    ///
    /// Fast-style inverse LUTs are resolved here: the exact inversion is
    /// sampled into a forward LUT once. A fast 1D inverse with an
    /// extended domain routes through the exact renderer instead, since a
    /// bounded lookup domain cannot cover it accurately.
    pub(crate) fn from_op(op: Op) -> Result<Renderer> {
        Ok(match op {
            Op::Matrix(m) => {
                let mut coeffs = [0.0f32; 16];
                for (dst, &src) in coeffs.iter_mut().zip(m.coeffs()) {
                    *dst = src as f32;
                }
                let mut offsets = [0.0f32; 4];
                for (dst, &src) in offsets.iter_mut().zip(m.offsets()) {
                    *dst = src as f32;
                }
                Renderer::Matrix { coeffs, offsets }
            }
            Op::Range(r) => {
                let alpha_scale = r.input_depth().scale_to(r.output_depth()) as f32;
                Renderer::Range {
                    scale: r.scale() as f32,
                    offset: r.offset() as f32,
                    lo: r.low_bound().map(|v| v as f32),
                    hi: r.high_bound().map(|v| v as f32),
                    alpha_scale,
                }
            }
            Op::Lut1d(l) => {
                let alpha_scale = l.input_depth().scale_to(l.output_depth()) as f32;
                Renderer::Lut1d { op: l, alpha_scale }
            }
            Op::InvLut1d(l) => {
                let alpha_scale = l.input_depth().scale_to(l.output_depth()) as f32;
                if l.style() == InvStyle::Fast && !l.has_extended_domain() {
                    let fast = l.make_fast_lut1d()?;
                    Renderer::Lut1d {
                        op: fast,
                        alpha_scale,
                    }
                } else {
                    Renderer::InvLut1d { op: l, alpha_scale }
                }
            }
            Op::Lut3d(l) => {
                let alpha_scale = l.input_depth().scale_to(l.output_depth()) as f32;
                Renderer::Lut3d { op: l, alpha_scale }
            }
            Op::InvLut3d(l) => {
                let alpha_scale = l.input_depth().scale_to(l.output_depth()) as f32;
                if l.style() == InvStyle::Fast {
                    let fast = l.make_fast_lut3d(FAST_LUT3D_GRID_SIZE)?;
                    Renderer::Lut3d {
                        op: fast,
                        alpha_scale,
                    }
                } else {
                    Renderer::InvLut3d { op: l, alpha_scale }
                }
            }
        })
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Renderer::Matrix { .. } => "matrix",
            Renderer::Range { .. } => "range",
            Renderer::Lut1d { .. } => "lut1d",
            Renderer::InvLut1d { .. } => "invlut1d",
            Renderer::Lut3d { .. } => "lut3d",
            Renderer::InvLut3d { .. } => "invlut3d",
        }
    }

    /// Applies the op to an RGBA f32 buffer in place.
    pub(crate) fn apply(&self, rgba: &mut [f32]) {
        debug_assert_eq!(rgba.len() % 4, 0);
        match self {
            Renderer::Matrix { coeffs, offsets } => {
                for px in rgba.chunks_exact_mut(4) {
                    let v = [px[0], px[1], px[2], px[3]];
                    for r in 0..4 {
                        let row = &coeffs[r * 4..r * 4 + 4];
                        px[r] = row[0] * v[0]
                            + row[1] * v[1]
                            + row[2] * v[2]
                            + row[3] * v[3]
                            + offsets[r];
                    }
                }
            }
            Renderer::Range {
                scale,
                offset,
                lo,
                hi,
                alpha_scale,
            } => {
                for px in rgba.chunks_exact_mut(4) {
                    for v in px[..3].iter_mut() {
                        let mut y = *v * scale + offset;
                        if let Some(lo) = lo {
                            y = y.max(*lo);
                        }
                        if let Some(hi) = hi {
                            y = y.min(*hi);
                        }
                        *v = y;
                    }
                    px[3] *= alpha_scale;
                }
            }
            Renderer::Lut1d { op, alpha_scale } => {
                for px in rgba.chunks_exact_mut(4) {
                    let out = op.eval_rgb([px[0], px[1], px[2]]);
                    px[0] = out[0];
                    px[1] = out[1];
                    px[2] = out[2];
                    px[3] *= alpha_scale;
                }
            }
            Renderer::InvLut1d { op, alpha_scale } => {
                for px in rgba.chunks_exact_mut(4) {
                    let out = op.eval_rgb([px[0], px[1], px[2]]);
                    px[0] = out[0];
                    px[1] = out[1];
                    px[2] = out[2];
                    px[3] *= alpha_scale;
                }
            }
            Renderer::Lut3d { op, alpha_scale } => {
                for px in rgba.chunks_exact_mut(4) {
                    let out = op.eval_rgb([px[0], px[1], px[2]]);
                    px[0] = out[0];
                    px[1] = out[1];
                    px[2] = out[2];
                    px[3] *= alpha_scale;
                }
            }
            Renderer::InvLut3d { op, alpha_scale } => {
                for px in rgba.chunks_exact_mut(4) {
                    let out = op.eval_rgb([px[0], px[1], px[2]]);
                    px[0] = out[0];
                    px[1] = out[1];
                    px[2] = out[2];
                    px[3] *= alpha_scale;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use colorpipe_core::{BitDepth, Interpolation};
    use colorpipe_ops::MatrixOp;

    #[test]
    fn matrix_renderer_applies_offsets() {
        let mut m = MatrixOp::identity(BitDepth::F32, BitDepth::F32);
        m.set_offset(0, 0.25);
        let r = Renderer::from_op(Op::Matrix(m)).unwrap();
        let mut buf = [0.5f32, 0.5, 0.5, 1.0];
        r.apply(&mut buf);
        assert_abs_diff_eq!(buf[0], 0.75, epsilon = 1e-6);
        assert_abs_diff_eq!(buf[1], 0.5, epsilon = 1e-6);
        assert_eq!(buf[3], 1.0);
    }

    #[test]
    fn range_renderer_scales_alpha_by_depth_ratio() {
        let r = colorpipe_ops::RangeOp::clamp_full_range(BitDepth::U8, BitDepth::F32);
        let renderer = Renderer::from_op(Op::Range(r)).unwrap();
        let mut buf = [255.0f32, 0.0, 127.5, 255.0];
        renderer.apply(&mut buf);
        assert_abs_diff_eq!(buf[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(buf[2], 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(buf[3], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn fast_style_inverse_1d_becomes_forward_lut() {
        let mut values = Vec::new();
        for i in 0..257 {
            let x = i as f32 / 256.0;
            values.push(x * x);
        }
        let fwd = Lut1dOp::from_values(
            BitDepth::F32,
            BitDepth::F32,
            Interpolation::Linear,
            1,
            &values,
        )
        .unwrap();
        let mut inv = InvLut1dOp::from_forward(&fwd).unwrap();
        inv.set_style(InvStyle::Fast);
        let r = Renderer::from_op(Op::InvLut1d(inv)).unwrap();
        assert_eq!(r.kind(), "lut1d");
        let mut buf = [0.25f32, 0.25, 0.25, 1.0];
        r.apply(&mut buf);
        assert_abs_diff_eq!(buf[0], 0.5, epsilon = 1e-3);
    }

    #[test]
    fn fast_style_with_extended_domain_stays_exact() {
        let fwd = Lut1dOp::identity_half_domain(BitDepth::F16, BitDepth::F32);
        let mut inv = InvLut1dOp::from_forward(&fwd).unwrap();
        inv.set_style(InvStyle::Fast);
        let r = Renderer::from_op(Op::InvLut1d(inv)).unwrap();
        assert_eq!(r.kind(), "invlut1d");
    }

    #[test]
    fn fast_style_inverse_3d_becomes_forward_cube() {
        let fwd = Lut3dOp::identity(BitDepth::F32, BitDepth::F32, 5);
        let mut inv = InvLut3dOp::from_forward(&fwd).unwrap();
        inv.set_style(InvStyle::Fast);
        let r = Renderer::from_op(Op::InvLut3d(inv)).unwrap();
        assert_eq!(r.kind(), "lut3d");
    }
}

//! Op pipelines and their finalization into processors.

use colorpipe_core::{BitDepth, Result};
use colorpipe_ops::{MatrixOp, Op};
use tracing::debug;

use crate::observer::{FinalizeObserver, NullObserver};
use crate::processor::Processor;
use crate::renderer::Renderer;

/// An ordered sequence of ops, mutable until finalized.
///
/// Pushing does not validate and does not reconcile depths; both happen
/// in [`Pipeline::finalize`], which leaves the pipeline untouched and
/// returns an immutable [`Processor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    ops: Vec<Op>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Appends an op to the end of the pipeline.
    pub fn push(&mut self, op: impl Into<Op>) {
        self.ops.push(op.into());
    }

    #[inline]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Appends every op of `other` to this pipeline.
    pub fn concat(&mut self, other: &Pipeline) {
        self.ops.extend(other.ops.iter().cloned());
    }

    /// Validates, optimizes, and compiles the pipeline into a processor.
    pub fn finalize(&self) -> Result<Processor> {
        self.finalize_with(&NullObserver)
    }

    /// [`Pipeline::finalize`] with finalization events reported to an
    /// observer.
    ///
    /// Validation is all-or-nothing: the first invalid op aborts before
    /// any optimization runs. The optimizer then harmonizes depths along
    /// the chain, drops non-clipping identity ops, cancels adjacent
    /// forward/inverse LUT pairs, fuses adjacent matrices, rewrites
    /// clipless ranges as matrices, and fuses once more. The processor
    /// keeps the depths the original pipeline ended with, not those of
    /// the surviving ops.
    pub fn finalize_with(&self, observer: &dyn FinalizeObserver) -> Result<Processor> {
        for op in &self.ops {
            op.validate()?;
        }
        observer.ops_validated(self.ops.len());
        debug!(ops = self.ops.len(), "pipeline validated");

        let (input_depth, output_depth) = match (self.ops.first(), self.ops.last()) {
            (Some(first), Some(last)) => (first.input_depth(), last.output_depth()),
            _ => (BitDepth::F32, BitDepth::F32),
        };

        let mut ops = self.ops.clone();
        harmonize_depths(&mut ops);
        remove_identity_ops(&mut ops, observer);
        remove_inverse_pairs(&mut ops, observer);
        fuse_matrices(&mut ops, observer)?;
        convert_clipless_ranges(&mut ops, observer);
        fuse_matrices(&mut ops, observer)?;
        remove_identity_ops(&mut ops, observer);
        if ops.is_empty() && input_depth != output_depth {
            // Every op vanished but the ends still disagree; the depth
            // conversion itself must survive as a scale.
            ops.push(Op::Matrix(MatrixOp::identity(input_depth, output_depth)));
            debug!(
                ?input_depth,
                ?output_depth,
                "depth conversion kept for emptied pipeline"
            );
        }
        debug!(
            ops = ops.len(),
            ?input_depth,
            ?output_depth,
            "pipeline optimized"
        );

        let mut renderers = Vec::with_capacity(ops.len());
        for (i, op) in ops.into_iter().enumerate() {
            let renderer = Renderer::from_op(op)?;
            observer.renderer_selected(i, renderer.kind());
            debug!(index = i, kind = renderer.kind(), "renderer selected");
            renderers.push(renderer);
        }
        Ok(Processor::new(input_depth, output_depth, renderers))
    }
}

/// Makes each op's input depth match its predecessor's output depth.
fn harmonize_depths(ops: &mut [Op]) {
    for i in 1..ops.len() {
        let prev_out = ops[i - 1].output_depth();
        if ops[i].input_depth() != prev_out {
            ops[i].set_input_bit_depth(prev_out);
        }
    }
}

/// Drops identity ops that do not clip, re-declaring a neighbor's depth
/// so the chain still lines up.
fn remove_identity_ops(ops: &mut Vec<Op>, observer: &dyn FinalizeObserver) {
    let mut i = 0;
    while i < ops.len() {
        if ops[i].is_identity() && !ops[i].clips() {
            let removed = ops.remove(i);
            if i < ops.len() {
                ops[i].set_input_bit_depth(removed.input_depth());
            } else if i > 0 {
                ops[i - 1].set_output_bit_depth(removed.output_depth());
            }
            observer.op_removed(i, removed.kind());
            debug!(index = i, kind = removed.kind(), "identity op removed");
        } else {
            i += 1;
        }
    }
}

/// Drops adjacent forward/inverse LUT pairs; their net effect is the
/// depth conversion between the pair's outer ends.
fn remove_inverse_pairs(ops: &mut Vec<Op>, observer: &dyn FinalizeObserver) {
    let mut i = 0;
    while i + 1 < ops.len() {
        if ops[i].is_inverse_of(&ops[i + 1]) {
            let second = ops.remove(i + 1);
            let first = ops.remove(i);
            if i < ops.len() {
                ops[i].set_input_bit_depth(first.input_depth());
            } else if i > 0 {
                ops[i - 1].set_output_bit_depth(second.output_depth());
            }
            observer.ops_fused(i, "inverse-pair");
            debug!(index = i, "forward/inverse pair removed");
            // The removal may have made a new pair adjacent.
            i = i.saturating_sub(1);
        } else {
            i += 1;
        }
    }
}

/// Fuses each run of adjacent matrices into one.
fn fuse_matrices(ops: &mut Vec<Op>, observer: &dyn FinalizeObserver) -> Result<()> {
    let mut i = 0;
    while i + 1 < ops.len() {
        if let (Op::Matrix(a), Op::Matrix(b)) = (&ops[i], &ops[i + 1]) {
            let fused = a.compose(b)?;
            ops[i] = Op::Matrix(fused);
            ops.remove(i + 1);
            observer.ops_fused(i, "matrix");
            debug!(index = i, "adjacent matrices fused");
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Rewrites every range without clip bounds as the equivalent matrix.
fn convert_clipless_ranges(ops: &mut [Op], observer: &dyn FinalizeObserver) {
    for (i, op) in ops.iter_mut().enumerate() {
        if let Op::Range(r) = op {
            if !r.clips() {
                let matrix = r.convert_to_matrix();
                *op = Op::Matrix(matrix);
                observer.range_converted(i);
                debug!(index = i, "clipless range converted to matrix");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use colorpipe_core::{Error, Interpolation};
    use colorpipe_ops::{InvLut1dOp, Lut1dOp, MatrixOp, RangeOp};
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<String>>,
    }

    impl FinalizeObserver for Recorder {
        fn op_removed(&self, _index: usize, kind: &'static str) {
            self.events.borrow_mut().push(format!("removed:{kind}"));
        }

        fn ops_fused(&self, _index: usize, kind: &'static str) {
            self.events.borrow_mut().push(format!("fused:{kind}"));
        }

        fn range_converted(&self, _index: usize) {
            self.events.borrow_mut().push("converted".into());
        }

        fn renderer_selected(&self, _index: usize, kind: &'static str) {
            self.events.borrow_mut().push(format!("renderer:{kind}"));
        }
    }

    fn scale_matrix(s: f64) -> MatrixOp {
        MatrixOp::from_rgb(
            BitDepth::F32,
            BitDepth::F32,
            [s, 0.0, 0.0, 0.0, s, 0.0, 0.0, 0.0, s],
        )
    }

    #[test]
    fn empty_pipeline_finalizes_to_float_passthrough() {
        let p = Pipeline::new().finalize().unwrap();
        assert_eq!(p.input_depth(), BitDepth::F32);
        assert_eq!(p.output_depth(), BitDepth::F32);
        let mut buf = [0.25f32, 0.5, 0.75, 1.0];
        p.apply_rgba(&mut buf);
        assert_eq!(buf, [0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn identity_ops_are_removed() {
        let mut p = Pipeline::new();
        p.push(MatrixOp::identity(BitDepth::F32, BitDepth::F32));
        p.push(scale_matrix(2.0));
        p.push(MatrixOp::identity(BitDepth::F32, BitDepth::F32));
        let rec = Recorder::default();
        let proc = p.finalize_with(&rec).unwrap();
        assert_eq!(proc.renderer_kinds(), vec!["matrix"]);
        let events = rec.events.borrow();
        assert_eq!(
            events.iter().filter(|e| *e == "removed:matrix").count(),
            2
        );
    }

    #[test]
    fn adjacent_matrices_fuse_into_one() {
        let mut p = Pipeline::new();
        p.push(scale_matrix(2.0));
        p.push(scale_matrix(3.0));
        let proc = p.finalize().unwrap();
        assert_eq!(proc.renderer_kinds(), vec!["matrix"]);
        let mut buf = [0.1f32, 0.2, 0.3, 1.0];
        proc.apply_rgba(&mut buf);
        assert_abs_diff_eq!(buf[0], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(buf[2], 1.8, epsilon = 1e-6);
    }

    #[test]
    fn matrices_fusing_to_identity_vanish() {
        let mut p = Pipeline::new();
        p.push(scale_matrix(2.0));
        p.push(scale_matrix(0.5));
        let proc = p.finalize().unwrap();
        assert!(proc.renderer_kinds().is_empty());
    }

    #[test]
    fn clipless_range_becomes_matrix_and_fuses() {
        let mut p = Pipeline::new();
        // Integer input domain with bounds at the encoding limits: the
        // range rescales but never clips.
        p.push(RangeOp::new(
            BitDepth::U8,
            BitDepth::F32,
            Some(0.0),
            Some(255.0),
            Some(0.1),
            Some(0.9),
        ));
        p.push(scale_matrix(2.0));
        let rec = Recorder::default();
        let proc = p.finalize_with(&rec).unwrap();
        assert_eq!(proc.renderer_kinds(), vec!["matrix"]);
        assert!(rec.events.borrow().iter().any(|e| e == "converted"));
    }

    #[test]
    fn clipping_range_survives_optimization() {
        let mut p = Pipeline::new();
        p.push(RangeOp::clamp_full_range(BitDepth::F32, BitDepth::F32));
        let proc = p.finalize().unwrap();
        assert_eq!(proc.renderer_kinds(), vec!["range"]);
    }

    #[test]
    fn depths_harmonize_along_the_chain() {
        let mut p = Pipeline::new();
        p.push(scale_matrix(2.0));
        let lut = Lut1dOp::from_values(
            BitDepth::U10,
            BitDepth::U10,
            Interpolation::Linear,
            1,
            &[0.0, 255.75, 1023.0],
        )
        .unwrap();
        p.push(lut);
        let proc = p.finalize().unwrap();
        // The LUT re-declares its input as F32 without rescaling its
        // table, so the matrix output 0.5 lands on the middle entry.
        let mut buf = [0.25f32, 0.25, 0.25, 1.0];
        proc.apply_rgba(&mut buf);
        assert_abs_diff_eq!(buf[0], 255.75, epsilon = 1e-2);
    }

    #[test]
    fn emptied_pipeline_keeps_its_depth_conversion() {
        let mut p = Pipeline::new();
        p.push(MatrixOp::identity(BitDepth::U8, BitDepth::F32));
        let proc = p.finalize().unwrap();
        assert_eq!(proc.input_depth(), BitDepth::U8);
        assert_eq!(proc.output_depth(), BitDepth::F32);
        // The identity vanishes but the U8 to F32 scale must not.
        assert_eq!(proc.renderer_kinds(), vec!["matrix"]);
        let mut buf = [255.0f32, 128.0, 0.0, 255.0];
        proc.apply_rgba(&mut buf);
        assert_abs_diff_eq!(buf[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(buf[1], 128.0 / 255.0, epsilon = 1e-6);
        assert_abs_diff_eq!(buf[3], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn forward_inverse_lut_pairs_cancel() {
        let values: Vec<f32> = (0..65).map(|i| (i as f32 / 64.0).sqrt()).collect();
        let fwd = Lut1dOp::from_values(
            BitDepth::F32,
            BitDepth::F32,
            Interpolation::Linear,
            1,
            &values,
        )
        .unwrap();
        let inv = InvLut1dOp::from_forward(&fwd).unwrap();
        let mut p = Pipeline::new();
        p.push(fwd);
        p.push(inv);
        let rec = Recorder::default();
        let proc = p.finalize_with(&rec).unwrap();
        assert!(proc.renderer_kinds().is_empty());
        assert!(
            rec.events
                .borrow()
                .iter()
                .any(|e| e == "fused:inverse-pair")
        );
        let mut buf = [0.33f32, 0.5, 0.77, 1.0];
        proc.apply_rgba(&mut buf);
        assert_eq!(buf, [0.33, 0.5, 0.77, 1.0]);
    }

    #[test]
    fn pair_removal_cascades_to_new_neighbors() {
        // lut, cube, inverse cube, inverse lut: the inner pair cancels
        // first, then the outer one.
        let values: Vec<f32> = (0..65).map(|i| (i as f32 / 64.0).powf(2.0)).collect();
        let fwd = Lut1dOp::from_values(
            BitDepth::F32,
            BitDepth::F32,
            Interpolation::Linear,
            1,
            &values,
        )
        .unwrap();
        let inv = InvLut1dOp::from_forward(&fwd).unwrap();
        let n = 5;
        let mut cube = colorpipe_ops::Lut3dOp::identity(BitDepth::F32, BitDepth::F32, n);
        for r in 0..n {
            for g in 0..n {
                for b in 0..n {
                    let v = cube.rgb_at(r, g, b);
                    cube.set_rgb_at(r, g, b, [v[0] * v[0], v[1] * v[1], v[2] * v[2]]);
                }
            }
        }
        let cube: Op = cube.into();
        let cube_inv = cube.inverse().unwrap();
        let mut p = Pipeline::new();
        p.push(fwd);
        p.push(cube);
        p.push(cube_inv);
        p.push(inv);
        let proc = p.finalize().unwrap();
        assert!(proc.renderer_kinds().is_empty());
    }

    #[test]
    fn invalid_op_aborts_finalization() {
        let mut p = Pipeline::new();
        p.push(scale_matrix(2.0));
        p.push(RangeOp::new(
            BitDepth::F32,
            BitDepth::F32,
            Some(0.0),
            None,
            None,
            Some(1.0),
        ));
        let err = p.finalize().unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
    }

    #[test]
    fn finalize_leaves_the_pipeline_unchanged() {
        let mut p = Pipeline::new();
        p.push(scale_matrix(2.0));
        p.push(scale_matrix(0.5));
        let before = p.clone();
        let _ = p.finalize().unwrap();
        assert_eq!(p, before);
    }

    #[test]
    fn concat_appends_ops() {
        let mut a = Pipeline::new();
        a.push(scale_matrix(2.0));
        let mut b = Pipeline::new();
        b.push(RangeOp::clamp_full_range(BitDepth::F32, BitDepth::F32));
        a.concat(&b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.ops()[1].kind(), "range");
    }

    #[test]
    fn lut_identity_is_removed_with_depth_reattach() {
        let mut p = Pipeline::new();
        p.push(Lut1dOp::identity(
            BitDepth::U8,
            BitDepth::U8,
            256,
        ));
        let lut = Lut1dOp::from_values(
            BitDepth::U8,
            BitDepth::F32,
            Interpolation::Linear,
            1,
            &[0.0, 0.25, 1.0],
        )
        .unwrap();
        p.push(lut);
        let proc = p.finalize().unwrap();
        assert_eq!(proc.renderer_kinds(), vec!["lut1d"]);
        assert_eq!(proc.input_depth(), BitDepth::U8);
    }
}

//! Immutable, thread-safe processors produced by pipeline finalization.

use colorpipe_core::{BitDepth, Error, Result};

use crate::packing::{PixelSlice, PixelSliceMut};
use crate::renderer::Renderer;

/// Pixels converted per scratch fill on the packed apply path.
const CHUNK_PIXELS: usize = 1024;

/// A finalized pipeline, ready to process pixels.
///
/// Processors hold no mutable state; one instance can serve any number
/// of threads at once. The declared depths are those of the pipeline as
/// built, even when the optimizer removed the ops that carried them.
#[derive(Debug)]
pub struct Processor {
    input_depth: BitDepth,
    output_depth: BitDepth,
    renderers: Vec<Renderer>,
}

impl Processor {
    pub(crate) fn new(
        input_depth: BitDepth,
        output_depth: BitDepth,
        renderers: Vec<Renderer>,
    ) -> Self {
        Self {
            input_depth,
            output_depth,
            renderers,
        }
    }

    #[inline]
    pub fn input_depth(&self) -> BitDepth {
        self.input_depth
    }

    #[inline]
    pub fn output_depth(&self) -> BitDepth {
        self.output_depth
    }

    /// Kind tags of the surviving renderers, in execution order.
    pub fn renderer_kinds(&self) -> Vec<&'static str> {
        self.renderers.iter().map(|r| r.kind()).collect()
    }

    /// Runs the transform over an RGBA f32 buffer in place.
    ///
    /// Values are in the scaled units of the declared depths: a U10
    /// input expects 0.0..=1023.0. The buffer length must be a multiple
    /// of 4; excess values past the last full quad are ignored.
    pub fn apply_rgba(&self, rgba: &mut [f32]) {
        let full = rgba.len() - rgba.len() % 4;
        let rgba = &mut rgba[..full];
        for renderer in &self.renderers {
            renderer.apply(rgba);
        }
    }

    /// Runs the transform from one packed buffer into another.
    ///
    /// `src` must use the storage of the input depth and `dst` that of
    /// the output depth; both must hold the same number of whole RGBA
    /// pixels. Conversion happens in fixed-size chunks through an f32
    /// scratch, so arbitrarily large buffers cost constant memory.
    pub fn apply(&self, src: PixelSlice<'_>, dst: &mut PixelSliceMut<'_>) -> Result<()> {
        if src.len() != dst.len() {
            return Err(Error::BufferMismatch(format!(
                "source holds {} values but destination holds {}",
                src.len(),
                dst.len()
            )));
        }
        if src.len() % 4 != 0 {
            return Err(Error::BufferMismatch(format!(
                "buffer length {} is not a whole number of RGBA pixels",
                src.len()
            )));
        }
        if !src.matches(self.input_depth) {
            return Err(Error::BufferMismatch(format!(
                "source storage does not match input depth {}",
                self.input_depth
            )));
        }
        if !dst.matches(self.output_depth) {
            return Err(Error::BufferMismatch(format!(
                "destination storage does not match output depth {}",
                self.output_depth
            )));
        }

        let mut scratch = [0.0f32; CHUNK_PIXELS * 4];
        let mut start = 0;
        while start < src.len() {
            let count = (src.len() - start).min(CHUNK_PIXELS * 4);
            let chunk = &mut scratch[..count];
            src.load(start, chunk);
            for renderer in &self.renderers {
                renderer.apply(chunk);
            }
            dst.store(start, chunk, self.output_depth);
            start += count;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use approx::assert_abs_diff_eq;
    use colorpipe_ops::{MatrixOp, RangeOp};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn processor_is_send_and_sync() {
        assert_send_sync::<Processor>();
    }

    #[test]
    fn processor_formats_for_debugging() {
        let mut p = Pipeline::new();
        p.push(RangeOp::clamp_full_range(BitDepth::F32, BitDepth::F32));
        let proc = p.finalize().unwrap();
        let text = format!("{proc:?}");
        assert!(text.contains("Processor"));
    }

    #[test]
    fn packed_apply_converts_depths() {
        let mut p = Pipeline::new();
        p.push(RangeOp::clamp_full_range(BitDepth::U8, BitDepth::F32));
        let proc = p.finalize().unwrap();
        let src = [0u8, 128, 255, 255];
        let mut out = [0.0f32; 4];
        proc.apply(PixelSlice::U8(&src), &mut PixelSliceMut::F32(&mut out))
            .unwrap();
        assert_abs_diff_eq!(out[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out[1], 128.0 / 255.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out[2], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out[3], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let proc = Pipeline::new().finalize().unwrap();
        let src = [0.0f32; 8];
        let mut out = [0.0f32; 4];
        let err = proc
            .apply(PixelSlice::F32(&src), &mut PixelSliceMut::F32(&mut out))
            .unwrap_err();
        assert_eq!(err.code(), "BufferMismatch");
    }

    #[test]
    fn partial_pixels_are_rejected() {
        let proc = Pipeline::new().finalize().unwrap();
        let src = [0.0f32; 6];
        let mut out = [0.0f32; 6];
        let err = proc
            .apply(PixelSlice::F32(&src), &mut PixelSliceMut::F32(&mut out))
            .unwrap_err();
        assert_eq!(err.code(), "BufferMismatch");
    }

    #[test]
    fn wrong_storage_is_rejected() {
        let mut p = Pipeline::new();
        p.push(MatrixOp::identity(BitDepth::U8, BitDepth::F32));
        let proc = p.finalize().unwrap();
        let src = [0.0f32; 4];
        let mut out = [0.0f32; 4];
        let err = proc
            .apply(PixelSlice::F32(&src), &mut PixelSliceMut::F32(&mut out))
            .unwrap_err();
        assert_eq!(err.code(), "BufferMismatch");
    }

    #[test]
    fn large_buffers_process_across_chunks() {
        let mut p = Pipeline::new();
        p.push(MatrixOp::from_rgb(
            BitDepth::F32,
            BitDepth::F32,
            [2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0],
        ));
        let proc = p.finalize().unwrap();
        // 1500 pixels forces two scratch fills.
        let src: Vec<f32> = (0..1500 * 4).map(|i| (i % 7) as f32 * 0.1).collect();
        let mut out = vec![0.0f32; src.len()];
        proc.apply(PixelSlice::F32(&src), &mut PixelSliceMut::F32(&mut out))
            .unwrap();
        for (i, (&s, &o)) in src.iter().zip(&out).enumerate() {
            if i % 4 == 3 {
                assert_abs_diff_eq!(o, s, epsilon = 1e-6);
            } else {
                assert_abs_diff_eq!(o, s * 2.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn apply_rgba_ignores_trailing_partial_quad() {
        let mut p = Pipeline::new();
        p.push(MatrixOp::from_rgb(
            BitDepth::F32,
            BitDepth::F32,
            [2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0],
        ));
        let proc = p.finalize().unwrap();
        let mut buf = [1.0f32; 6];
        proc.apply_rgba(&mut buf);
        assert_eq!(buf[0], 2.0);
        assert_eq!(buf[4], 1.0);
    }
}

//! End-to-end pipeline scenarios exercising finalization and rendering
//! across op kinds.

use approx::assert_abs_diff_eq;
use colorpipe_core::{BitDepth, Interpolation};
use colorpipe_engine::{Pipeline, PixelSlice, PixelSliceMut};
use colorpipe_ops::{InvLut1dOp, InvStyle, Lut1dOp, Lut3dOp, MatrixOp, Op, RangeOp};

fn crosstalk_matrix() -> MatrixOp {
    MatrixOp::from_coeffs(
        BitDepth::F32,
        BitDepth::F32,
        [
            0.9, 0.8, -0.7, 0.6, //
            -0.4, 0.5, 0.3, 0.2, //
            0.1, -0.2, 0.4, 0.3, //
            -0.5, 0.6, 0.7, 0.8,
        ],
        [-0.1, 0.2, -0.3, 0.4],
    )
}

#[test]
fn matrix_followed_by_its_inverse_round_trips() {
    let m = crosstalk_matrix();
    let inv = m.inverse().unwrap();
    let mut p = Pipeline::new();
    p.push(m);
    p.push(inv);
    let proc = p.finalize().unwrap();

    let mut rgba = [1.0f32, 1.0, 1.0, 1.0];
    proc.apply_rgba(&mut rgba);
    for v in rgba {
        assert_abs_diff_eq!(v, 1.0, epsilon = 1e-6);
    }
}

#[test]
fn identity_cube_with_tetrahedral_interpolation_is_transparent() {
    let mut cube = Lut3dOp::identity(BitDepth::F32, BitDepth::F32, 33);
    cube.set_interpolation(Interpolation::Tetrahedral);

    let out = cube.eval_rgb([0.1, 0.25, 0.7]);
    assert_abs_diff_eq!(out[0], 0.1, epsilon = 1e-6);
    assert_abs_diff_eq!(out[1], 0.25, epsilon = 1e-6);
    assert_abs_diff_eq!(out[2], 0.7, epsilon = 1e-6);

    let mut p = Pipeline::new();
    p.push(cube);
    let proc = p.finalize().unwrap();
    let mut rgba = [0.1f32, 0.25, 0.7, 0.0, 0.66, 0.25, 0.81, 0.5];
    let expected = rgba;
    proc.apply_rgba(&mut rgba);
    for (got, want) in rgba.iter().zip(expected) {
        assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
    }
}

#[test]
fn video_range_expansion_clamps_and_rescales() {
    let mut p = Pipeline::new();
    p.push(RangeOp::new(
        BitDepth::U8,
        BitDepth::F32,
        Some(16.0),
        Some(235.0),
        Some(0.0),
        Some(1.0),
    ));
    let proc = p.finalize().unwrap();

    let mut rgba = [
        16.0f32, 235.0, 0.0, 255.0, //
        255.0, 128.0, 16.0, 255.0,
    ];
    proc.apply_rgba(&mut rgba);
    assert_abs_diff_eq!(rgba[0], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(rgba[1], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(rgba[2], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(rgba[4], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(rgba[5], 0.51142, epsilon = 1e-5);
}

#[test]
fn gamma_lut_evaluates_midpoint() {
    let values: Vec<f32> = (0..1025)
        .map(|i| (i as f32 / 1024.0).powf(2.2))
        .collect();
    let lut = Lut1dOp::from_values(
        BitDepth::F32,
        BitDepth::F32,
        Interpolation::Linear,
        1,
        &values,
    )
    .unwrap();
    let mut p = Pipeline::new();
    p.push(lut);
    let proc = p.finalize().unwrap();

    let mut rgba = [0.5f32, 0.5, 0.5, 1.0];
    proc.apply_rgba(&mut rgba);
    assert_abs_diff_eq!(rgba[0], 0.5f32.powf(2.2), epsilon = 1e-4);
}

#[test]
fn half_domain_lut_looks_up_bit_patterns_exactly() {
    let mut lut = Lut1dOp::identity_half_domain(BitDepth::F16, BitDepth::F32);
    lut.array_mut().scale(2.0);
    let mut p = Pipeline::new();
    p.push(lut);
    let proc = p.finalize().unwrap();

    let mut rgba = [1.0f32, 0.5, 0.25, 1.0];
    proc.apply_rgba(&mut rgba);
    assert_eq!(rgba[0], 2.0);
    assert_eq!(rgba[1], 1.0);
    assert_eq!(rgba[2], 0.5);
}

#[test]
fn extended_range_lut_feeding_a_clamp() {
    // Half-domain identity passes values above 1.0 through; the trailing
    // range is what limits them.
    let lut = Lut1dOp::identity_half_domain(BitDepth::F16, BitDepth::F32);
    let mut p = Pipeline::new();
    p.push(lut);
    p.push(RangeOp::clamp_full_range(BitDepth::F32, BitDepth::F32));
    let proc = p.finalize().unwrap();

    let mut rgba = [2.0f32, 0.5, -0.25, 1.0];
    proc.apply_rgba(&mut rgba);
    assert_abs_diff_eq!(rgba[0], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(rgba[1], 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(rgba[2], 0.0, epsilon = 1e-6);
}

#[test]
fn inverse_lut_monotonizes_each_channel() {
    let values = [
        0.10, 0.90, 0.25, //
        0.20, 0.80, 0.30, //
        0.15, 0.85, 0.20, //
        0.60, 0.40, 0.70, //
        1.00, 0.00, 1.00,
    ];
    let fwd = Lut1dOp::from_values(
        BitDepth::F32,
        BitDepth::F32,
        Interpolation::Linear,
        3,
        &values,
    )
    .unwrap();
    let inv = InvLut1dOp::from_forward(&fwd).unwrap();

    for channel in 0..3 {
        let table = inv.flattened_values(channel);
        let increasing = inv.component_properties(channel).is_increasing;
        for pair in table.windows(2) {
            if increasing {
                assert!(pair[1] >= pair[0], "channel {channel} not non-decreasing");
            } else {
                assert!(pair[1] <= pair[0], "channel {channel} not non-increasing");
            }
        }
    }
}

#[test]
fn fast_and_exact_inversion_agree_on_smooth_curves() {
    let values: Vec<f32> = (0..257).map(|i| (i as f32 / 256.0).powf(2.2)).collect();
    let fwd = Lut1dOp::from_values(
        BitDepth::F32,
        BitDepth::F32,
        Interpolation::Linear,
        1,
        &values,
    )
    .unwrap();
    let exact = InvLut1dOp::from_forward(&fwd).unwrap();
    let mut fast = exact.clone();
    fast.set_style(InvStyle::Fast);

    let mut pe = Pipeline::new();
    pe.push(Op::InvLut1d(exact));
    let pe = pe.finalize().unwrap();
    let mut pf = Pipeline::new();
    pf.push(Op::InvLut1d(fast));
    let pf = pf.finalize().unwrap();

    for i in 1..20 {
        let y = i as f32 / 20.0;
        let mut a = [y, y, y, 1.0];
        let mut b = a;
        pe.apply_rgba(&mut a);
        pf.apply_rgba(&mut b);
        assert_abs_diff_eq!(a[0], b[0], epsilon = 2e-3);
    }
}

#[test]
fn lut_and_its_inverse_cancel_through_the_pipeline() {
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
    let proc = p.finalize().unwrap();

    for &x in &[0.0f32, 0.1, 0.33, 0.5, 0.77, 1.0] {
        let mut rgba = [x, x, x, 1.0];
        proc.apply_rgba(&mut rgba);
        assert_abs_diff_eq!(rgba[0], x, epsilon = 1e-4);
    }
}

#[test]
fn mixed_depth_chain_processes_packed_buffers() {
    let mut p = Pipeline::new();
    p.push(RangeOp::new(
        BitDepth::U8,
        BitDepth::F32,
        Some(0.0),
        Some(255.0),
        Some(0.0),
        Some(1.0),
    ));
    p.push(crosstalk_matrix());
    p.push(RangeOp::clamp_full_range(BitDepth::F32, BitDepth::U16));
    let proc = p.finalize().unwrap();
    assert_eq!(proc.input_depth(), BitDepth::U8);
    assert_eq!(proc.output_depth(), BitDepth::U16);

    let src = [0u8, 64, 128, 255, 255, 255, 255, 255];
    let mut dst = [0u16; 8];
    proc.apply(PixelSlice::U8(&src), &mut PixelSliceMut::U16(&mut dst))
        .unwrap();
    // Second pixel: all channels 1.0 into the matrix, clamped to U16.
    // Allow one code value of slack for f32 accumulation order.
    let expect = |row: [f64; 4], off: f64| {
        (row.iter().sum::<f64>() + off).clamp(0.0, 1.0) * 65535.0
    };
    assert!((dst[4] as f64 - expect([0.9, 0.8, -0.7, 0.6], -0.1)).abs() <= 1.0);
    assert!((dst[5] as f64 - expect([-0.4, 0.5, 0.3, 0.2], 0.2)).abs() <= 1.0);
    assert!((dst[6] as f64 - expect([0.1, -0.2, 0.4, 0.3], -0.3)).abs() <= 1.0);
}

#[test]
fn processors_are_shared_across_threads() {
    let mut p = Pipeline::new();
    p.push(crosstalk_matrix());
    let proc = p.finalize().unwrap();
    let proc = &proc;

    std::thread::scope(|s| {
        for t in 0..4 {
            s.spawn(move || {
                let x = t as f32 * 0.1;
                let mut rgba = [x, x, x, 1.0];
                proc.apply_rgba(&mut rgba);
                let want = (0.9 + 0.8 - 0.7) * x + 0.6 - 0.1;
                assert_abs_diff_eq!(rgba[0], want, epsilon = 1e-5);
            });
        }
    });
}

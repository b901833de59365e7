//! Exact and fast inversion of 3D LUTs.
//!
//! The forward cube is extended by one extrapolated plane on every face so
//! outputs slightly outside the cube's range stay invertible. A bounding
//! box tree over the extended cells narrows each query down to the few
//! cells whose value range contains it; the candidate cells are then
//! inverted analytically through the six tetrahedra of the cell.

use std::collections::VecDeque;

use colorpipe_core::{BitDepth, Error, Result};

use crate::lut3d::Lut3dOp;
use crate::op::InvStyle;

/// Default edge length of the cube built by [`InvLut3dOp::make_fast_lut3d`].
pub const FAST_LUT3D_GRID_SIZE: usize = 48;

/// Slack added to cell value ranges so queries on a cell boundary are
/// found in either neighbor.
const RANGE_TOL: f32 = 1e-6;

/// Tolerance on the barycentric ordering constraints of a tetrahedron.
const DELTA_TOL: f64 = 1e-9;

/// Determinant threshold below which a tetrahedron is treated as
/// degenerate and skipped.
const DET_TOL: f64 = 1e-12;

#[inline]
fn gidx(dim: usize, i: usize, j: usize, k: usize) -> usize {
    ((i * dim + j) * dim + k) * 3
}

/// Forward cube values normalized to [0, 1]-ish units and extended by one
/// extrapolated plane per face.
#[derive(Debug, Clone)]
struct InvGrid {
    /// Edge length, `n + 2`.
    dim: usize,
    /// Blue-fastest RGB triples.
    values: Vec<f32>,
    /// Componentwise achievable output range, extrapolated planes
    /// included. Queries are clamped here before the tree walk.
    min: [f32; 3],
    max: [f32; 3],
}

impl InvGrid {
    fn build(lut: &Lut3dOp) -> Self {
        let n = lut.grid_size();
        let dim = n + 2;
        let scale = (1.0 / lut.input_depth().max_value()) as f32;
        let mut values = vec![0.0f32; dim * dim * dim * 3];
        for r in 0..n {
            for g in 0..n {
                for b in 0..n {
                    let v = lut.rgb_at(r, g, b);
                    let e = gidx(dim, r + 1, g + 1, b + 1);
                    values[e] = v[0] * scale;
                    values[e + 1] = v[1] * scale;
                    values[e + 2] = v[2] * scale;
                }
            }
        }
        // Linear extrapolation from the two nearest planes, one axis at a
        // time so edges and corners pick up both contributions.
        let last = dim - 1;
        for j in 1..=n {
            for k in 1..=n {
                for c in 0..3 {
                    values[gidx(dim, 0, j, k) + c] =
                        2.0 * values[gidx(dim, 1, j, k) + c] - values[gidx(dim, 2, j, k) + c];
                    values[gidx(dim, last, j, k) + c] = 2.0
                        * values[gidx(dim, last - 1, j, k) + c]
                        - values[gidx(dim, last - 2, j, k) + c];
                }
            }
        }
        for i in 0..dim {
            for k in 1..=n {
                for c in 0..3 {
                    values[gidx(dim, i, 0, k) + c] =
                        2.0 * values[gidx(dim, i, 1, k) + c] - values[gidx(dim, i, 2, k) + c];
                    values[gidx(dim, i, last, k) + c] = 2.0
                        * values[gidx(dim, i, last - 1, k) + c]
                        - values[gidx(dim, i, last - 2, k) + c];
                }
            }
        }
        for i in 0..dim {
            for j in 0..dim {
                for c in 0..3 {
                    values[gidx(dim, i, j, 0) + c] =
                        2.0 * values[gidx(dim, i, j, 1) + c] - values[gidx(dim, i, j, 2) + c];
                    values[gidx(dim, i, j, last) + c] = 2.0
                        * values[gidx(dim, i, j, last - 1) + c]
                        - values[gidx(dim, i, j, last - 2) + c];
                }
            }
        }
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for e in 0..dim * dim * dim {
            for c in 0..3 {
                let v = values[e * 3 + c];
                min[c] = min[c].min(v);
                max[c] = max[c].max(v);
            }
        }
        Self {
            dim,
            values,
            min,
            max,
        }
    }

    #[inline]
    fn at(&self, i: usize, j: usize, k: usize) -> [f32; 3] {
        let e = gidx(self.dim, i, j, k);
        [self.values[e], self.values[e + 1], self.values[e + 2]]
    }

    /// The 8 corner values of cell `(i, j, k)`, indexed by the bit
    /// pattern `r << 2 | g << 1 | b`.
    fn cell_corners(&self, cell: [u16; 3]) -> [[f32; 3]; 8] {
        let [i, j, k] = [cell[0] as usize, cell[1] as usize, cell[2] as usize];
        [
            self.at(i, j, k),
            self.at(i, j, k + 1),
            self.at(i, j + 1, k),
            self.at(i, j + 1, k + 1),
            self.at(i + 1, j, k),
            self.at(i + 1, j, k + 1),
            self.at(i + 1, j + 1, k),
            self.at(i + 1, j + 1, k + 1),
        ]
    }
}

#[derive(Debug, Clone, Copy)]
struct TreeNode {
    min: [f32; 3],
    max: [f32; 3],
    first_child: u32,
    child_count: u8,
    cell: [u16; 3],
}

struct Built {
    min: [f32; 3],
    max: [f32; 3],
    children: Vec<Built>,
    cell: [u16; 3],
}

/// Bounding box tree over the value ranges of the extended cells.
///
/// Children of a node are stored contiguously; leaves carry the cell
/// index. The root box is also the achievable output range used to clamp
/// queries.
#[derive(Debug, Clone)]
struct RangeTree {
    nodes: Vec<TreeNode>,
}

impl RangeTree {
    fn build(grid: &InvGrid) -> Self {
        let cells = grid.dim - 1;
        let root = Self::build_box(grid, 0, cells, 0, cells, 0, cells);
        let mut nodes = Vec::new();
        nodes.push(TreeNode {
            min: root.min,
            max: root.max,
            first_child: 0,
            child_count: 0,
            cell: root.cell,
        });
        let mut queue = VecDeque::new();
        queue.push_back((0usize, root));
        while let Some((slot, built)) = queue.pop_front() {
            nodes[slot].first_child = nodes.len() as u32;
            nodes[slot].child_count = built.children.len() as u8;
            for child in built.children {
                let id = nodes.len();
                nodes.push(TreeNode {
                    min: child.min,
                    max: child.max,
                    first_child: 0,
                    child_count: 0,
                    cell: child.cell,
                });
                queue.push_back((id, child));
            }
        }
        Self { nodes }
    }

    fn build_box(
        grid: &InvGrid,
        i0: usize,
        i1: usize,
        j0: usize,
        j1: usize,
        k0: usize,
        k1: usize,
    ) -> Built {
        if i1 - i0 == 1 && j1 - j0 == 1 && k1 - k0 == 1 {
            let cell = [i0 as u16, j0 as u16, k0 as u16];
            let corners = grid.cell_corners(cell);
            let mut min = corners[0];
            let mut max = corners[0];
            for corner in &corners[1..] {
                for c in 0..3 {
                    min[c] = min[c].min(corner[c]);
                    max[c] = max[c].max(corner[c]);
                }
            }
            for c in 0..3 {
                min[c] -= RANGE_TOL;
                max[c] += RANGE_TOL;
            }
            return Built {
                min,
                max,
                children: Vec::new(),
                cell,
            };
        }
        let split = |lo: usize, hi: usize| -> Vec<(usize, usize)> {
            if hi - lo > 1 {
                let mid = (lo + hi) / 2;
                vec![(lo, mid), (mid, hi)]
            } else {
                vec![(lo, hi)]
            }
        };
        let mut children = Vec::new();
        for &(ia, ib) in &split(i0, i1) {
            for &(ja, jb) in &split(j0, j1) {
                for &(ka, kb) in &split(k0, k1) {
                    children.push(Self::build_box(grid, ia, ib, ja, jb, ka, kb));
                }
            }
        }
        let mut min = children[0].min;
        let mut max = children[0].max;
        for child in &children[1..] {
            for c in 0..3 {
                min[c] = min[c].min(child.min[c]);
                max[c] = max[c].max(child.max[c]);
            }
        }
        Built {
            min,
            max,
            children,
            cell: [0; 3],
        }
    }

    /// Visits each cell whose value box contains `y` until `visit`
    /// returns true.
    fn for_each_candidate(&self, y: [f32; 3], visit: &mut impl FnMut([u16; 3]) -> bool) -> bool {
        let mut stack = [0u32; 128];
        stack[0] = 0;
        let mut sp = 1usize;
        while sp > 0 {
            sp -= 1;
            let node = &self.nodes[stack[sp] as usize];
            let inside = (0..3).all(|c| y[c] >= node.min[c] && y[c] <= node.max[c]);
            if !inside {
                continue;
            }
            if node.child_count == 0 {
                if visit(node.cell) {
                    return true;
                }
            } else {
                for c in 0..node.child_count as u32 {
                    debug_assert!(sp < stack.len());
                    stack[sp] = node.first_child + c;
                    sp += 1;
                }
            }
        }
        false
    }
}

/// Vertex chains of the six tetrahedra of a cell, as corner bit patterns
/// (`r << 2 | g << 1 | b`), with the axis order of the sorted deltas.
const TETRA_CHAINS: [([usize; 4], [usize; 3]); 6] = [
    // r >= g >= b: deltas sort to (fr, fg, fb)
    ([0, 4, 6, 7], [0, 1, 2]),
    // r >= b >= g
    ([0, 4, 5, 7], [0, 2, 1]),
    // b >= r >= g
    ([0, 1, 5, 7], [1, 2, 0]),
    // b >= g >= r
    ([0, 1, 3, 7], [2, 1, 0]),
    // g >= b >= r
    ([0, 2, 3, 7], [2, 0, 1]),
    // g >= r >= b
    ([0, 2, 6, 7], [1, 0, 2]),
];

/// Solves one cell for the grid-space fractions that map to `y`, trying
/// each tetrahedron in turn.
fn invert_cell(corners: &[[f32; 3]; 8], y: [f32; 3]) -> Option<[f32; 3]> {
    for &(chain, axis_of_delta) in &TETRA_CHAINS {
        let v0 = corners[chain[0]];
        let mut m = [[0.0f64; 3]; 3];
        for step in 0..3 {
            let a = corners[chain[step]];
            let b = corners[chain[step + 1]];
            for c in 0..3 {
                m[c][step] = (b[c] - a[c]) as f64;
            }
        }
        let rhs = [
            (y[0] - v0[0]) as f64,
            (y[1] - v0[1]) as f64,
            (y[2] - v0[2]) as f64,
        ];
        let det = det3(&m);
        if det.abs() < DET_TOL {
            continue;
        }
        let mut d = [0.0f64; 3];
        for col in 0..3 {
            let mut mc = m;
            for r in 0..3 {
                mc[r][col] = rhs[r];
            }
            d[col] = det3(&mc) / det;
        }
        // The deltas must be sorted and lie in [0, 1] up to tolerance for
        // the point to be inside this tetrahedron.
        if d[0] <= 1.0 + DELTA_TOL
            && d[0] >= d[1] - DELTA_TOL
            && d[1] >= d[2] - DELTA_TOL
            && d[2] >= -DELTA_TOL
        {
            let mut frac = [0.0f32; 3];
            for step in 0..3 {
                frac[axis_of_delta[step]] = d[step] as f32;
            }
            return Some(frac);
        }
    }
    None
}

#[inline]
fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Exact inverse of a [`Lut3dOp`].
///
/// Holds the forward cube unchanged with swapped depths, plus the derived
/// extended grid and search tree.
#[derive(Debug, Clone)]
pub struct InvLut3dOp {
    lut: Lut3dOp,
    style: InvStyle,
    grid: InvGrid,
    tree: RangeTree,
}

impl PartialEq for InvLut3dOp {
    fn eq(&self, other: &Self) -> bool {
        // The grid and tree are a pure function of the forward cube.
        self.lut == other.lut && self.style == other.style
    }
}

impl InvLut3dOp {
    /// Builds the inverse of `forward`: same cube, depths swapped.
    pub fn from_forward(forward: &Lut3dOp) -> Result<Self> {
        forward.validate()?;
        let mut lut = forward.clone();
        lut.swap_depths();
        let grid = InvGrid::build(&lut);
        let tree = RangeTree::build(&grid);
        Ok(Self {
            lut,
            style: InvStyle::Exact,
            grid,
            tree,
        })
    }

    fn rebuild(&mut self) {
        self.grid = InvGrid::build(&self.lut);
        self.tree = RangeTree::build(&self.grid);
    }

    #[inline]
    pub fn input_depth(&self) -> BitDepth {
        self.lut.input_depth()
    }

    #[inline]
    pub fn output_depth(&self) -> BitDepth {
        self.lut.output_depth()
    }

    /// The forward cube payload carried by this op (depths swapped).
    #[inline]
    pub fn lut(&self) -> &Lut3dOp {
        &self.lut
    }

    #[inline]
    pub fn style(&self) -> InvStyle {
        self.style
    }

    pub fn set_style(&mut self, style: InvStyle) {
        self.style = style;
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

    /// Whether this op undoes `forward`: the same cube bitwise. Declared
    /// depths are not compared.
    pub fn is_inverse_of(&self, forward: &Lut3dOp) -> bool {
        self.lut.array() == forward.array()
    }

    /// Exact inversion of one RGB triple.
    ///
    /// The query is clamped to the achievable output range of the
    /// extended cube; NaN components clamp to its lower corner. Values
    /// the cube never produces map to zero.
    pub fn eval_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        let max_in = self.input_depth().max_value() as f32;
        let mut y = [0.0f32; 3];
        for c in 0..3 {
            let mut v = rgb[c] / max_in;
            if v.is_nan() {
                v = self.grid.min[c];
            }
            y[c] = v.max(self.grid.min[c]).min(self.grid.max[c]);
        }
        let n = self.lut.grid_size();
        // Cells made only of original grid points; the shell cells involve
        // extrapolated corners and do not follow the true forward mapping,
        // so they only answer queries no interior cell can.
        let interior = |cell: [u16; 3]| cell.iter().all(|&c| c >= 1 && c <= (n - 1) as u16);
        let mut hit: Option<[f32; 3]> = None;
        let mut shell_hit: Option<[f32; 3]> = None;
        let grid = &self.grid;
        self.tree.for_each_candidate(y, &mut |cell| {
            let corners = grid.cell_corners(cell);
            if let Some(frac) = invert_cell(&corners, y) {
                let g = [
                    cell[0] as f32 + frac[0],
                    cell[1] as f32 + frac[1],
                    cell[2] as f32 + frac[2],
                ];
                if interior(cell) {
                    hit = Some(g);
                    return true;
                }
                if shell_hit.is_none() {
                    shell_hit = Some(g);
                }
            }
            false
        });
        let hit = hit.or(shell_hit);
        let out_scale = (self.output_depth().max_value() / (n - 1) as f64) as f32;
        match hit {
            Some(g) => {
                let mut out = [0.0f32; 3];
                for c in 0..3 {
                    // Shift out of the extended grid and clamp to the
                    // original cube.
                    out[c] = (g[c] - 1.0).clamp(0.0, (n - 1) as f32) * out_scale;
                }
                out
            }
            None => [0.0; 3],
        }
    }

    /// Re-declares the input depth, rescaling the cube (it lives in input
    /// units here) and rebuilding the derived state.
    pub fn set_input_bit_depth(&mut self, depth: BitDepth) {
        let factor = self.input_depth().scale_to(depth) as f32;
        self.lut.array_mut().scale(factor);
        self.lut.header_mut().set_input_depth(depth);
        self.rebuild();
    }

    /// Re-declares the output depth; the output scale is applied at eval.
    pub fn set_output_bit_depth(&mut self, depth: BitDepth) {
        self.lut.header_mut().set_output_depth(depth);
    }

    /// The forward cube: a bitwise copy of the stored array with the
    /// depths swapped back.
    pub fn inverse(&self) -> Lut3dOp {
        let mut lut = self.lut.clone();
        lut.swap_depths();
        lut
    }

    /// Samples the exact inversion onto an identity grid of edge length
    /// `grid_size`, producing a forward cube rendered tetrahedrally.
    pub fn make_fast_lut3d(&self, grid_size: usize) -> Result<Lut3dOp> {
        if grid_size < 2 || grid_size > crate::lut3d::MAX_GRID_SIZE {
            return Err(Error::GridTooLarge {
                got: grid_size,
                max: crate::lut3d::MAX_GRID_SIZE,
            });
        }
        let step = self.input_depth().step_size(grid_size) as f32;
        let mut fast = Lut3dOp::identity(self.input_depth(), self.output_depth(), grid_size);
        fast.set_interpolation(colorpipe_core::Interpolation::Tetrahedral);
        for r in 0..grid_size {
            for g in 0..grid_size {
                for b in 0..grid_size {
                    let y = [r as f32 * step, g as f32 * step, b as f32 * step];
                    fast.set_rgb_at(r, g, b, self.eval_rgb(y));
                }
            }
        }
        Ok(fast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use colorpipe_core::Interpolation;

    fn gamma_cube(n: usize) -> Lut3dOp {
        let mut lut = Lut3dOp::identity(BitDepth::F32, BitDepth::F32, n);
        for r in 0..n {
            for g in 0..n {
                for b in 0..n {
                    let v = lut.rgb_at(r, g, b);
                    lut.set_rgb_at(r, g, b, [v[0] * v[0], v[1] * v[1], v[2] * v[2]]);
                }
            }
        }
        lut.set_interpolation(Interpolation::Tetrahedral);
        lut
    }

    #[test]
    fn inverse_swaps_depths_without_rescaling() {
        let fwd = Lut3dOp::identity(BitDepth::U10, BitDepth::F32, 5);
        let inv = InvLut3dOp::from_forward(&fwd).unwrap();
        assert_eq!(inv.input_depth(), BitDepth::F32);
        assert_eq!(inv.output_depth(), BitDepth::U10);
        assert_eq!(inv.lut().array(), fwd.array());
    }

    #[test]
    fn double_inverse_is_bitwise_identical() {
        let fwd = gamma_cube(5);
        let inv = InvLut3dOp::from_forward(&fwd).unwrap();
        assert_eq!(inv.inverse(), fwd);
    }

    #[test]
    fn exact_inversion_round_trips() {
        let fwd = gamma_cube(9);
        let inv = InvLut3dOp::from_forward(&fwd).unwrap();
        for &x in &[
            [0.0f32, 0.0, 0.0],
            [0.2, 0.5, 0.8],
            [0.9, 0.1, 0.4],
            [1.0, 1.0, 1.0],
            [0.33, 0.33, 0.33],
        ] {
            let y = fwd.eval_rgb(x);
            let back = inv.eval_rgb(y);
            for c in 0..3 {
                assert_abs_diff_eq!(back[c], x[c], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn near_black_round_trips_through_interior_cells() {
        // Low outputs also fall inside the value boxes of the extrapolated
        // shell cells; the true preimage lives in an interior cell.
        let fwd = gamma_cube(9);
        let inv = InvLut3dOp::from_forward(&fwd).unwrap();
        for &x in &[[0.05f32, 0.05, 0.05], [0.1, 0.02, 0.08], [0.1, 0.1, 0.1]] {
            let back = inv.eval_rgb(fwd.eval_rgb(x));
            for c in 0..3 {
                assert_abs_diff_eq!(back[c], x[c], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn crosstalk_cube_round_trips() {
        // A mild saturation-style mix so channels interact.
        let n = 9;
        let mut fwd = Lut3dOp::identity(BitDepth::F32, BitDepth::F32, n);
        for r in 0..n {
            for g in 0..n {
                for b in 0..n {
                    let v = fwd.rgb_at(r, g, b);
                    let luma = 0.3 * v[0] + 0.6 * v[1] + 0.1 * v[2];
                    let mix = |x: f32| 0.8 * x + 0.2 * luma;
                    fwd.set_rgb_at(r, g, b, [mix(v[0]), mix(v[1]), mix(v[2])]);
                }
            }
        }
        fwd.set_interpolation(Interpolation::Tetrahedral);
        let inv = InvLut3dOp::from_forward(&fwd).unwrap();
        for &x in &[[0.1f32, 0.7, 0.3], [0.5, 0.5, 0.5], [0.95, 0.05, 0.6]] {
            let y = fwd.eval_rgb(x);
            let back = inv.eval_rgb(y);
            for c in 0..3 {
                assert_abs_diff_eq!(back[c], x[c], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn values_outside_range_clamp_to_cube() {
        // Forward gain of 0.8: outputs only reach 0.8.
        let n = 5;
        let mut fwd = Lut3dOp::identity(BitDepth::F32, BitDepth::F32, n);
        for r in 0..n {
            for g in 0..n {
                for b in 0..n {
                    let v = fwd.rgb_at(r, g, b);
                    fwd.set_rgb_at(r, g, b, [v[0] * 0.8, v[1] * 0.8, v[2] * 0.8]);
                }
            }
        }
        let inv = InvLut3dOp::from_forward(&fwd).unwrap();
        let back = inv.eval_rgb([0.4, 0.4, 0.4]);
        assert_abs_diff_eq!(back[0], 0.5, epsilon = 1e-4);
        // Far above anything the cube can produce.
        let back = inv.eval_rgb([2.0, 2.0, 2.0]);
        for c in 0..3 {
            assert_abs_diff_eq!(back[c], 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn nan_inputs_resolve_to_range_floor() {
        let inv = InvLut3dOp::from_forward(&gamma_cube(5)).unwrap();
        let out = inv.eval_rgb([f32::NAN, 0.25, f32::NAN]);
        assert!(out.iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(out[1], 0.5, epsilon = 1e-4);
    }

    #[test]
    fn fast_lut_approximates_exact() {
        let inv = InvLut3dOp::from_forward(&gamma_cube(9)).unwrap();
        let fast = inv.make_fast_lut3d(17).unwrap();
        assert_eq!(fast.grid_size(), 17);
        assert_eq!(fast.interpolation(), Interpolation::Tetrahedral);
        for &y in &[[0.25f32, 0.36, 0.64], [0.5, 0.5, 0.5], [0.81, 0.36, 0.49]] {
            let exact = inv.eval_rgb(y);
            let approx = fast.eval_rgb(y);
            for c in 0..3 {
                assert_abs_diff_eq!(exact[c], approx[c], epsilon = 5e-3);
            }
        }
    }

    #[test]
    fn fast_lut_rejects_oversized_grids() {
        let inv = InvLut3dOp::from_forward(&gamma_cube(5)).unwrap();
        assert!(inv.make_fast_lut3d(200).is_err());
    }

    #[test]
    fn input_depth_change_rescales_cube() {
        let n = 5;
        let mut fwd = Lut3dOp::identity(BitDepth::F32, BitDepth::F32, n);
        for r in 0..n {
            for g in 0..n {
                for b in 0..n {
                    let v = fwd.rgb_at(r, g, b);
                    fwd.set_rgb_at(r, g, b, [v[0] * 0.5, v[1] * 0.5, v[2] * 0.5]);
                }
            }
        }
        let mut inv = InvLut3dOp::from_forward(&fwd).unwrap();
        inv.set_input_bit_depth(BitDepth::U10);
        let back = inv.eval_rgb([511.5, 511.5, 511.5]);
        for c in 0..3 {
            assert_abs_diff_eq!(back[c], 1.0, epsilon = 1e-3);
        }
    }
}

//! Dense row-major storage for LUT tables.
//!
//! Every entry occupies a fixed stride of [`Array::MAX_COMPONENTS`] floats
//! regardless of how many components are active, so renderers can index
//! rows without per-channel layout branching. A 1D table holds `length`
//! entries, a 3D table `length^3` entries in blue-fastest order.

use crate::error::{Error, Result};

/// Whether an [`Array`] stores a 1D table or a 3D cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayLayout {
    /// `length` entries.
    Table,
    /// `length^3` entries, blue channel varying fastest.
    Cube,
}

impl ArrayLayout {
    /// Number of entries implied by an edge `length`.
    #[inline]
    pub fn entries(self, length: usize) -> usize {
        match self {
            Self::Table => length,
            Self::Cube => length * length * length,
        }
    }
}

/// Dense numeric container owned by exactly one op.
///
/// Equality is bitwise on the stored values so that tables containing NaN
/// (legal in half-domain LUTs) still compare equal to their clones.
#[derive(Debug, Clone)]
pub struct Array {
    length: usize,
    num_components: usize,
    layout: ArrayLayout,
    values: Vec<f32>,
}

impl Array {
    /// RGBA storage stride per entry.
    pub const MAX_COMPONENTS: usize = 4;

    /// Creates a zero-initialized array.
    ///
    /// `length` is the entry count for tables, the edge length for cubes.
    /// `num_components` is the number of active color components (1..=4).
    pub fn new(layout: ArrayLayout, length: usize, num_components: usize) -> Self {
        debug_assert!((1..=Self::MAX_COMPONENTS).contains(&num_components));
        Self {
            length,
            num_components,
            layout,
            values: vec![0.0; layout.entries(length) * Self::MAX_COMPONENTS],
        }
    }

    /// Entry count for tables, edge length for cubes.
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of active color components (1 or 3 for LUTs).
    #[inline]
    pub fn num_components(&self) -> usize {
        self.num_components
    }

    /// Layout tag.
    #[inline]
    pub fn layout(&self) -> ArrayLayout {
        self.layout
    }

    /// Total number of entries (rows).
    #[inline]
    pub fn entries(&self) -> usize {
        self.layout.entries(self.length)
    }

    /// Raw storage, stride [`Array::MAX_COMPONENTS`] per entry.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Mutable raw storage.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Reallocates to new dimensions, zero-initializing the contents.
    pub fn resize(&mut self, length: usize, num_components: usize) {
        debug_assert!((1..=Self::MAX_COMPONENTS).contains(&num_components));
        self.length = length;
        self.num_components = num_components;
        self.values.clear();
        self.values
            .resize(self.layout.entries(length) * Self::MAX_COMPONENTS, 0.0);
    }

    /// Checked read of `component` within `entry`.
    pub fn get(&self, entry: usize, component: usize) -> Option<f32> {
        if entry >= self.entries() || component >= Self::MAX_COMPONENTS {
            return None;
        }
        Some(self.values[entry * Self::MAX_COMPONENTS + component])
    }

    /// Checked write of `component` within `entry`.
    pub fn set(&mut self, entry: usize, component: usize, value: f32) -> Result<()> {
        if entry >= self.entries() || component >= Self::MAX_COMPONENTS {
            return Err(Error::validation(format!(
                "array access ({entry}, {component}) out of bounds for {} entries",
                self.entries()
            )));
        }
        self.values[entry * Self::MAX_COMPONENTS + component] = value;
        Ok(())
    }

    /// Multiplies every stored value by `factor` (no-op for 1.0).
    pub fn scale(&mut self, factor: f32) {
        if factor != 1.0 {
            for v in &mut self.values {
                *v *= factor;
            }
        }
    }

    /// Enforces the storage invariant
    /// `values.len() == entries(length) * MAX_COMPONENTS`.
    pub fn validate(&self) -> Result<()> {
        let expected = self.entries() * Self::MAX_COMPONENTS;
        if self.values.len() != expected {
            return Err(Error::malformed_array(expected, self.values.len()));
        }
        if self.num_components == 0 || self.num_components > Self::MAX_COMPONENTS {
            return Err(Error::validation(format!(
                "array declares {} color components, must be 1..={}",
                self.num_components,
                Self::MAX_COMPONENTS
            )));
        }
        Ok(())
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length
            && self.num_components == other.num_components
            && self.layout == other.layout
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

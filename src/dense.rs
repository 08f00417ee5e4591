/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Dense N-dimensional tables and the dense scaling pass.
//!
//! A [`DenseTable`] is a row-major `f64` array with an explicit shape. A
//! constraint over axes `[a₀, a₁, …]` carries a target table of shape
//! `[shape[a₀], shape[a₁], …]`; entry `t[c₀, c₁, …]` is the desired sum of the
//! slice that fixes axis `aⱼ` to `cⱼ`.
//!
//! # Scaling rule
//!
//! For each constraint in order, with `m` the slice sum over the current
//! buffer and `x` the target:
//!
//! ```text
//! m == 0  →  slice copied unchanged (it is all zeros)
//! m  > 0  →  slice × x / m
//! ```
//!
//! Zero slices therefore stay exactly zero for the whole fit.

use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;

use log::trace;

use crate::adjust::{Adjuster, BufferArena};
use crate::aggregate::slice_sum;
use crate::convergence::max_deviation;
use crate::error::{is_valid_weight, ConfigurationError};
use crate::index::{flat_position, index_axis_elem, CoordinateProduct, SliceIndex};

// ─── DenseTable ─────────────────────────────────────────────────────────────

/// Row-major N-dimensional array of nonnegative weights.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DenseTable {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl DenseTable {
    /// Array of `shape` holding `data` in row-major order.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, ConfigurationError> {
        let table = Self { shape, data };
        table.check_len()?;
        Ok(table)
    }

    /// All-zero array of `shape`.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self { shape, data: vec![0.0; len] }
    }

    /// One-dimensional array.
    pub fn from_vec(data: Vec<f64>) -> Self {
        Self { shape: vec![data.len()], data }
    }

    /// Zero-dimensional array holding one value (target of an empty axis set).
    pub fn scalar(value: f64) -> Self {
        Self { shape: Vec::new(), data: vec![value] }
    }

    /// Two-dimensional array from equally long rows.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, ConfigurationError> {
        let ncols = rows.first().map_or(0, |r| r.as_ref().len());
        let data: Vec<f64> = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        Self::new(vec![rows.len(), ncols], data)
    }

    /// Extent of every axis.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Row-major values.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Consume the table, returning its row-major values.
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if the table has no cells.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `coords`, or `None` if out of bounds.
    pub fn get(&self, coords: &[usize]) -> Option<f64> {
        if coords.len() != self.shape.len() || coords.iter().zip(&self.shape).any(|(&c, &n)| c >= n) {
            return None;
        }
        self.data.get(flat_position(&self.shape, coords)).copied()
    }

    /// Sum of every cell.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Sum of the slice fixing `axes[j]` to `elems[j]`.
    ///
    /// # Panics
    ///
    /// If an axis is not below [`ndim`](Self::ndim) or an element is outside
    /// its axis extent. Use [`get`](Self::get) for a checked single-cell read.
    pub fn slice_sum(&self, axes: &[usize], elems: &[usize]) -> f64 {
        slice_sum(&self.data, &self.shape, &index_axis_elem(self.ndim(), axes, elems))
    }

    /// Slice sums over the whole domain of `axes`, shaped by their extents.
    ///
    /// # Panics
    ///
    /// If an axis is not below [`ndim`](Self::ndim).
    pub fn marginal(&self, axes: &[usize]) -> DenseTable {
        let extents: Vec<usize> = axes.iter().map(|&a| self.shape[a]).collect();
        let data = CoordinateProduct::new(extents.clone())
            .map(|combo| self.slice_sum(axes, &combo))
            .collect();
        Self { shape: extents, data }
    }

    /// Check data length and weight validity.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.check_len()?;
        match self.data.iter().position(|&w| !is_valid_weight(w)) {
            Some(position) => Err(ConfigurationError::InvalidWeight {
                position,
                value: self.data[position],
            }),
            None => Ok(()),
        }
    }

    fn check_len(&self) -> Result<(), ConfigurationError> {
        let expected: usize = self.shape.iter().product();
        if expected != self.data.len() {
            return Err(ConfigurationError::DataLengthMismatch {
                shape: self.shape.clone(),
                expected,
                found: self.data.len(),
            });
        }
        Ok(())
    }
}

// ─── DenseAdjuster ──────────────────────────────────────────────────────────

/// One coordinate combination of a constraint: its slice and target.
#[derive(Clone, Debug)]
struct DenseSlice {
    index: SliceIndex,
    target: f64,
}

/// Scaling pass over a [`DenseTable`] of a fixed shape.
#[derive(Clone, Debug)]
pub struct DenseAdjuster {
    shape: Vec<usize>,
    /// Per constraint, every slice of its domain in row-major order.
    steps: Vec<Vec<DenseSlice>>,
}

impl DenseAdjuster {
    /// Validate `aggregates` against the domains `dimensions` induce on `shape`.
    pub fn new(
        shape: &[usize],
        aggregates: Vec<DenseTable>,
        dimensions: Vec<Vec<usize>>,
    ) -> Result<Self, ConfigurationError> {
        if aggregates.len() != dimensions.len() {
            return Err(ConfigurationError::ConstraintCountMismatch {
                aggregates: aggregates.len(),
                dimensions: dimensions.len(),
            });
        }

        let dims = shape.len();
        let mut steps = Vec::with_capacity(dimensions.len());
        for (group, (target, axes)) in aggregates.into_iter().zip(dimensions).enumerate() {
            for (j, &axis) in axes.iter().enumerate() {
                if axis >= dims {
                    return Err(ConfigurationError::AxisOutOfRange { group, axis, dims });
                }
                if axes[..j].contains(&axis) {
                    return Err(ConfigurationError::RepeatedDimension {
                        group,
                        dimension: axis.to_string(),
                    });
                }
            }

            let extents: Vec<usize> = axes.iter().map(|&a| shape[a]).collect();
            if target.shape() != extents.as_slice() || target.check_len().is_err() {
                return Err(ConfigurationError::TargetShapeMismatch {
                    group,
                    expected: extents,
                    found: target.shape().to_vec(),
                });
            }
            if let Some(&value) = target.data().iter().find(|&&v| !is_valid_weight(v)) {
                return Err(ConfigurationError::InvalidTarget { group, value });
            }

            // Targets are row-major over the same extents the product walks.
            let slices = CoordinateProduct::new(extents)
                .zip(target.data().iter().copied())
                .map(|(combo, value)| DenseSlice {
                    index: index_axis_elem(dims, &axes, &combo),
                    target: value,
                })
                .collect();
            steps.push(slices);
        }

        Ok(Self { shape: shape.to_vec(), steps })
    }

    /// Shape of the tables this adjuster scales.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of constraints.
    pub fn steps(&self) -> usize {
        self.steps.len()
    }

    fn scale_step(&self, slices: &[DenseSlice], current: &[f64], update: &mut [f64]) {
        for slice in slices {
            let achieved = slice_sum(current, &self.shape, &slice.index);
            if achieved == 0.0 {
                for off in slice.index.offsets(&self.shape) {
                    update[off] = current[off];
                }
            } else {
                for off in slice.index.offsets(&self.shape) {
                    update[off] = current[off] * slice.target / achieved;
                }
            }
        }
    }
}

impl Adjuster for DenseAdjuster {
    type Table = DenseTable;

    fn adjust(&self, table: DenseTable) -> (DenseTable, f64) {
        debug_assert_eq!(table.shape(), self.shape.as_slice());
        let mut arena = BufferArena::new(table.into_data());
        for (k, slices) in self.steps.iter().enumerate() {
            let (current, update) = arena.split();
            self.scale_step(slices, current, update);
            arena.swap();
            trace!("dense step {k}: {} slices rescaled", slices.len());
        }
        let table = DenseTable { shape: self.shape.clone(), data: arena.into_current() };
        let conv = self.deviation(&table);
        (table, conv)
    }

    fn deviation(&self, table: &DenseTable) -> f64 {
        max_deviation(
            self.steps
                .iter()
                .flatten()
                .map(|s| (slice_sum(table.data(), &self.shape, &s.index), s.target)),
        )
    }
}

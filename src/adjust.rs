/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! The common adjuster interface and the two table representations.
//!
//! # Representations
//!
//! | Variant | Table | Aggregate | Dimension set |
//! |---------|-------|-----------|---------------|
//! | dense | [`DenseTable`] | [`DenseTable`] over the set's axes | axis indices |
//! | tabular | [`RowTable`] | [`GroupTargets`] | column names |
//!
//! The controller inspects [`Table`] once and binds the matching
//! [`Adjuster`] for the whole run.
//!
//! # Double buffering
//!
//! Constraints within a pass are applied in sequence, each reading the output
//! of the previous one. [`BufferArena`] holds two weight buffers: step `k`
//! reads the active one, writes the other, then the active index flips.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::dense::DenseTable;
use crate::tabular::{GroupTargets, RowTable};

// ─── Adjuster ───────────────────────────────────────────────────────────────

/// One full scaling pass plus the convergence measurement that follows it.
///
/// Aggregates and dimension sets are bound at construction, so a pass only
/// needs the table.
pub trait Adjuster {
    /// Table representation this adjuster scales.
    type Table;

    /// Apply every constraint once, in order, and return the rescaled table
    /// with its worst relative marginal deviation.
    fn adjust(&self, table: Self::Table) -> (Self::Table, f64);

    /// Worst relative marginal deviation of `table` against the bound targets.
    fn deviation(&self, table: &Self::Table) -> f64;
}

// ─── BufferArena ────────────────────────────────────────────────────────────

/// Two weight buffers with an active index.
#[derive(Clone, Debug)]
pub struct BufferArena {
    buffers: [Vec<f64>; 2],
    active: usize,
}

impl BufferArena {
    /// Arena whose active buffer is `initial`; the scratch buffer is zeroed.
    pub fn new(initial: Vec<f64>) -> Self {
        let scratch = vec![0.0; initial.len()];
        Self { buffers: [initial, scratch], active: 0 }
    }

    /// The buffer the next step reads.
    pub fn current(&self) -> &[f64] {
        &self.buffers[self.active]
    }

    /// `(current, update)`: read the active buffer, write the other.
    pub fn split(&mut self) -> (&[f64], &mut [f64]) {
        let [first, second] = &mut self.buffers;
        if self.active == 0 {
            (first.as_slice(), second.as_mut_slice())
        } else {
            (second.as_slice(), first.as_mut_slice())
        }
    }

    /// Make the buffer just written the active one.
    pub fn swap(&mut self) {
        self.active ^= 1;
    }

    /// Consume the arena, keeping the active buffer.
    pub fn into_current(self) -> Vec<f64> {
        let [first, second] = self.buffers;
        if self.active == 0 { first } else { second }
    }
}

// ─── Table / Aggregate / DimensionSet ───────────────────────────────────────

/// A table in either representation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Table {
    /// Dense N-dimensional array.
    Dense(DenseTable),
    /// Weighted rows keyed by dimension columns.
    Rows(RowTable),
}

impl Table {
    /// `"dense"` or `"tabular"`.
    pub fn representation(&self) -> &'static str {
        match self {
            Table::Dense(_) => DENSE,
            Table::Rows(_) => TABULAR,
        }
    }

    /// The dense array, if this is one.
    pub fn as_dense(&self) -> Option<&DenseTable> {
        match self {
            Table::Dense(t) => Some(t),
            Table::Rows(_) => None,
        }
    }

    /// The row table, if this is one.
    pub fn as_rows(&self) -> Option<&RowTable> {
        match self {
            Table::Rows(t) => Some(t),
            Table::Dense(_) => None,
        }
    }

    /// Unwrap the dense array.
    pub fn into_dense(self) -> Option<DenseTable> {
        match self {
            Table::Dense(t) => Some(t),
            Table::Rows(_) => None,
        }
    }

    /// Unwrap the row table.
    pub fn into_rows(self) -> Option<RowTable> {
        match self {
            Table::Rows(t) => Some(t),
            Table::Dense(_) => None,
        }
    }

    /// Weights in storage order: row-major cells or rows.
    pub fn weights(&self) -> &[f64] {
        match self {
            Table::Dense(t) => t.data(),
            Table::Rows(t) => t.weights(),
        }
    }
}

impl From<DenseTable> for Table {
    fn from(t: DenseTable) -> Self {
        Table::Dense(t)
    }
}

impl From<RowTable> for Table {
    fn from(t: RowTable) -> Self {
        Table::Rows(t)
    }
}

/// Target marginal for one dimension set.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Aggregate {
    /// Dense array shaped like the extents of the set's axes.
    Dense(DenseTable),
    /// Target per column-value combination.
    Groups(GroupTargets),
}

impl From<DenseTable> for Aggregate {
    fn from(t: DenseTable) -> Self {
        Aggregate::Dense(t)
    }
}

impl From<GroupTargets> for Aggregate {
    fn from(t: GroupTargets) -> Self {
        Aggregate::Groups(t)
    }
}

/// Dimensions preserved by one constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DimensionSet {
    /// Axis indices of a dense table.
    Axes(Vec<usize>),
    /// Column names of a row table.
    Columns(Vec<String>),
}

impl DimensionSet {
    /// Dimension set over dense axes.
    pub fn axes(axes: impl IntoIterator<Item = usize>) -> Self {
        DimensionSet::Axes(axes.into_iter().collect())
    }

    /// Dimension set over named columns.
    pub fn columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        DimensionSet::Columns(columns.into_iter().map(Into::into).collect())
    }
}

pub(crate) const DENSE: &str = "dense";
pub(crate) const TABULAR: &str = "tabular";

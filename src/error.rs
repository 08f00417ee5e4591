/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Configuration errors raised before any fitting pass runs.
//!
//! Everything that can go wrong with an IPF run is detected at the
//! [`Ipfn`](crate::iteration::Ipfn) construction boundary. Once a run is
//! underway it always ends in a terminal [`FitState`](crate::iteration::FitState)
//! and yields a usable table; running out of iterations is reported through
//! that state, not through an error.

use alloc::string::String;
use alloc::vec::Vec;

use thiserror::Error;

/// Invalid input detected while validating an IPF problem.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// An aggregate or dimension set does not use the table's representation.
    #[error("{what} {index} is not a {expected} constraint")]
    UnrecognizedRepresentation {
        /// `"aggregate"` or `"dimension set"`.
        what: &'static str,
        /// Position in the constraint list.
        index: usize,
        /// Representation the table uses (`"dense"` or `"tabular"`).
        expected: &'static str,
    },

    /// `verbose` outside `{0, 1, 2}`.
    #[error("verbose must be 0, 1 or 2, got {0}")]
    InvalidVerbosity(u8),

    /// `convergence_rate` or `rate_tolerance` is negative, infinite or NaN.
    #[error("{field} must be a finite nonnegative number, got {value}")]
    InvalidRate {
        /// `"convergence_rate"` or `"rate_tolerance"`.
        field: &'static str,
        /// Offending value.
        value: f64,
    },

    /// `aggregates` and `dimensions` have different lengths.
    #[error("{aggregates} aggregates given for {dimensions} dimension sets")]
    ConstraintCountMismatch {
        /// Number of aggregate targets.
        aggregates: usize,
        /// Number of dimension sets.
        dimensions: usize,
    },

    /// Dense data length does not equal the product of the shape.
    #[error("shape {shape:?} needs {expected} values, got {found}")]
    DataLengthMismatch {
        /// Declared shape.
        shape: Vec<usize>,
        /// Product of the shape.
        expected: usize,
        /// Number of values supplied.
        found: usize,
    },

    /// Axis identifier not in `0..dims`.
    #[error("dimension set {group}: axis {axis} out of range for {dims}-dimensional table")]
    AxisOutOfRange {
        /// Dimension set index.
        group: usize,
        /// Offending axis.
        axis: usize,
        /// Table dimensionality.
        dims: usize,
    },

    /// The same axis or column listed twice within one dimension set.
    #[error("dimension set {group}: dimension {dimension} listed more than once")]
    RepeatedDimension {
        /// Dimension set index.
        group: usize,
        /// Offending axis or column, rendered.
        dimension: String,
    },

    /// Column name not present in the row table.
    #[error("dimension set {group}: unknown column {column:?}")]
    UnknownColumn {
        /// Dimension set index.
        group: usize,
        /// Offending column name.
        column: String,
    },

    /// Configured weight column differs from the table's, or is used as a dimension.
    #[error("weight column {configured:?} does not match table weight column {table:?}")]
    WeightColumnMismatch {
        /// `IpfConfig::weight_col`.
        configured: String,
        /// Weight column of the row table.
        table: String,
    },

    /// A row has a different number of coordinates than the table has columns.
    #[error("row {row} has {found} coordinates, table has {expected} columns")]
    RowArityMismatch {
        /// Row index.
        row: usize,
        /// Number of dimension columns.
        expected: usize,
        /// Number of coordinates on the row.
        found: usize,
    },

    /// Dense target shape does not match the extents of its axes.
    #[error("aggregate {group}: target shape {found:?}, expected {expected:?}")]
    TargetShapeMismatch {
        /// Dimension set index.
        group: usize,
        /// Extents of the dimension set's axes.
        expected: Vec<usize>,
        /// Shape of the supplied target.
        found: Vec<usize>,
    },

    /// A coordinate combination of the domain has no target.
    #[error("aggregate {group}: no target for combination {key}")]
    MissingTarget {
        /// Dimension set index.
        group: usize,
        /// Combination, rendered.
        key: String,
    },

    /// A target key is outside the domain induced on the table.
    #[error("aggregate {group}: combination {key} does not occur in the table")]
    UnexpectedTarget {
        /// Dimension set index.
        group: usize,
        /// Combination, rendered.
        key: String,
    },

    /// The same target key appears twice.
    #[error("aggregate {group}: combination {key} has more than one target")]
    DuplicateTarget {
        /// Dimension set index.
        group: usize,
        /// Combination, rendered.
        key: String,
    },

    /// A table handed to a bound fit has a different shape or row identity.
    #[error("table does not match the {expected} table the fit was built for")]
    TableMismatch {
        /// Representation of the bound table.
        expected: &'static str,
    },

    /// Negative, infinite or NaN weight in the input table.
    #[error("weight {value} at position {position} is not a finite nonnegative number")]
    InvalidWeight {
        /// Flat offset (dense) or row index (tabular).
        position: usize,
        /// Offending value.
        value: f64,
    },

    /// Negative, infinite or NaN target value.
    #[error("aggregate {group}: target {value} is not a finite nonnegative number")]
    InvalidTarget {
        /// Dimension set index.
        group: usize,
        /// Offending value.
        value: f64,
    },
}

/// A weight or target must be finite and nonnegative.
pub(crate) fn is_valid_weight(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

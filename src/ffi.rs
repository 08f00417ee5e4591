//! Python FFI bindings via PyO3.
//!
//! Exposes both fitting modes as plain functions taking lists.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from ipf_core import ipfn_dense, ipfn_rows
//!
//! # 3×4 seed, row-major
//! m = [8, 4, 6, 7, 3, 6, 5, 2, 9, 11, 3, 1]
//! fitted, converged = ipfn_dense(m, [3, 4], [[20, 18, 22], [18, 16, 12, 14]], [[0], [1]], verbose=1)
//!
//! fitted = ipfn_rows(
//!     ["dma", "size"],
//!     [[501, 1], [501, 2], [502, 1], [502, 2]],
//!     [1.0, 2.0, 3.0, 4.0],
//!     [[([501], 4.0), ([502], 6.0)], [([1], 5.0), ([2], 5.0)]],
//!     [["dma"], ["size"]],
//! )
//! ```
//!
//! Dense targets are flat row-major lists over the extents of their axes, in
//! the order the axes are listed. Results come back flat as well.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::{IpfConfig, Verbosity};
use crate::dense::DenseTable;
use crate::error::ConfigurationError;
use crate::iteration::{FitReport, Ipfn};
use crate::tabular::{Coord, GroupTargets, RowTable};

fn config_error(e: ConfigurationError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

// ── Coordinates ──────────────────────────────────────────────────────────────

/// A Python `int` or `str` coordinate.
pub struct PyCoord(pub Coord);

impl<'py> FromPyObject<'py> for PyCoord {
    fn extract_bound(ob: &Bound<'py, PyAny>) -> PyResult<Self> {
        if let Ok(v) = ob.extract::<i64>() {
            return Ok(PyCoord(Coord::Int(v)));
        }
        ob.extract::<String>()
            .map(|s| PyCoord(Coord::Text(s)))
            .map_err(|_| PyValueError::new_err("coordinates must be int or str"))
    }
}

fn coords(values: Vec<PyCoord>) -> Vec<Coord> {
    values.into_iter().map(|c| c.0).collect()
}

// ── Output ───────────────────────────────────────────────────────────────────

/// `weights`, `(weights, converged)` or `(weights, converged, [(iteration, conv)])`.
fn shape_output(py: Python<'_>, report: FitReport, verbosity: Verbosity) -> PyObject {
    let converged = report.converged();
    let weights = report.table.weights().to_vec();
    match verbosity {
        Verbosity::Table => weights.into_py(py),
        Verbosity::Flag => (weights, converged).into_py(py),
        Verbosity::History => {
            let history: Vec<(usize, f64)> =
                report.history.iter().map(|r| (r.iteration, r.conv)).collect();
            (weights, converged, history).into_py(py)
        }
    }
}

// ── Dense ────────────────────────────────────────────────────────────────────

/// Target array for `axes`, shaped by their extents in `shape`.
///
/// Out-of-range axes fall back to a flat shape so that the fit reports the
/// bad axis rather than a length mismatch.
fn dense_target(shape: &[usize], axes: &[usize], values: Vec<f64>) -> Result<DenseTable, ConfigurationError> {
    match axes.iter().map(|&a| shape.get(a).copied()).collect::<Option<Vec<usize>>>() {
        Some(extents) => DenseTable::new(extents, values),
        None => Ok(DenseTable::from_vec(values)),
    }
}

/// Fit a dense array.
///
/// Args:
///     data: seed weights, row-major
///     shape: extent of every axis
///     aggregates: one flat row-major target list per dimension set
///     dimensions: axis lists, one per aggregate
///     convergence_rate: stop once every margin is this close (default 0.01)
///     max_iteration: pass budget (default 500)
///     rate_tolerance: stop once the deviation stops moving (default 1e-8)
///     verbose: 0, 1 or 2 (default 0)
#[pyfunction]
#[pyo3(signature = (data, shape, aggregates, dimensions, convergence_rate=0.01, max_iteration=500, rate_tolerance=1e-8, verbose=0))]
#[allow(clippy::too_many_arguments)]
pub fn ipfn_dense(
    py: Python<'_>,
    data: Vec<f64>,
    shape: Vec<usize>,
    aggregates: Vec<Vec<f64>>,
    dimensions: Vec<Vec<usize>>,
    convergence_rate: f64,
    max_iteration: usize,
    rate_tolerance: f64,
    verbose: u8,
) -> PyResult<PyObject> {
    let config = IpfConfig::default()
        .with_convergence_rate(convergence_rate)
        .with_max_iteration(max_iteration)
        .with_rate_tolerance(rate_tolerance)
        .with_verbose(verbose);
    if aggregates.len() != dimensions.len() {
        return Err(config_error(ConfigurationError::ConstraintCountMismatch {
            aggregates: aggregates.len(),
            dimensions: dimensions.len(),
        }));
    }
    let table = DenseTable::new(shape, data).map_err(config_error)?;
    let targets = aggregates
        .into_iter()
        .zip(&dimensions)
        .map(|(values, axes)| dense_target(table.shape(), axes, values))
        .collect::<Result<Vec<_>, _>>()
        .map_err(config_error)?;
    let ipfn = Ipfn::dense(table, targets, dimensions, config).map_err(config_error)?;
    Ok(shape_output(py, ipfn.run(), ipfn.verbosity()))
}

// ── Rows ─────────────────────────────────────────────────────────────────────

/// Fit a weighted row table.
///
/// Args:
///     columns: dimension column names
///     rows: one list of int/str coordinates per row
///     weights: one weight per row
///     aggregates: per dimension set, a list of `(key, target)` pairs where
///         `key` lists coordinates in the set's column order
///     dimensions: column-name lists, one per aggregate
///     weight_col: name of the weight column (default "total")
///     convergence_rate, max_iteration, rate_tolerance, verbose: as for `ipfn_dense`
#[pyfunction]
#[pyo3(signature = (columns, rows, weights, aggregates, dimensions, weight_col="total", convergence_rate=0.01, max_iteration=500, rate_tolerance=1e-8, verbose=0))]
#[allow(clippy::too_many_arguments)]
pub fn ipfn_rows(
    py: Python<'_>,
    columns: Vec<String>,
    rows: Vec<Vec<PyCoord>>,
    weights: Vec<f64>,
    aggregates: Vec<Vec<(Vec<PyCoord>, f64)>>,
    dimensions: Vec<Vec<String>>,
    weight_col: &str,
    convergence_rate: f64,
    max_iteration: usize,
    rate_tolerance: f64,
    verbose: u8,
) -> PyResult<PyObject> {
    if rows.len() != weights.len() {
        return Err(PyValueError::new_err(format!(
            "rows and weights must have the same length, got {} and {}",
            rows.len(),
            weights.len()
        )));
    }
    let config = IpfConfig::default()
        .with_weight_col(weight_col)
        .with_convergence_rate(convergence_rate)
        .with_max_iteration(max_iteration)
        .with_rate_tolerance(rate_tolerance)
        .with_verbose(verbose);

    let mut table = RowTable::new(columns).with_weight_col(weight_col);
    for (row, w) in rows.into_iter().zip(weights) {
        table.push_row(coords(row), w).map_err(config_error)?;
    }
    let targets: Vec<GroupTargets> = aggregates
        .into_iter()
        .map(|pairs| pairs.into_iter().map(|(key, v)| (coords(key), v)).collect())
        .collect();

    let ipfn = Ipfn::tabular(table, targets, dimensions, config).map_err(config_error)?;
    Ok(shape_output(py, ipfn.run(), ipfn.verbosity()))
}

// ── Module registration ───────────────────────────────────────────────────────

/// Register the `ipf_core` Python module.
#[pymodule]
pub fn ipf_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(ipfn_dense, m)?)?;
    m.add_function(wrap_pyfunction!(ipfn_rows, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("DEFAULT_WEIGHT_COL", crate::config::DEFAULT_WEIGHT_COL)?;
    Ok(())
}

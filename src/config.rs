/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Run configuration for the iteration controller.

use alloc::string::String;

use crate::error::{is_valid_weight, ConfigurationError};

/// Default weight column name for row tables.
pub const DEFAULT_WEIGHT_COL: &str = "total";

/// Configuration for an IPF run.
///
/// All fields are validated when an [`Ipfn`](crate::iteration::Ipfn) is built,
/// so an invalid value is reported before any pass executes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IpfConfig {
    /// Name of the weight column (row tables only). Default: `"total"`.
    pub weight_col: String,

    /// Stop as converged once the worst relative marginal deviation is at or
    /// below this value. Default: 0.01.
    ///
    /// With many aggregates it can help to loosen this.
    pub convergence_rate: f64,

    /// Maximum number of full passes. Default: 500.
    ///
    /// `0` runs no pass and returns the input table as `Exhausted`.
    pub max_iteration: usize,

    /// Stop as stagnant once two consecutive deviations differ by at most this
    /// value. Default: 1e-8.
    pub rate_tolerance: f64,

    /// Output shape selector, see [`Verbosity`]. Default: 0.
    pub verbose: u8,
}

impl Default for IpfConfig {
    fn default() -> Self {
        Self {
            weight_col: String::from(DEFAULT_WEIGHT_COL),
            convergence_rate: 0.01,
            max_iteration: 500,
            rate_tolerance: 1e-8,
            verbose: 0,
        }
    }
}

impl IpfConfig {
    /// Set the convergence threshold.
    pub fn with_convergence_rate(mut self, rate: f64) -> Self {
        self.convergence_rate = rate;
        self
    }

    /// Set the pass budget.
    pub fn with_max_iteration(mut self, max_iteration: usize) -> Self {
        self.max_iteration = max_iteration;
        self
    }

    /// Set the stagnation tolerance.
    pub fn with_rate_tolerance(mut self, tolerance: f64) -> Self {
        self.rate_tolerance = tolerance;
        self
    }

    /// Set the raw verbosity level.
    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the weight column name.
    pub fn with_weight_col(mut self, weight_col: impl Into<String>) -> Self {
        self.weight_col = weight_col.into();
        self
    }

    /// Parsed verbosity level.
    pub fn verbosity(&self) -> Result<Verbosity, ConfigurationError> {
        Verbosity::try_from(self.verbose)
    }

    /// Check the numeric thresholds and parse the verbosity level.
    ///
    /// The weight column is checked against the table by
    /// [`Ipfn::new`](crate::iteration::Ipfn::new).
    pub fn validate(&self) -> Result<Verbosity, ConfigurationError> {
        let rates = [
            ("convergence_rate", self.convergence_rate),
            ("rate_tolerance", self.rate_tolerance),
        ];
        if let Some(&(field, value)) = rates.iter().find(|(_, v)| !is_valid_weight(*v)) {
            return Err(ConfigurationError::InvalidRate { field, value });
        }
        self.verbosity()
    }
}

/// What [`Ipfn::iteration`](crate::iteration::Ipfn::iteration) returns.
///
/// Each level includes the outputs of the previous one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Verbosity {
    /// `0`: fitted table only.
    Table,
    /// `1`: fitted table and converged flag.
    Flag,
    /// `2`: fitted table, converged flag and per-iteration deviation history.
    History,
}

impl TryFrom<u8> for Verbosity {
    type Error = ConfigurationError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Self::Table),
            1 => Ok(Self::Flag),
            2 => Ok(Self::History),
            other => Err(ConfigurationError::InvalidVerbosity(other)),
        }
    }
}

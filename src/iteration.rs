/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Iteration controller: validation, representation dispatch and stopping rules.
//!
//! # State machine
//!
//! ```text
//!             ┌──────── pass ────────┐
//!             ▼                      │
//!  start ─▶ Running ──(conv ≤ rate)──┼──▶ Converged
//!             │                      │
//!             ├─(|conv − prev| ≤ tol)┼──▶ Stagnant
//!             │                      │
//!             └─(count ≥ budget)─────┴──▶ Exhausted
//! ```
//!
//! The three checks run after every pass in the order shown. `Converged` and
//! `Stagnant` are successful stops; `Exhausted` is a failure stop that still
//! returns the last table.
//!
//! All run state lives in a [`ConvergenceState`] created per call, so one
//! [`Ipfn`] can be run any number of times and always starts from its own
//! initial table.

use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, info, warn};

use crate::adjust::{Adjuster, Aggregate, DimensionSet, Table, DENSE, TABULAR};
use crate::config::{IpfConfig, Verbosity};
use crate::convergence::deviation_change;
use crate::dense::{DenseAdjuster, DenseTable};
use crate::error::ConfigurationError;
use crate::tabular::{GroupTargets, RowTable, TabularAdjuster};

// ─── FitState ───────────────────────────────────────────────────────────────

/// Where a fit stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FitState {
    /// More passes are needed.
    Running,
    /// Every marginal within `convergence_rate` of its target.
    Converged,
    /// Deviation stopped moving by more than `rate_tolerance`.
    Stagnant,
    /// Pass budget spent without converging or stagnating.
    Exhausted,
}

impl FitState {
    /// Converged flag as reported to callers: `false` only for `Exhausted`.
    pub fn converged(self) -> bool {
        !matches!(self, FitState::Exhausted)
    }

    /// `true` for every state except `Running`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, FitState::Running)
    }
}

/// Deviation measured after one pass.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IterationRecord {
    /// Zero-based pass number.
    pub iteration: usize,
    /// Worst relative marginal deviation after the pass.
    pub conv: f64,
}

// ─── ConvergenceState ───────────────────────────────────────────────────────

/// Per-run progress: pass count, last two deviations and the history.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvergenceState {
    iteration: usize,
    conv: f64,
    previous: f64,
    history: Vec<IterationRecord>,
}

impl Default for ConvergenceState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvergenceState {
    /// No passes yet: deviation `+∞`, previous `−∞`.
    pub fn new() -> Self {
        Self {
            iteration: 0,
            conv: f64::INFINITY,
            previous: f64::NEG_INFINITY,
            history: Vec::new(),
        }
    }

    /// Record the deviation measured after a pass.
    pub fn record(&mut self, conv: f64) {
        self.history.push(IterationRecord { iteration: self.iteration, conv });
        self.previous = self.conv;
        self.conv = conv;
        self.iteration += 1;
    }

    /// Apply the stopping rules in order.
    pub fn evaluate(&self, config: &IpfConfig) -> FitState {
        if self.conv <= config.convergence_rate {
            FitState::Converged
        } else if deviation_change(self.conv, self.previous) <= config.rate_tolerance {
            FitState::Stagnant
        } else if self.iteration >= config.max_iteration {
            FitState::Exhausted
        } else {
            FitState::Running
        }
    }

    /// Passes applied so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Latest deviation.
    pub fn conv(&self) -> f64 {
        self.conv
    }

    /// Deviation before the latest pass.
    pub fn previous(&self) -> f64 {
        self.previous
    }

    /// One record per pass.
    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }
}

// ─── FitReport / IpfOutput ──────────────────────────────────────────────────

/// Everything a run produced, independent of verbosity.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitReport {
    /// Fitted table.
    pub table: Table,
    /// Terminal state.
    pub state: FitState,
    /// Passes applied.
    pub iterations: usize,
    /// Worst relative marginal deviation of `table`.
    pub deviation: f64,
    /// Deviation after each pass.
    pub history: Vec<IterationRecord>,
}

impl FitReport {
    /// Converged flag: `false` only when the budget ran out.
    pub fn converged(&self) -> bool {
        self.state.converged()
    }

    /// Shape the report for a verbosity level.
    pub fn into_output(self, verbosity: Verbosity) -> IpfOutput {
        let converged = self.converged();
        match verbosity {
            Verbosity::Table => IpfOutput::Table(self.table),
            Verbosity::Flag => IpfOutput::Flagged { table: self.table, converged },
            Verbosity::History => IpfOutput::History {
                table: self.table,
                converged,
                history: self.history,
            },
        }
    }
}

/// Verbosity-shaped result of [`Ipfn::iteration`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IpfOutput {
    /// `verbose = 0`.
    Table(Table),
    /// `verbose = 1`.
    Flagged {
        /// Fitted table.
        table: Table,
        /// `false` when the pass budget ran out.
        converged: bool,
    },
    /// `verbose = 2`.
    History {
        /// Fitted table.
        table: Table,
        /// `false` when the pass budget ran out.
        converged: bool,
        /// Deviation after each pass.
        history: Vec<IterationRecord>,
    },
}

impl IpfOutput {
    /// Fitted table.
    pub fn table(&self) -> &Table {
        match self {
            IpfOutput::Table(table)
            | IpfOutput::Flagged { table, .. }
            | IpfOutput::History { table, .. } => table,
        }
    }

    /// Consume the output, keeping the table.
    pub fn into_table(self) -> Table {
        match self {
            IpfOutput::Table(table)
            | IpfOutput::Flagged { table, .. }
            | IpfOutput::History { table, .. } => table,
        }
    }

    /// Converged flag, when the verbosity level carries one.
    pub fn converged(&self) -> Option<bool> {
        match self {
            IpfOutput::Table(_) => None,
            IpfOutput::Flagged { converged, .. } | IpfOutput::History { converged, .. } => {
                Some(*converged)
            }
        }
    }

    /// Deviation history, when the verbosity level carries one.
    pub fn history(&self) -> Option<&[IterationRecord]> {
        match self {
            IpfOutput::History { history, .. } => Some(history),
            _ => None,
        }
    }
}

// ─── Ipfn ───────────────────────────────────────────────────────────────────

/// Table and adjuster bound at construction.
#[derive(Clone, Debug)]
enum Plan {
    Dense { table: DenseTable, adjuster: DenseAdjuster },
    Tabular { table: RowTable, adjuster: TabularAdjuster },
}

/// A validated IPF problem: initial table, constraints and configuration.
///
/// ```
/// use ipf_core::{DenseTable, IpfConfig, Ipfn};
///
/// let m = DenseTable::from_rows(&[[8., 4., 6., 7.], [3., 6., 5., 2.], [9., 11., 3., 1.]]).unwrap();
/// let ipfn = Ipfn::dense(
///     m,
///     vec![DenseTable::from_vec(vec![20., 18., 22.]), DenseTable::from_vec(vec![18., 16., 12., 14.])],
///     vec![vec![0], vec![1]],
///     IpfConfig::default(),
/// )
/// .unwrap();
/// let report = ipfn.run();
/// assert!(report.converged());
/// ```
#[derive(Clone, Debug)]
pub struct Ipfn {
    config: IpfConfig,
    verbosity: Verbosity,
    plan: Plan,
}

impl Ipfn {
    /// Validate a problem in either representation.
    ///
    /// Every aggregate and dimension set must use the table's representation.
    pub fn new(
        table: Table,
        aggregates: Vec<Aggregate>,
        dimensions: Vec<DimensionSet>,
        config: IpfConfig,
    ) -> Result<Self, ConfigurationError> {
        let verbosity = config.validate()?;
        if aggregates.len() != dimensions.len() {
            return Err(ConfigurationError::ConstraintCountMismatch {
                aggregates: aggregates.len(),
                dimensions: dimensions.len(),
            });
        }

        let plan = match table {
            Table::Dense(table) => {
                let aggregates = aggregates
                    .into_iter()
                    .enumerate()
                    .map(|(index, a)| match a {
                        Aggregate::Dense(t) => Ok(t),
                        Aggregate::Groups(_) => Err(mismatch("aggregate", index, DENSE)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let dimensions = dimensions
                    .into_iter()
                    .enumerate()
                    .map(|(index, d)| match d {
                        DimensionSet::Axes(axes) => Ok(axes),
                        DimensionSet::Columns(_) => Err(mismatch("dimension set", index, DENSE)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                table.validate()?;
                let adjuster = DenseAdjuster::new(table.shape(), aggregates, dimensions)?;
                Plan::Dense { table, adjuster }
            }
            Table::Rows(table) => {
                let aggregates = aggregates
                    .into_iter()
                    .enumerate()
                    .map(|(index, a)| match a {
                        Aggregate::Groups(t) => Ok(t),
                        Aggregate::Dense(_) => Err(mismatch("aggregate", index, TABULAR)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let dimensions = dimensions
                    .into_iter()
                    .enumerate()
                    .map(|(index, d)| match d {
                        DimensionSet::Columns(columns) => Ok(columns),
                        DimensionSet::Axes(_) => Err(mismatch("dimension set", index, TABULAR)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if config.weight_col != table.weight_col()
                    || table.column_index(&config.weight_col).is_some()
                {
                    return Err(ConfigurationError::WeightColumnMismatch {
                        configured: config.weight_col.clone(),
                        table: String::from(table.weight_col()),
                    });
                }
                table.validate()?;
                let adjuster = TabularAdjuster::new(&table, aggregates, dimensions)?;
                Plan::Tabular { table, adjuster }
            }
        };

        let constraints = match &plan {
            Plan::Dense { adjuster, .. } => adjuster.steps(),
            Plan::Tabular { adjuster, .. } => adjuster.steps(),
        };
        debug!(
            "ipfn bound: {} table, {constraints} constraints, rate {}, budget {}",
            plan_representation(&plan),
            config.convergence_rate,
            config.max_iteration,
        );
        Ok(Self { config, verbosity, plan })
    }

    /// Dense problem: axis lists and dense targets.
    pub fn dense(
        table: DenseTable,
        aggregates: Vec<DenseTable>,
        dimensions: Vec<Vec<usize>>,
        config: IpfConfig,
    ) -> Result<Self, ConfigurationError> {
        Self::new(
            table.into(),
            aggregates.into_iter().map(Aggregate::Dense).collect(),
            dimensions.into_iter().map(DimensionSet::Axes).collect(),
            config,
        )
    }

    /// Tabular problem: column-name lists and keyed targets.
    pub fn tabular<S: Into<String>>(
        table: RowTable,
        aggregates: Vec<GroupTargets>,
        dimensions: Vec<Vec<S>>,
        config: IpfConfig,
    ) -> Result<Self, ConfigurationError> {
        Self::new(
            table.into(),
            aggregates.into_iter().map(Aggregate::Groups).collect(),
            dimensions.into_iter().map(DimensionSet::columns).collect(),
            config,
        )
    }

    /// The validated configuration.
    pub fn config(&self) -> &IpfConfig {
        &self.config
    }

    /// Parsed verbosity level.
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// `"dense"` or `"tabular"`.
    pub fn representation(&self) -> &'static str {
        plan_representation(&self.plan)
    }

    /// Fit from the initial table until a terminal state.
    pub fn run(&self) -> FitReport {
        match &self.plan {
            Plan::Dense { table, adjuster } => drive(adjuster, table.clone(), &self.config).into_report(),
            Plan::Tabular { table, adjuster } => drive(adjuster, table.clone(), &self.config).into_report(),
        }
    }

    /// Fit and shape the result by the configured verbosity.
    pub fn iteration(&self) -> IpfOutput {
        self.run().into_output(self.verbosity)
    }

    /// Apply a single pass to `table`, which must match the bound table.
    pub fn step(&self, table: Table) -> Result<(Table, f64), ConfigurationError> {
        match (&self.plan, table) {
            (Plan::Dense { table: bound, adjuster }, Table::Dense(t)) => {
                if t.shape() != bound.shape() {
                    return Err(ConfigurationError::TableMismatch { expected: DENSE });
                }
                t.validate()?;
                let (t, conv) = adjuster.adjust(t);
                Ok((t.into(), conv))
            }
            (Plan::Tabular { table: bound, adjuster }, Table::Rows(t)) => {
                if !t.same_identity(bound) {
                    return Err(ConfigurationError::TableMismatch { expected: TABULAR });
                }
                t.validate()?;
                let (t, conv) = adjuster.adjust(t);
                Ok((t.into(), conv))
            }
            (plan, _) => Err(mismatch("table", 0, plan_representation(plan))),
        }
    }

    /// Worst relative marginal deviation of `table` against the bound targets.
    pub fn deviation(&self, table: &Table) -> Result<f64, ConfigurationError> {
        match (&self.plan, table) {
            (Plan::Dense { table: bound, adjuster }, Table::Dense(t)) if t.shape() == bound.shape() => {
                Ok(adjuster.deviation(t))
            }
            (Plan::Tabular { table: bound, adjuster }, Table::Rows(t)) if t.same_identity(bound) => {
                Ok(adjuster.deviation(t))
            }
            (Plan::Dense { .. }, Table::Dense(_)) | (Plan::Tabular { .. }, Table::Rows(_)) => {
                Err(ConfigurationError::TableMismatch { expected: self.representation() })
            }
            (plan, _) => Err(mismatch("table", 0, plan_representation(plan))),
        }
    }
}

fn plan_representation(plan: &Plan) -> &'static str {
    match plan {
        Plan::Dense { .. } => DENSE,
        Plan::Tabular { .. } => TABULAR,
    }
}

fn mismatch(what: &'static str, index: usize, expected: &'static str) -> ConfigurationError {
    ConfigurationError::UnrecognizedRepresentation { what, index, expected }
}

// ─── Driver ─────────────────────────────────────────────────────────────────

struct Fit<T> {
    table: T,
    state: FitState,
    deviation: f64,
    progress: ConvergenceState,
}

impl<T: Into<Table>> Fit<T> {
    fn into_report(self) -> FitReport {
        FitReport {
            table: self.table.into(),
            state: self.state,
            iterations: self.progress.iteration,
            deviation: self.deviation,
            history: self.progress.history,
        }
    }
}

fn drive<A: Adjuster>(adjuster: &A, mut table: A::Table, config: &IpfConfig) -> Fit<A::Table> {
    let mut progress = ConvergenceState::new();
    if config.max_iteration == 0 {
        let deviation = adjuster.deviation(&table);
        warn!("ipfn: max_iteration is 0, returning the input table (conv {deviation})");
        return Fit { table, state: FitState::Exhausted, deviation, progress };
    }

    let state = loop {
        let (next, conv) = adjuster.adjust(table);
        table = next;
        progress.record(conv);
        debug!("ipfn iteration {}: conv {conv}", progress.iteration - 1);
        let state = progress.evaluate(config);
        if state.is_terminal() {
            break state;
        }
    };

    match state {
        FitState::Converged => info!("ipfn converged after {} iterations (conv {})", progress.iteration, progress.conv),
        FitState::Stagnant => info!(
            "ipfn stopped after {} iterations: conv not updating ({} → {})",
            progress.iteration, progress.previous, progress.conv
        ),
        FitState::Exhausted => warn!(
            "ipfn did not converge within {} iterations (conv {})",
            config.max_iteration, progress.conv
        ),
        FitState::Running => {}
    }

    let deviation = progress.conv;
    Fit { table, state, deviation, progress }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::Coord;
    use alloc::vec;

    fn textbook() -> DenseTable {
        DenseTable::from_rows(&[[8., 4., 6., 7.], [3., 6., 5., 2.], [9., 11., 3., 1.]]).unwrap()
    }

    fn textbook_ipfn(config: IpfConfig) -> Result<Ipfn, ConfigurationError> {
        Ipfn::dense(
            textbook(),
            vec![
                DenseTable::from_vec(vec![20., 18., 22.]),
                DenseTable::from_vec(vec![18., 16., 12., 14.]),
            ],
            vec![vec![0], vec![1]],
            config,
        )
    }

    fn with_conv(convs: &[f64]) -> ConvergenceState {
        let mut s = ConvergenceState::new();
        for &c in convs {
            s.record(c);
        }
        s
    }

    #[test]
    fn test_initial_state_is_infinite_pair() {
        let s = ConvergenceState::new();
        assert_eq!(s.iteration(), 0);
        assert_eq!(s.conv(), f64::INFINITY);
        assert_eq!(s.previous(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_converged_is_checked_before_stagnant() {
        let config = IpfConfig::default();
        assert_eq!(with_conv(&[0.005, 0.005]).evaluate(&config), FitState::Converged);
    }

    #[test]
    fn test_stagnant_before_exhausted() {
        let config = IpfConfig::default().with_max_iteration(2);
        assert_eq!(with_conv(&[0.5, 0.5]).evaluate(&config), FitState::Stagnant);
        assert_eq!(with_conv(&[0.6, 0.5]).evaluate(&config), FitState::Exhausted);
        assert_eq!(with_conv(&[0.6]).evaluate(&config), FitState::Running);
    }

    #[test]
    fn test_first_pass_never_stagnant() {
        let config = IpfConfig::default().with_rate_tolerance(f64::MAX);
        assert_eq!(with_conv(&[0.5]).evaluate(&config), FitState::Running);
    }

    #[test]
    fn test_history_numbers_from_zero() {
        let s = with_conv(&[0.3, 0.2]);
        assert_eq!(
            s.history(),
            &[
                IterationRecord { iteration: 0, conv: 0.3 },
                IterationRecord { iteration: 1, conv: 0.2 },
            ]
        );
    }

    #[test]
    fn test_textbook_converges() {
        let report = textbook_ipfn(IpfConfig::default()).unwrap().run();
        assert_eq!(report.state, FitState::Converged);
        assert!(report.deviation <= 0.01, "deviation = {}", report.deviation);
        assert!(report.iterations < 50, "iterations = {}", report.iterations);
        assert_eq!(report.history.len(), report.iterations);
    }

    #[test]
    fn test_runs_restart_from_initial_table() {
        let ipfn = textbook_ipfn(IpfConfig::default()).unwrap();
        assert_eq!(ipfn.run(), ipfn.run());
    }

    #[test]
    fn test_zero_budget_returns_input_unchanged() {
        let report = textbook_ipfn(IpfConfig::default().with_max_iteration(0)).unwrap().run();
        assert_eq!(report.state, FitState::Exhausted);
        assert_eq!(report.iterations, 0);
        assert!(report.history.is_empty());
        assert_eq!(report.table, Table::Dense(textbook()));
        assert!(!report.converged());
    }

    #[test]
    fn test_single_pass_budget_is_exhausted() {
        let ipfn = textbook_ipfn(IpfConfig::default().with_max_iteration(1).with_verbose(2)).unwrap();
        let out = ipfn.iteration();
        assert_eq!(out.converged(), Some(false));
        assert_eq!(out.history().map(<[_]>::len), Some(1));
    }

    #[test]
    fn test_inconsistent_targets_stagnate() {
        // Row totals 20, column totals 10: each pass lands on the same table.
        let ipfn = Ipfn::dense(
            DenseTable::from_rows(&[[1., 1.], [1., 1.]]).unwrap(),
            vec![DenseTable::from_vec(vec![10., 10.]), DenseTable::from_vec(vec![5., 5.])],
            vec![vec![0], vec![1]],
            IpfConfig::default(),
        )
        .unwrap();
        let report = ipfn.run();
        assert_eq!(report.state, FitState::Stagnant);
        assert_eq!(report.iterations, 2);
        assert!(report.converged());
        assert!((report.deviation - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_output_shape_follows_verbosity() {
        let out = textbook_ipfn(IpfConfig::default()).unwrap().iteration();
        assert!(matches!(out, IpfOutput::Table(_)));
        assert_eq!(out.converged(), None);

        let out = textbook_ipfn(IpfConfig::default().with_verbose(1)).unwrap().iteration();
        assert_eq!(out.converged(), Some(true));
        assert!(out.history().is_none());
    }

    #[test]
    fn test_verbose_three_fails_before_any_pass() {
        let err = textbook_ipfn(IpfConfig::default().with_verbose(3)).unwrap_err();
        assert_eq!(err, ConfigurationError::InvalidVerbosity(3));
    }

    #[test]
    fn test_invalid_rates_fail_before_any_pass() {
        let config = IpfConfig::default().with_convergence_rate(f64::NAN).with_rate_tolerance(-1.0);
        let err = textbook_ipfn(config).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidRate { field: "convergence_rate", .. }));

        let err = textbook_ipfn(IpfConfig::default().with_rate_tolerance(f64::NAN)).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidRate { field: "rate_tolerance", .. }));
    }

    #[test]
    fn test_stagnant_result_is_idempotent() {
        let config = IpfConfig::default();
        let ipfn = Ipfn::dense(
            DenseTable::from_rows(&[[1., 2.], [3., 4.]]).unwrap(),
            vec![DenseTable::from_vec(vec![10., 10.]), DenseTable::from_vec(vec![5., 5.])],
            vec![vec![0], vec![1]],
            config.clone(),
        )
        .unwrap();
        let report = ipfn.run();
        assert_eq!(report.state, FitState::Stagnant);
        let (_, conv) = ipfn.step(report.table).unwrap();
        assert!(
            (conv - report.deviation).abs() <= config.rate_tolerance,
            "{conv} vs {}",
            report.deviation
        );
    }

    #[test]
    fn test_mixed_representations_are_rejected() {
        let err = Ipfn::new(
            textbook().into(),
            vec![GroupTargets::single([(1, 1.0)]).into()],
            vec![DimensionSet::axes([0])],
            IpfConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnrecognizedRepresentation { what: "aggregate", index: 0, expected: "dense" }
        );

        let rows = RowTable::new(["a"]).with_row(vec![Coord::Int(1)], 1.0).unwrap();
        let err = Ipfn::new(
            rows.into(),
            vec![GroupTargets::single([(1, 1.0)]).into()],
            vec![DimensionSet::axes([0])],
            IpfConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnrecognizedRepresentation {
                what: "dimension set",
                index: 0,
                expected: "tabular"
            }
        );
    }

    #[test]
    fn test_weight_column_must_match_table() {
        let rows = RowTable::new(["a"]).with_row(vec![Coord::Int(1)], 1.0).unwrap();
        let err = Ipfn::tabular(
            rows,
            vec![GroupTargets::single([(1, 1.0)])],
            vec![vec!["a"]],
            IpfConfig::default().with_weight_col("count"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::WeightColumnMismatch { configured: "count".into(), table: "total".into() }
        );
    }

    #[test]
    fn test_weight_column_cannot_be_a_dimension() {
        let rows = RowTable::new(["total"]).with_row(vec![Coord::Int(1)], 1.0).unwrap();
        let err = Ipfn::tabular(rows, vec![], Vec::<Vec<String>>::new(), IpfConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::WeightColumnMismatch { .. }));
    }

    #[test]
    fn test_step_on_converged_table_stays_within_rate() {
        let ipfn = textbook_ipfn(IpfConfig::default()).unwrap();
        let report = ipfn.run();
        let (_, conv) = ipfn.step(report.table.clone()).unwrap();
        assert!(conv <= 0.01, "conv = {}", conv);
        assert_eq!(ipfn.deviation(&report.table), Ok(report.deviation));
    }

    #[test]
    fn test_step_rejects_foreign_tables() {
        let ipfn = textbook_ipfn(IpfConfig::default()).unwrap();
        let wrong_shape = DenseTable::zeros(vec![4, 3]);
        assert_eq!(
            ipfn.step(wrong_shape.into()),
            Err(ConfigurationError::TableMismatch { expected: "dense" })
        );
        let rows = RowTable::new(["a"]);
        assert!(matches!(
            ipfn.deviation(&rows.into()),
            Err(ConfigurationError::UnrecognizedRepresentation { what: "table", .. })
        ));
    }
}

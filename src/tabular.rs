/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Row-oriented tables and the tabular scaling pass.
//!
//! A [`RowTable`] is a list of rows, each carrying one categorical
//! [`Coord`] per dimension column and one nonnegative weight. Constraints are
//! expressed as [`GroupTargets`]: the desired weight sum of every combination
//! of a chosen set of columns.
//!
//! # Scaling rule
//!
//! For each constraint in order, with `den` the achieved group sum over the
//! current weights and `t` the group target:
//!
//! ```text
//! den == 0  →  w' = w × t
//! den  > 0  →  w' = w × t / den
//! ```
//!
//! Dense tables leave a zero-sum slice untouched instead. With nonnegative
//! weights both rules leave a zero group at zero; the two formulas are kept
//! apart rather than unified.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashSet;
use log::trace;

use crate::adjust::{Adjuster, BufferArena};
use crate::aggregate::GroupIndex;
use crate::config::DEFAULT_WEIGHT_COL;
use crate::convergence::max_deviation;
use crate::error::{is_valid_weight, ConfigurationError};

// ─── Coord ──────────────────────────────────────────────────────────────────

/// A categorical coordinate value.
///
/// Ordered integers first, then text, so that domains enumerate
/// deterministically.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Coord {
    /// Integer code (e.g. a region or size code).
    Int(i64),
    /// Text label (e.g. an age band such as `"20-25"`).
    Text(String),
}

impl From<i64> for Coord {
    fn from(v: i64) -> Self {
        Coord::Int(v)
    }
}

impl From<i32> for Coord {
    fn from(v: i32) -> Self {
        Coord::Int(i64::from(v))
    }
}

impl From<&str> for Coord {
    fn from(v: &str) -> Self {
        Coord::Text(String::from(v))
    }
}

impl From<String> for Coord {
    fn from(v: String) -> Self {
        Coord::Text(v)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coord::Int(v) => write!(f, "{v}"),
            Coord::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// Render a coordinate combination as `(a, b, ...)` for error messages.
pub(crate) fn render_key(key: &[Coord]) -> String {
    use core::fmt::Write;
    let mut out = String::from("(");
    for (i, c) in key.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{c}");
    }
    out.push(')');
    out
}

// ─── RowTable ───────────────────────────────────────────────────────────────

/// A weighted row table: dimension columns plus one weight column.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowTable {
    /// Dimension column names.
    columns: Vec<String>,
    /// Weight column name. Default: `"total"`.
    weight_col: String,
    /// One coordinate per dimension column, per row.
    coords: Vec<Vec<Coord>>,
    /// One weight per row.
    weights: Vec<f64>,
}

impl RowTable {
    /// Empty table with the given dimension columns and weight column `"total"`.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            weight_col: String::from(DEFAULT_WEIGHT_COL),
            coords: Vec::new(),
            weights: Vec::new(),
        }
    }

    /// Rename the weight column.
    pub fn with_weight_col(mut self, weight_col: impl Into<String>) -> Self {
        self.weight_col = weight_col.into();
        self
    }

    /// Append a row. Fails if the row does not have one coordinate per column.
    pub fn push_row(&mut self, coords: Vec<Coord>, weight: f64) -> Result<(), ConfigurationError> {
        if coords.len() != self.columns.len() {
            return Err(ConfigurationError::RowArityMismatch {
                row: self.coords.len(),
                expected: self.columns.len(),
                found: coords.len(),
            });
        }
        self.coords.push(coords);
        self.weights.push(weight);
        Ok(())
    }

    /// Builder form of [`push_row`](Self::push_row).
    pub fn with_row(mut self, coords: Vec<Coord>, weight: f64) -> Result<Self, ConfigurationError> {
        self.push_row(coords, weight)?;
        Ok(self)
    }

    /// Collapse raw records into one row per distinct combination, weighted by
    /// the number of records carrying it. Rows come out in sorted key order.
    pub fn collapse<S, R>(
        columns: impl IntoIterator<Item = S>,
        records: impl IntoIterator<Item = R>,
    ) -> Result<Self, ConfigurationError>
    where
        S: Into<String>,
        R: Into<Vec<Coord>>,
    {
        let mut table = Self::new(columns);
        let mut counts: BTreeMap<Vec<Coord>, f64> = BTreeMap::new();
        for (row, record) in records.into_iter().enumerate() {
            let record: Vec<Coord> = record.into();
            if record.len() != table.columns.len() {
                return Err(ConfigurationError::RowArityMismatch {
                    row,
                    expected: table.columns.len(),
                    found: record.len(),
                });
            }
            *counts.entry(record).or_insert(0.0) += 1.0;
        }
        for (coords, count) in counts {
            table.coords.push(coords);
            table.weights.push(count);
        }
        Ok(table)
    }

    /// Dimension column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Weight column name.
    pub fn weight_col(&self) -> &str {
        &self.weight_col
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Coordinates of every row.
    pub fn coords(&self) -> &[Vec<Coord>] {
        &self.coords
    }

    /// Weight of every row.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Iterate `(coordinates, weight)` pairs.
    pub fn rows(&self) -> impl Iterator<Item = (&[Coord], f64)> + '_ {
        self.coords.iter().map(Vec::as_slice).zip(self.weights.iter().copied())
    }

    /// Position of a dimension column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Group-by sum of the weight column over `columns`, as targets.
    ///
    /// Covers the full Cartesian domain; absent combinations sum to zero.
    pub fn marginal<S: AsRef<str>>(&self, columns: &[S]) -> Result<GroupTargets, ConfigurationError> {
        let positions = self.resolve_columns(0, columns)?;
        let index = GroupIndex::build(&self.coords, &positions);
        let sums = index.group_sums(&self.weights);
        Ok(index.keys().iter().cloned().zip(sums).collect())
    }

    /// Check row arity and weight validity.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let Some((row, c)) = self
            .coords
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != self.columns.len())
        {
            return Err(ConfigurationError::RowArityMismatch {
                row,
                expected: self.columns.len(),
                found: c.len(),
            });
        }
        if self.coords.len() != self.weights.len() {
            return Err(ConfigurationError::RowArityMismatch {
                row: self.coords.len().min(self.weights.len()),
                expected: self.columns.len(),
                found: 0,
            });
        }
        match self.weights.iter().position(|&w| !is_valid_weight(w)) {
            Some(position) => Err(ConfigurationError::InvalidWeight {
                position,
                value: self.weights[position],
            }),
            None => Ok(()),
        }
    }

    /// `true` if both tables have the same columns and row coordinates.
    pub fn same_identity(&self, other: &RowTable) -> bool {
        self.columns == other.columns && self.weight_col == other.weight_col && self.coords == other.coords
    }

    pub(crate) fn with_weights(mut self, weights: Vec<f64>) -> Self {
        debug_assert_eq!(weights.len(), self.coords.len());
        self.weights = weights;
        self
    }

    pub(crate) fn take_weights(&mut self) -> Vec<f64> {
        core::mem::take(&mut self.weights)
    }

    /// Column positions for one dimension set, rejecting unknown and repeated names.
    fn resolve_columns<S: AsRef<str>>(
        &self,
        group: usize,
        columns: &[S],
    ) -> Result<Vec<usize>, ConfigurationError> {
        let mut positions = Vec::with_capacity(columns.len());
        for name in columns {
            let name = name.as_ref();
            let pos = self.column_index(name).ok_or_else(|| ConfigurationError::UnknownColumn {
                group,
                column: String::from(name),
            })?;
            if positions.contains(&pos) {
                return Err(ConfigurationError::RepeatedDimension {
                    group,
                    dimension: String::from(name),
                });
            }
            positions.push(pos);
        }
        Ok(positions)
    }
}

// ─── GroupTargets ───────────────────────────────────────────────────────────

/// Target weight sums per coordinate combination of one dimension set.
///
/// Keys list coordinates in the dimension set's column order.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupTargets {
    entries: Vec<(Vec<Coord>, f64)>,
}

impl GroupTargets {
    /// No targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets for a single-column dimension set.
    pub fn single<C: Into<Coord>>(pairs: impl IntoIterator<Item = (C, f64)>) -> Self {
        pairs
            .into_iter()
            .map(|(c, v)| {
                let c: Coord = c.into();
                (Vec::from([c]), v)
            })
            .collect()
    }

    /// Add or append a target.
    pub fn insert(&mut self, key: Vec<Coord>, value: f64) {
        self.entries.push((key, value));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: Vec<Coord>, value: f64) -> Self {
        self.insert(key, value);
        self
    }

    /// Overwrite the target of `key`, inserting it if absent.
    pub fn set(&mut self, key: &[Coord], value: f64) {
        match self.entries.iter_mut().find(|(k, _)| k.as_slice() == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((Vec::from(key), value)),
        }
    }

    /// Target of `key` (first entry if duplicated).
    pub fn get(&self, key: &[Coord]) -> Option<f64> {
        self.entries.iter().find(|(k, _)| k.as_slice() == key).map(|(_, v)| *v)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(key, target)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&[Coord], f64)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_slice(), *v))
    }
}

impl FromIterator<(Vec<Coord>, f64)> for GroupTargets {
    fn from_iter<I: IntoIterator<Item = (Vec<Coord>, f64)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

// ─── TabularAdjuster ────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct TabularStep {
    groups: GroupIndex,
    /// Targets aligned with `groups.keys()`.
    targets: Vec<f64>,
}

/// Scaling pass over a [`RowTable`], one step per dimension set.
///
/// Built once from the table it will adjust. Row coordinates never change
/// during a fit, so each constraint's row grouping is computed here and
/// reused by every pass.
#[derive(Clone, Debug)]
pub struct TabularAdjuster {
    rows: usize,
    steps: Vec<TabularStep>,
}

impl TabularAdjuster {
    /// Validate `aggregates` against the domains `dimensions` induce on `table`.
    pub fn new(
        table: &RowTable,
        aggregates: Vec<GroupTargets>,
        dimensions: Vec<Vec<String>>,
    ) -> Result<Self, ConfigurationError> {
        if aggregates.len() != dimensions.len() {
            return Err(ConfigurationError::ConstraintCountMismatch {
                aggregates: aggregates.len(),
                dimensions: dimensions.len(),
            });
        }

        let mut steps = Vec::with_capacity(dimensions.len());
        for (group, (target, columns)) in aggregates.into_iter().zip(dimensions).enumerate() {
            let positions = table.resolve_columns(group, columns.as_slice())?;
            let groups = GroupIndex::build(&table.coords, &positions);
            let targets = align_targets(group, &groups, &target)?;
            steps.push(TabularStep { groups, targets });
        }

        Ok(Self { rows: table.len(), steps })
    }

    /// Number of constraints.
    pub fn steps(&self) -> usize {
        self.steps.len()
    }

    fn scale_step(step: &TabularStep, current: &[f64], update: &mut [f64]) {
        let sums = step.groups.group_sums(current);
        for (row, (w_new, &w)) in update.iter_mut().zip(current).enumerate() {
            let g = step.groups.group_of(row);
            let den = sums[g];
            let target = step.targets[g];
            *w_new = if den == 0.0 { w * target } else { w * target / den };
        }
    }
}

/// Match targets to domain positions; every domain key needs exactly one target.
fn align_targets(
    group: usize,
    groups: &GroupIndex,
    target: &GroupTargets,
) -> Result<Vec<f64>, ConfigurationError> {
    let mut aligned: Vec<Option<f64>> = alloc::vec![None; groups.len()];
    let mut seen: HashSet<&[Coord]> = HashSet::with_capacity(target.len());
    for (key, value) in target.iter() {
        if !seen.insert(key) {
            return Err(ConfigurationError::DuplicateTarget { group, key: render_key(key) });
        }
        let pos = groups.position(key).ok_or_else(|| ConfigurationError::UnexpectedTarget {
            group,
            key: render_key(key),
        })?;
        if !is_valid_weight(value) {
            return Err(ConfigurationError::InvalidTarget { group, value });
        }
        aligned[pos] = Some(value);
    }
    aligned
        .into_iter()
        .zip(groups.keys())
        .map(|(value, key)| {
            value.ok_or_else(|| ConfigurationError::MissingTarget { group, key: render_key(key) })
        })
        .collect()
}

impl Adjuster for TabularAdjuster {
    type Table = RowTable;

    fn adjust(&self, mut table: RowTable) -> (RowTable, f64) {
        debug_assert_eq!(table.len(), self.rows);
        let mut arena = BufferArena::new(table.take_weights());
        for (k, step) in self.steps.iter().enumerate() {
            let (current, update) = arena.split();
            Self::scale_step(step, current, update);
            arena.swap();
            trace!("tabular step {k}: {} groups rescaled", step.targets.len());
        }
        let table = table.with_weights(arena.into_current());
        let conv = self.deviation(&table);
        (table, conv)
    }

    fn deviation(&self, table: &RowTable) -> f64 {
        max_deviation(self.steps.iter().flat_map(|step| {
            step.groups
                .group_sums(table.weights())
                .into_iter()
                .zip(step.targets.iter().copied())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    /// 3×4 textbook matrix as rows keyed by (dma, size).
    fn textbook() -> RowTable {
        let m = [8., 4., 6., 7., 3., 6., 5., 2., 9., 11., 3., 1.];
        let dmas = [501, 502, 505];
        let mut t = RowTable::new(["dma", "size"]);
        for (i, &w) in m.iter().enumerate() {
            t.push_row(vec![Coord::from(dmas[i / 4]), Coord::from((i % 4 + 1) as i64)], w)
                .unwrap();
        }
        t
    }

    fn row_targets() -> GroupTargets {
        GroupTargets::single([(501, 20.0), (502, 18.0), (505, 22.0)])
    }

    fn col_targets() -> GroupTargets {
        GroupTargets::single([(1, 18.0), (2, 16.0), (3, 12.0), (4, 14.0)])
    }

    fn dims() -> Vec<Vec<String>> {
        vec![vec!["dma".to_string()], vec!["size".to_string()]]
    }

    #[test]
    fn test_coords_order_ints_before_text() {
        assert!(Coord::Int(999) < Coord::from("a"));
        assert!(Coord::from("20-25") < Coord::from("30-35"));
    }

    #[test]
    fn test_render_key_quotes_text() {
        assert_eq!(render_key(&[Coord::Int(501), Coord::from("20-25")]), "(501, \"20-25\")");
    }

    #[test]
    fn test_push_row_rejects_wrong_arity() {
        let mut t = RowTable::new(["a", "b"]);
        let err = t.push_row(vec![Coord::Int(1)], 1.0).unwrap_err();
        assert_eq!(err, ConfigurationError::RowArityMismatch { row: 0, expected: 2, found: 1 });
    }

    #[test]
    fn test_collapse_counts_duplicate_records() {
        let records = vec![
            vec![Coord::Int(1), Coord::from("x")],
            vec![Coord::Int(2), Coord::from("x")],
            vec![Coord::Int(1), Coord::from("x")],
            vec![Coord::Int(1), Coord::from("y")],
        ];
        let t = RowTable::collapse(["id", "tag"], records).unwrap();
        let rows: Vec<(Vec<Coord>, f64)> = t.rows().map(|(c, w)| (c.to_vec(), w)).collect();
        assert_eq!(
            rows,
            vec![
                (vec![Coord::Int(1), Coord::from("x")], 2.0),
                (vec![Coord::Int(1), Coord::from("y")], 1.0),
                (vec![Coord::Int(2), Coord::from("x")], 1.0),
            ]
        );
        assert_eq!(t.weight_col(), "total");
    }

    #[test]
    fn test_marginal_is_group_by_sum() {
        let t = textbook();
        let m = t.marginal(&["dma"]).unwrap();
        assert_eq!(m.get(&[Coord::Int(501)]), Some(25.0));
        assert_eq!(m.get(&[Coord::Int(502)]), Some(16.0));
        assert_eq!(m.get(&[Coord::Int(505)]), Some(24.0));
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn test_marginal_rejects_unknown_column() {
        let err = textbook().marginal(&["age"]).unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownColumn { group: 0, column: "age".into() });
    }

    #[test]
    fn test_one_pass_matches_last_constraint_exactly() {
        let t = textbook();
        let adj = TabularAdjuster::new(&t, vec![row_targets(), col_targets()], dims()).unwrap();
        let (t, conv) = adj.adjust(t);
        let cols = t.marginal(&["size"]).unwrap();
        for (key, target) in col_targets().iter() {
            let got = cols.get(key).unwrap();
            assert!((got - target).abs() < 1e-9, "size {:?}: {} vs {}", key, got, target);
        }
        assert!(conv > 0.0 && conv < 0.2, "conv = {}", conv);
    }

    #[test]
    fn test_row_identity_is_untouched() {
        let t = textbook();
        let before = t.coords().to_vec();
        let adj = TabularAdjuster::new(&t, vec![row_targets(), col_targets()], dims()).unwrap();
        let (t, _) = adj.adjust(t);
        assert_eq!(t.coords(), before.as_slice());
        assert!(t.weights().iter().all(|&w| w >= 0.0));
    }

    #[test]
    fn test_zero_group_uses_current_times_target() {
        // Group 502 sums to zero. Its rows are multiplied by the target rather
        // than divided by the zero sum, which keeps them at zero.
        let t = RowTable::new(["dma"])
            .with_row(vec![Coord::Int(501)], 3.0).unwrap()
            .with_row(vec![Coord::Int(501)], 1.0).unwrap()
            .with_row(vec![Coord::Int(502)], 0.0).unwrap();
        let targets = GroupTargets::single([(501, 8.0), (502, 5.0)]);
        let adj = TabularAdjuster::new(&t, vec![targets], vec![vec!["dma".to_string()]]).unwrap();
        let (t, conv) = adj.adjust(t);
        assert_eq!(t.weights(), &[6.0, 2.0, 0.0]);
        // 502 stays at zero against a target of 5: relative gap of 1.
        assert_eq!(conv, 1.0);
    }

    #[test]
    fn test_missing_target_is_rejected() {
        let t = textbook();
        let partial = GroupTargets::single([(501, 20.0), (502, 18.0)]);
        let err = TabularAdjuster::new(&t, vec![partial], vec![vec!["dma".to_string()]]).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingTarget { group: 0, key: "(505)".into() });
    }

    #[test]
    fn test_unexpected_and_duplicate_targets_are_rejected() {
        let t = textbook();
        let extra = row_targets().with(vec![Coord::Int(999)], 1.0);
        let err = TabularAdjuster::new(&t, vec![extra], vec![vec!["dma".to_string()]]).unwrap_err();
        assert_eq!(err, ConfigurationError::UnexpectedTarget { group: 0, key: "(999)".into() });

        let dup = row_targets().with(vec![Coord::Int(501)], 1.0);
        let err = TabularAdjuster::new(&t, vec![dup], vec![vec!["dma".to_string()]]).unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateTarget { group: 0, key: "(501)".into() });
    }

    #[test]
    fn test_repeated_column_is_rejected() {
        let t = textbook();
        let err = TabularAdjuster::new(
            &t,
            vec![GroupTargets::new()],
            vec![vec!["dma".to_string(), "dma".to_string()]],
        )
        .unwrap_err();
        assert_eq!(err, ConfigurationError::RepeatedDimension { group: 0, dimension: "dma".into() });
    }

    #[test]
    fn test_negative_weight_fails_validation() {
        let t = RowTable::new(["a"]).with_row(vec![Coord::Int(1)], -2.0).unwrap();
        assert_eq!(
            t.validate(),
            Err(ConfigurationError::InvalidWeight { position: 0, value: -2.0 })
        );
    }
}

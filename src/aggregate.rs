/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Achieved marginals: slice sums over dense tables and group-by sums over rows.
//!
//! For a dense table the marginal of a coordinate combination is the sum of
//! the slice selected by [`index_axis_elem`](crate::index::index_axis_elem).
//! For a row table it is the sum of the weight column over every row whose
//! dimension columns equal the combination.
//!
//! [`GroupIndex`] is built once per constraint. It maps every row to the
//! position of its coordinate combination in the constraint's domain, so a
//! group-by sum is a single pass over the weights with no hashing.

use alloc::collections::BTreeSet;
use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::index::{CoordinateProduct, SliceIndex};
use crate::tabular::Coord;

/// Sum of the entries of `data` (row-major, `shape`) selected by `index`.
pub fn slice_sum(data: &[f64], shape: &[usize], index: &SliceIndex) -> f64 {
    index.offsets(shape).map(|off| data[off]).sum()
}

// ─── GroupIndex ─────────────────────────────────────────────────────────────

/// Row-to-group assignment for one set of dimension columns.
///
/// The domain is the Cartesian product of the sorted distinct values of each
/// column, so combinations that never occur together in the table are still
/// part of the domain (with an achieved sum of zero).
#[derive(Clone, Debug)]
pub struct GroupIndex {
    /// Domain combinations in row-major order of the per-column sorted values.
    keys: Vec<Vec<Coord>>,
    /// Combination → position in `keys`.
    lookup: HashMap<Vec<Coord>, usize>,
    /// Row → position in `keys`.
    row_group: Vec<usize>,
}

impl GroupIndex {
    /// Group `rows` by the coordinates at `columns` (positions into each row).
    pub fn build(rows: &[Vec<Coord>], columns: &[usize]) -> Self {
        let levels: Vec<Vec<Coord>> = columns
            .iter()
            .map(|&col| {
                let distinct: BTreeSet<&Coord> = rows.iter().map(|r| &r[col]).collect();
                distinct.into_iter().cloned().collect()
            })
            .collect();

        let extents: Vec<usize> = levels.iter().map(Vec::len).collect();
        let keys: Vec<Vec<Coord>> = CoordinateProduct::new(extents)
            .map(|combo| {
                combo
                    .iter()
                    .zip(&levels)
                    .map(|(&i, values)| values[i].clone())
                    .collect()
            })
            .collect();

        let lookup: HashMap<Vec<Coord>, usize> =
            keys.iter().cloned().enumerate().map(|(i, k)| (k, i)).collect();

        let mut scratch = Vec::with_capacity(columns.len());
        let row_group = rows
            .iter()
            .map(|r| {
                scratch.clear();
                scratch.extend(columns.iter().map(|&col| r[col].clone()));
                // Every row's combination is in the product of its own column values.
                lookup.get(&scratch).copied().unwrap_or_default()
            })
            .collect();

        Self { keys, lookup, row_group }
    }

    /// Domain combinations, in the order group sums are reported.
    pub fn keys(&self) -> &[Vec<Coord>] {
        &self.keys
    }

    /// Number of combinations in the domain.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// `true` when the domain is empty (the table has no rows).
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Domain position of `key`, if it belongs to the domain.
    pub fn position(&self, key: &[Coord]) -> Option<usize> {
        self.lookup.get(key).copied()
    }

    /// Domain position of the combination carried by `row`.
    pub fn group_of(&self, row: usize) -> usize {
        self.row_group[row]
    }

    /// Sum of `weights` per domain combination, indexed like [`keys`](Self::keys).
    pub fn group_sums(&self, weights: &[f64]) -> Vec<f64> {
        let mut sums = vec![0.0; self.keys.len()];
        for (&g, &w) in self.row_group.iter().zip(weights) {
            sums[g] += w;
        }
        sums
    }

    /// Sum of `weights` over the rows carrying `key`. Zero for keys outside the domain.
    pub fn group_sum(&self, weights: &[f64], key: &[Coord]) -> f64 {
        match self.position(key) {
            Some(g) => self
                .row_group
                .iter()
                .zip(weights)
                .filter(|(rg, _)| **rg == g)
                .map(|(_, w)| w)
                .sum(),
            None => 0.0,
        }
    }
}

/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Multi-axis slice indexing over row-major dense tables.
//!
//! A [`SliceIndex`] fixes some axes of an N-dimensional table to one
//! coordinate each and leaves every other axis at its full range:
//!
//! ```text
//! dims = 3, axes = [0, 2], elems = [1, 0]   →   [Fixed(1), Full, Fixed(0)]
//!                                              ≡ m[1, :, 0]
//! ```
//!
//! [`CoordinateProduct`] enumerates every coordinate combination of a set of
//! axes, which is the domain of one marginal constraint.

use alloc::vec;
use alloc::vec::Vec;

// ─── AxisSelector / SliceIndex ──────────────────────────────────────────────

/// Selection applied to a single axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisSelector {
    /// Exactly this coordinate.
    Fixed(usize),
    /// The whole axis.
    Full,
}

/// One selector per table axis, in table axis order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SliceIndex {
    selectors: Vec<AxisSelector>,
}

/// Build the index expression fixing `axes[j]` to `elems[j]` and leaving every
/// other axis of a `dims`-dimensional table unconstrained.
///
/// `axes` may be listed in any order. Axes outside `0..dims` are ignored;
/// callers validate them beforehand.
pub fn index_axis_elem(dims: usize, axes: &[usize], elems: &[usize]) -> SliceIndex {
    let mut selectors = vec![AxisSelector::Full; dims];
    for (&axis, &elem) in axes.iter().zip(elems) {
        if let Some(sel) = selectors.get_mut(axis) {
            *sel = AxisSelector::Fixed(elem);
        }
    }
    SliceIndex { selectors }
}

impl SliceIndex {
    /// Selectors in table axis order.
    pub fn selectors(&self) -> &[AxisSelector] {
        &self.selectors
    }

    /// Number of axes the index spans.
    pub fn ndim(&self) -> usize {
        self.selectors.len()
    }

    /// Iterate the flat row-major offsets this index selects in a table of `shape`.
    ///
    /// `shape` must have [`ndim`](Self::ndim) entries and every fixed
    /// coordinate must be inside its axis.
    pub fn offsets(&self, shape: &[usize]) -> SliceOffsets {
        debug_assert_eq!(shape.len(), self.selectors.len());
        let strides = row_major_strides(shape);
        let mut base = 0;
        let mut free = Vec::new();
        let mut empty = false;
        for (axis, sel) in self.selectors.iter().enumerate() {
            match *sel {
                AxisSelector::Fixed(c) => base += c * strides[axis],
                AxisSelector::Full => {
                    if shape[axis] == 0 {
                        empty = true;
                    }
                    free.push(FreeAxis { extent: shape[axis], stride: strides[axis] });
                }
            }
        }
        SliceOffsets {
            counters: vec![0; free.len()],
            free,
            base,
            offset: base,
            done: empty,
        }
    }
}

/// Row-major strides for `shape` (last axis contiguous).
pub fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

#[derive(Clone, Debug)]
struct FreeAxis {
    extent: usize,
    stride: usize,
}

/// Iterator over the flat offsets selected by a [`SliceIndex`].
///
/// Offsets are yielded in row-major order of the free axes.
#[derive(Clone, Debug)]
pub struct SliceOffsets {
    free: Vec<FreeAxis>,
    counters: Vec<usize>,
    base: usize,
    offset: usize,
    done: bool,
}

impl Iterator for SliceOffsets {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.done {
            return None;
        }
        let current = self.offset;

        // Odometer step, last free axis fastest.
        let mut axis = self.free.len();
        loop {
            if axis == 0 {
                self.done = true;
                break;
            }
            axis -= 1;
            self.counters[axis] += 1;
            if self.counters[axis] < self.free[axis].extent {
                self.offset += self.free[axis].stride;
                break;
            }
            self.offset -= (self.counters[axis] - 1) * self.free[axis].stride;
            self.counters[axis] = 0;
        }
        if self.done {
            self.offset = self.base;
        }
        Some(current)
    }
}

// ─── CoordinateProduct ──────────────────────────────────────────────────────

/// Cartesian product of `0..extent` ranges, row-major (last position fastest).
///
/// No extents yields a single empty combination; any zero extent yields none.
#[derive(Clone, Debug)]
pub struct CoordinateProduct {
    extents: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl CoordinateProduct {
    /// Product over the given extents.
    pub fn new(extents: Vec<usize>) -> Self {
        let next = if extents.contains(&0) { None } else { Some(vec![0; extents.len()]) };
        Self { extents, next }
    }

    /// Total number of combinations.
    pub fn domain_size(&self) -> usize {
        self.extents.iter().product()
    }
}

impl Iterator for CoordinateProduct {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        let mut following = current.clone();
        let mut pos = following.len();
        while pos > 0 {
            pos -= 1;
            following[pos] += 1;
            if following[pos] < self.extents[pos] {
                self.next = Some(following);
                return Some(current);
            }
            following[pos] = 0;
        }
        Some(current)
    }
}

/// Flat row-major position of `coords` in a table of `shape`.
pub fn flat_position(shape: &[usize], coords: &[usize]) -> usize {
    coords
        .iter()
        .zip(shape)
        .fold(0, |acc, (&c, &extent)| acc * extent + c)
}

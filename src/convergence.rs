/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Worst-case relative marginal deviation.
//!
//! After every pass the controller measures
//!
//! ```text
//! conv = max over constraints k, combinations c of |achieved(k, c) / target(k, c) − 1|
//! ```
//!
//! recomputed from scratch against the table state at the end of the pass.
//! A zero target contributes `0` when its slice is also zero and `+∞`
//! otherwise, since no finite rescaling can reach it.

/// `|x|` without relying on `std` float intrinsics.
#[inline]
fn abs(x: f64) -> f64 {
    if x < 0.0 { -x } else { x }
}

/// Relative gap between an achieved marginal and its target.
#[inline]
pub fn relative_deviation(achieved: f64, target: f64) -> f64 {
    if target == 0.0 {
        return if achieved == 0.0 { 0.0 } else { f64::INFINITY };
    }
    abs(achieved / target - 1.0)
}

/// Maximum [`relative_deviation`] over `(achieved, target)` pairs; `0.0` when empty.
pub fn max_deviation<I>(pairs: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    pairs
        .into_iter()
        .map(|(achieved, target)| relative_deviation(achieved, target))
        .fold(0.0, f64::max)
}

/// Absolute change between two consecutive deviations.
///
/// Infinite when either side is infinite (including the controller's initial
/// `+∞` / `−∞` pair) so that a first pass can never look stagnant.
#[inline]
pub fn deviation_change(conv: f64, previous: f64) -> f64 {
    if conv.is_infinite() || previous.is_infinite() {
        return f64::INFINITY;
    }
    abs(conv - previous)
}

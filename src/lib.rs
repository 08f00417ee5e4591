//! # ipf-core
//!
//! Iterative proportional fitting ("raking") over dense N-dimensional arrays and
//! over weighted row tables.
//!
//! ---
//!
//! ## What it does
//!
//! Given a seed table of nonnegative weights and a list of target marginals,
//! IPF rescales the weights until every marginal matches its target. Each
//! constraint names a set of dimensions to preserve: a single axis gives a
//! one-dimensional margin, several axes give a joint margin.
//!
//! One **pass** applies every constraint once, in order, each step reading the
//! output of the previous one (Gauss–Seidel). After each pass the worst
//! relative deviation `|achieved / target − 1|` decides whether to stop.
//!
//! Two representations share the same controller:
//!
//! - **dense**: a row-major array with a shape; constraints are axis lists and
//!   targets are arrays shaped like those axes.
//! - **tabular**: rows of categorical coordinates plus a weight column;
//!   constraints are column lists and targets are keyed by value combinations.
//!
//! ## The pipeline
//!
//! ```text
//! Table + Aggregates + DimensionSets + IpfConfig
//!                     │
//!                     ▼
//!                   Ipfn  ──(validate, bind once)──▶ DenseAdjuster | TabularAdjuster
//!                     │                                   │
//!                     │◀──────── (table, conv) per pass ──┘
//!                     ▼
//!       FitState: Converged | Stagnant | Exhausted
//!                     │
//!                     ▼
//!        FitReport ──(verbose)──▶ IpfOutput
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`index`] | [`SliceIndex`], [`CoordinateProduct`] | Multi-axis slice selection over row-major arrays |
//! | [`aggregate`] | [`GroupIndex`] | Slice sums and group-by sums |
//! | [`adjust`] | [`Adjuster`], [`Table`], [`Aggregate`], [`DimensionSet`] | Shared pass interface and representations |
//! | [`dense`] | [`DenseTable`], [`DenseAdjuster`] | Dense scaling pass |
//! | [`tabular`] | [`RowTable`], [`GroupTargets`], [`TabularAdjuster`] | Row-table scaling pass |
//! | [`convergence`] | [`max_deviation`] | Relative marginal deviation |
//! | [`iteration`] | [`Ipfn`], [`FitState`], [`FitReport`], [`IpfOutput`] | Stopping rules and output shaping |
//! | [`config`] | [`IpfConfig`], [`Verbosity`] | Run configuration |
//! | [`error`] | [`ConfigurationError`] | Validation failures |
//!
//! ## `no_std`
//!
//! This crate is `#![no_std]` by default and needs `alloc`. Enable the `serde`
//! feature for serialisation of inputs and results, and `python-ffi` for the
//! PyO3 module.
//!
//! Progress is reported through the [`log`] facade: `debug!` per pass,
//! `trace!` per constraint step, `info!`/`warn!` on stop. No logger is
//! installed by the crate.
//!
//! ## License
//!
//! Business Source License 1.1. Free for evaluation and non-production use.

#![cfg_attr(not(any(feature = "std", feature = "python-ffi", test)), no_std)]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

pub mod error;
pub mod config;
pub mod index;
pub mod aggregate;
pub mod convergence;
pub mod adjust;
pub mod dense;
pub mod tabular;
pub mod iteration;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use adjust::{Adjuster, Aggregate, BufferArena, DimensionSet, Table};
pub use aggregate::GroupIndex;
pub use config::{IpfConfig, Verbosity, DEFAULT_WEIGHT_COL};
pub use convergence::{max_deviation, relative_deviation};
pub use dense::{DenseAdjuster, DenseTable};
pub use error::ConfigurationError;
pub use index::{index_axis_elem, AxisSelector, CoordinateProduct, SliceIndex};
pub use iteration::{ConvergenceState, FitReport, FitState, IpfOutput, Ipfn, IterationRecord};
pub use tabular::{Coord, GroupTargets, RowTable, TabularAdjuster};

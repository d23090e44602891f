//! Allocation, restriction and usage series for water take consents.
//!
//! [`AlloUsage`] reads the eligible consents from any
//! [`SourceStore`](allo_core::source::SourceStore) and computes the derived
//! datasets at a chosen frequency, grouped by key columns or site and
//! consent attributes. [`allo_ts`] is the lighter per-block allocation series.
//!
//! # Datasets
//!
//! - `allocation`: consented volume apportioned over time buckets
//! - `restricted_allocation`: allocation scaled by low flow restrictions
//! - `usage`: metered abstraction split among the consents sharing a point
//! - `metered_allocation` and `metered_restricted_allocation`: the
//!   allocations, zeroed where no usage was metered

pub mod allo_ts;
pub mod cache;
pub mod params;
pub mod pipeline;
pub mod reader;
pub mod table;

pub use allo_ts::allo_ts;
pub use params::{Dataset, MeteredMode, Parameters, Request};
pub use pipeline::{AlloUsage, Selection, DEFAULT_USAGE_DATASET_TYPES};
pub use table::{OutputRow, OutputTable};

//! Data processing for consent allocation series.
//!
//! This crate narrows raw consent records to the eligible set, turns each
//! record into a discretised time series and re-aggregates series over
//! calendar buckets.

pub mod aggregate;
pub mod apportion;
pub mod filter;
pub mod usage;

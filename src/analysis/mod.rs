//! Analysis modules.
//!
//! Grouping, filtering, and ranking over loaded records.

pub mod aggregator;

pub use aggregator::*;

//! Report generation.
//!
//! Turns aggregation results into chart series and Markdown/JSON documents.

pub mod generator;

pub use generator::*;

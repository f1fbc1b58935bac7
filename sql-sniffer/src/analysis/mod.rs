//! Query statistics
//!
//! Pure aggregation logic, separated from the transport and the terminal
//! output.

pub mod query_analyzer;

pub use query_analyzer::{QueryAnalyzer, QueryStats, RankedQuery, SharedAnalyzer};

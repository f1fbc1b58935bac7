//! Per-query aggregation of observed executions.
//!
//! # Architecture
//!
//! - **`QueryAnalyzer::record_query()`** - O(1) amortized update as records
//!   stream in from the receive task
//! - **`QueryAnalyzer::summarize()`** - O(n log n) ranking over distinct
//!   query texts, taken on demand by the controller
//!
//! Queries are keyed by their exact text. Distinct texts are never evicted.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::OrderBy;

/// Analyzer shared between the receive task (writer) and the controller
/// (reader, for summaries).
pub type SharedAnalyzer = Arc<RwLock<QueryAnalyzer>>;

/// Aggregate over every observed execution of one query text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryStats {
    pub count: u64,
    /// Largest single duration, in seconds
    pub max_duration: f64,
    /// Sum of all durations, in seconds
    pub sum_duration: f64,
}

impl QueryStats {
    fn first(duration: f64) -> Self {
        Self { count: 1, max_duration: duration, sum_duration: duration }
    }

    fn observe(&mut self, duration: f64) {
        self.count += 1;
        self.max_duration = self.max_duration.max(duration);
        self.sum_duration += duration;
    }

    /// Mean duration in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_duration(&self) -> f64 {
        self.sum_duration / self.count as f64
    }

    fn compare(&self, other: &Self, order_by: OrderBy) -> Ordering {
        match order_by {
            OrderBy::MaxDuration => self.max_duration.total_cmp(&other.max_duration),
            OrderBy::SumDuration => self.sum_duration.total_cmp(&other.sum_duration),
            OrderBy::Count => self.count.cmp(&other.count),
        }
    }
}

/// One line of a ranked summary.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedQuery {
    pub query: String,
    pub stats: QueryStats,
}

#[derive(Debug)]
struct Entry {
    /// Insertion sequence, for first-seen tie-breaking
    seq: u64,
    stats: QueryStats,
}

#[derive(Debug, Default)]
pub struct QueryAnalyzer {
    queries: HashMap<String, Entry>,
    next_seq: u64,
    total_records: u64,
}

impl QueryAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> SharedAnalyzer {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Fold one execution into the statistics of `query`.
    ///
    /// Returns the updated statistics for that query.
    pub fn record_query(&mut self, query: &str, duration: f64) -> QueryStats {
        self.total_records += 1;
        if let Some(entry) = self.queries.get_mut(query) {
            entry.stats.observe(duration);
            return entry.stats;
        }

        let stats = QueryStats::first(duration);
        self.queries.insert(query.to_string(), Entry { seq: self.next_seq, stats });
        self.next_seq += 1;
        stats
    }

    /// Statistics for one query text, if it has been seen.
    #[must_use]
    pub fn stats(&self, query: &str) -> Option<QueryStats> {
        self.queries.get(query).map(|entry| entry.stats)
    }

    /// Number of distinct query texts seen.
    #[must_use]
    pub fn distinct_queries(&self) -> usize {
        self.queries.len()
    }

    /// Number of records folded in so far.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// The `top_n` queries in descending order of `order_by`.
    ///
    /// Ties are broken by the order in which the queries were first seen.
    #[must_use]
    pub fn summarize(&self, order_by: OrderBy, top_n: usize) -> Vec<RankedQuery> {
        if top_n == 0 {
            return Vec::new();
        }

        let mut entries: Vec<(&String, &Entry)> = self.queries.iter().collect();
        entries.sort_by(|(_, a), (_, b)| {
            b.stats.compare(&a.stats, order_by).then(a.seq.cmp(&b.seq))
        });

        entries
            .into_iter()
            .take(top_n)
            .map(|(query, entry)| RankedQuery { query: query.clone(), stats: entry.stats })
            .collect()
    }
}

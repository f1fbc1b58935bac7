//! Timing wrapper installed at the extension point.

use crossbeam_channel::Sender;
use serde_json::Value;
use sql_sniffer_common::TelemetryRecord;
use std::time::Instant;

use crate::executor::{QueryExecutor, SharedExecutor};

/// Wraps the original executor, timing every call.
///
/// Results and errors from the original pass through untouched. The record is
/// queued by a drop guard, so it is produced on success, on error, and while
/// unwinding from a panic in the original executor.
pub struct TimingExecutor {
    inner: SharedExecutor,
    queue: Sender<TelemetryRecord>,
}

impl TimingExecutor {
    /// `queue` should be unbounded: enqueueing must never block a query.
    #[must_use]
    pub fn new(inner: SharedExecutor, queue: Sender<TelemetryRecord>) -> Self {
        Self { inner, queue }
    }
}

impl QueryExecutor for TimingExecutor {
    fn execute(&self, query: &str, params: Option<&[Value]>) -> anyhow::Result<Value> {
        let _timer = QueryTimer::start(query, &self.queue);
        self.inner.execute(query, params)
    }

    fn execute_many(&self, query: &str, param_list: &[Vec<Value>]) -> anyhow::Result<Value> {
        let _timer = QueryTimer::start(query, &self.queue);
        self.inner.execute_many(query, param_list)
    }
}

struct QueryTimer<'a> {
    query: &'a str,
    start: Instant,
    queue: &'a Sender<TelemetryRecord>,
}

impl<'a> QueryTimer<'a> {
    fn start(query: &'a str, queue: &'a Sender<TelemetryRecord>) -> Self {
        Self { query, start: Instant::now(), queue }
    }
}

impl Drop for QueryTimer<'_> {
    fn drop(&mut self) {
        let record = TelemetryRecord::from_elapsed(self.query, self.start.elapsed());
        // Disconnected means the forwarder is gone and rollback is imminent
        let _ = self.queue.send(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::tests::EchoExecutor;
    use crossbeam_channel::unbounded;
    use serde_json::json;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;

    struct Panicking;

    impl QueryExecutor for Panicking {
        fn execute(&self, _: &str, _: Option<&[Value]>) -> anyhow::Result<Value> {
            panic!("driver bug");
        }

        fn execute_many(&self, _: &str, _: &[Vec<Value>]) -> anyhow::Result<Value> {
            panic!("driver bug");
        }
    }

    #[test]
    fn test_records_successful_execution() {
        let (tx, rx) = unbounded();
        let timing = TimingExecutor::new(Arc::new(EchoExecutor::default()), tx);

        let result = timing.execute("SELECT 1", Some(&[json!(7)])).unwrap();
        assert_eq!(result["params"], json!([7]));

        let record = rx.try_recv().unwrap();
        assert_eq!(record.query_text, "SELECT 1");
        assert!(record.has_valid_duration());
    }

    #[test]
    fn test_records_failed_execution_and_passes_error_through() {
        let (tx, rx) = unbounded();
        let timing = TimingExecutor::new(Arc::new(EchoExecutor::default()), tx);

        let err = timing.execute_many("FAIL now", &[vec![json!(1)]]).unwrap_err();
        assert_eq!(err.to_string(), "syntax error near FAIL now");
        assert_eq!(rx.try_recv().unwrap().query_text, "FAIL now");
    }

    #[test]
    fn test_records_when_executor_panics() {
        let (tx, rx) = unbounded();
        let timing = TimingExecutor::new(Arc::new(Panicking), tx);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| timing.execute("SELECT boom", None)));
        assert!(outcome.is_err());
        assert_eq!(rx.try_recv().unwrap().query_text, "SELECT boom");
    }

    #[test]
    fn test_disconnected_queue_does_not_affect_query() {
        let (tx, rx) = unbounded();
        drop(rx);
        let timing = TimingExecutor::new(Arc::new(EchoExecutor::default()), tx);
        assert!(timing.execute("SELECT 1", None).is_ok());
    }
}

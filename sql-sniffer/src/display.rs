//! Terminal output for tail mode and ranked summaries.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender, TrySendError};
use log::{debug, warn};

use crate::analysis::{QueryStats, RankedQuery};
use crate::domain::OrderBy;

/// Tail-mode lines buffered while the terminal is slow to drain.
pub const LIVE_BACKLOG: usize = 4096;

/// How long [`LivePrinter::finish`] waits for buffered lines to drain.
pub const LIVE_DRAIN: Duration = Duration::from_secs(1);

/// Format one tail-mode line for a received record.
#[must_use]
pub fn format_live(query: &str, duration: f64, stats: &QueryStats) -> String {
    format!(
        "[QUERY] {:.3}ms count={} max={:.3}ms\n{query}",
        duration * 1000.0,
        stats.count,
        stats.max_duration * 1000.0,
    )
}

/// Tail-mode output written from a dedicated thread.
///
/// [`show`](Self::show) never blocks: when the backlog is full the line is
/// counted and dropped, so a stalled terminal cannot hold up ingestion.
pub struct LivePrinter {
    lines: Option<Sender<String>>,
    writer: thread::JoinHandle<()>,
    dropped: u64,
}

impl LivePrinter {
    /// Print to stdout.
    ///
    /// # Errors
    /// Fails if the printer thread cannot be spawned.
    pub fn stdout() -> io::Result<Self> {
        Self::spawn(io::stdout())
    }

    /// Print to any writer.
    ///
    /// # Errors
    /// Fails if the printer thread cannot be spawned.
    pub fn spawn<W: Write + Send + 'static>(mut out: W) -> io::Result<Self> {
        let (lines, rx) = bounded::<String>(LIVE_BACKLOG);
        let writer = thread::Builder::new().name("sql-sniffer-tail".into()).spawn(move || {
            for line in rx {
                if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
                    debug!("Tail output closed: {e}");
                    break;
                }
            }
        })?;
        Ok(Self { lines: Some(lines), writer, dropped: 0 })
    }

    /// Queue one record for display.
    pub fn show(&mut self, query: &str, duration: f64, stats: &QueryStats) {
        let Some(lines) = &self.lines else { return };
        match lines.try_send(format_live(query, duration, stats)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.dropped += 1,
            // Output is gone, stop formatting lines nobody will see
            Err(TrySendError::Disconnected(_)) => self.lines = None,
        }
    }

    /// Close the queue and give the printer [`LIVE_DRAIN`] to catch up.
    ///
    /// Returns the number of lines dropped because the backlog was full. A
    /// printer still stuck after the drain period is left detached.
    pub async fn finish(mut self) -> u64 {
        self.lines = None;
        let deadline = Instant::now() + LIVE_DRAIN;
        while !self.writer.is_finished() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        if self.writer.is_finished() {
            let _ = self.writer.join();
        } else {
            warn!("Tail output did not drain within {LIVE_DRAIN:?}");
        }
        if self.dropped > 0 {
            warn!("Skipped {} tail lines while the terminal was behind", self.dropped);
        }
        self.dropped
    }
}

/// Render a ranked summary as a table.
#[must_use]
pub fn format_summary(ranked: &[RankedQuery], order_by: OrderBy) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nTop {} queries by {}", ranked.len(), order_by.label());
    if ranked.is_empty() {
        out.push_str("  (no queries recorded)\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{:>4}  {:>8}  {:>12}  {:>12}  {:>12}  query",
        "#", "count", "max ms", "sum ms", "mean ms"
    );
    for (rank, entry) in ranked.iter().enumerate() {
        let stats = &entry.stats;
        let _ = writeln!(
            out,
            "{:>4}  {:>8}  {:>12.3}  {:>12.3}  {:>12.3}  {}",
            rank + 1,
            stats.count,
            stats.max_duration * 1000.0,
            stats.sum_duration * 1000.0,
            stats.mean_duration() * 1000.0,
            single_line(&entry.query),
        );
    }
    out
}

/// Display a ranked summary
pub fn print_summary(ranked: &[RankedQuery], order_by: OrderBy) {
    print!("{}", format_summary(ranked, order_by));
}

/// Collapse whitespace so multi-line queries fit on one table row.
fn single_line(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

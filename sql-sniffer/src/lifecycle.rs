//! Session lifecycle
//!
//! Sequences one profiling session against one target:
//!
//! ```text
//! bind ──► install hook ──► accept ──► receive ◄──┐
//!                                        │        │ Summarize
//!                              stop condition ────┘
//!                                        │
//!                     stop receiver ──► uninstall hook (once) ──► final summary (once)
//! ```
//!
//! Stop conditions are an operator [`ControlEvent::Stop`], the hook
//! disconnecting, a broken transport, the target dying, or the optional
//! duration limit. Whatever ends the session, cleanup runs exactly once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::analysis::{QueryAnalyzer, RankedQuery, SharedAnalyzer};
use crate::collector::{receive_loop, CollectorListener, EndReason, ReceiveSummary};
use crate::display::{print_summary, LivePrinter};
use crate::domain::{OrderBy, Pid};
use crate::injection::{Injector, ProcessControl};

/// How often target liveness is checked.
pub const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

/// Typed session settings, built from the command line.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub pid: Pid,
    /// Print every record as it arrives
    pub tail: bool,
    /// Verbose logging inside the target
    pub verbose: bool,
    pub order_by: OrderBy,
    pub top_n: usize,
    /// Stop after this long (`None` = until another stop condition)
    pub duration: Option<Duration>,
}

/// Operator requests, delivered as messages from the signal listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// End the session (SIGINT, SIGTERM)
    Stop,
    /// Print the current summary and keep going (SIGUSR1)
    Summarize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Interrupted,
    TargetDisconnected,
    TransportBroken(String),
    TargetExited,
    DurationElapsed,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => f.write_str("interrupted"),
            Self::TargetDisconnected => f.write_str("target disconnected"),
            Self::TransportBroken(e) => write!(f, "transport broken ({e})"),
            Self::TargetExited => f.write_str("process exited"),
            Self::DurationElapsed => f.write_str("duration limit reached"),
        }
    }
}

impl From<EndReason> for ExitReason {
    fn from(end: EndReason) -> Self {
        match end {
            EndReason::Disconnected => Self::TargetDisconnected,
            EndReason::TransportBroken(e) => Self::TransportBroken(e),
            EndReason::Stopped => Self::Interrupted,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub exit_reason: ExitReason,
    pub records: u64,
    pub malformed: u64,
    pub elapsed: Duration,
    /// The final summary, as printed
    pub summary: Vec<RankedQuery>,
}

/// Everything that can end a session other than the receive task itself.
struct StopWatch<L> {
    pid: Pid,
    is_alive: L,
    events: mpsc::Receiver<ControlEvent>,
    events_open: bool,
    liveness: Interval,
    deadline: Option<Instant>,
    analyzer: SharedAnalyzer,
    order_by: OrderBy,
    top_n: usize,
}

impl<L: Fn(Pid) -> bool> StopWatch<L> {
    /// Wait for the next stop condition, serving summary requests meanwhile.
    ///
    /// Cancel-safe: every awaited future keeps its state across calls.
    async fn wait(&mut self) -> ExitReason {
        loop {
            let deadline = self.deadline;
            let limit = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                event = self.events.recv(), if self.events_open => match event {
                    Some(ControlEvent::Stop) => return ExitReason::Interrupted,
                    Some(ControlEvent::Summarize) => {
                        let ranked = self.analyzer.read().summarize(self.order_by, self.top_n);
                        print_summary(&ranked, self.order_by);
                    }
                    None => self.events_open = false,
                },
                _ = self.liveness.tick() => {
                    if !(self.is_alive)(self.pid) {
                        return ExitReason::TargetExited;
                    }
                }
                () = limit => return ExitReason::DurationElapsed,
            }
        }
    }
}

/// Run one session to completion.
///
/// `is_alive` reports target liveness; `events` carries operator requests.
///
/// # Errors
/// Startup failures only: binding the listener or attaching to the target.
/// Once the hook is installed every outcome is a [`SessionReport`].
pub async fn run_session<C, L>(
    config: SessionConfig,
    injector: Arc<Injector<C>>,
    events: mpsc::Receiver<ControlEvent>,
    is_alive: L,
) -> Result<SessionReport>
where
    C: ProcessControl + 'static,
    L: Fn(Pid) -> bool,
{
    let started = Instant::now();
    let pid = config.pid;
    let analyzer = QueryAnalyzer::shared();

    let listener = CollectorListener::bind().await.context("Failed to bind collector listener")?;
    let port = listener.port();

    let install = {
        let injector = Arc::clone(&injector);
        let verbose = config.verbose;
        tokio::task::spawn_blocking(move || injector.install(pid, port, verbose))
    };
    let report = install
        .await
        .context("Injection task failed")?
        .context("Failed to install hook")?;
    if report.is_clean() {
        info!("Hook injected into {pid}, waiting for it to connect");
    } else {
        warn!("Hook injection into {pid} reported errors, waiting for it to connect anyway");
    }

    let mut liveness = tokio::time::interval_at(started + LIVENESS_INTERVAL, LIVENESS_INTERVAL);
    liveness.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut watch = StopWatch {
        pid,
        is_alive,
        events,
        events_open: true,
        liveness,
        deadline: config.duration.map(|limit| started + limit),
        analyzer: Arc::clone(&analyzer),
        order_by: config.order_by,
        top_n: config.top_n,
    };

    let running = Arc::new(AtomicBool::new(true));
    let (exit_reason, received) = tokio::select! {
        accepted = listener.accept_once() => match accepted {
            Ok((stream, peer)) => {
                info!("Hook connected from {peer}, sniffing");
                let receiver = tokio::spawn(receive_loop(
                    stream,
                    Arc::clone(&analyzer),
                    live_printer(config.tail),
                    Arc::clone(&running),
                ));
                receive_until_stopped(receiver, &mut watch, &running, &analyzer).await
            }
            Err(e) => (ExitReason::TransportBroken(e.to_string()), ReceiveSummary::empty()),
        },
        reason = watch.wait() => {
            warn!("Session ended before the hook connected ({reason})");
            (reason, ReceiveSummary::empty())
        }
    };

    uninstall(&injector, pid, config.verbose, &watch.is_alive).await;

    let summary = analyzer.read().summarize(config.order_by, config.top_n);
    print_summary(&summary, config.order_by);

    Ok(SessionReport {
        exit_reason,
        records: received.records,
        malformed: received.malformed,
        elapsed: started.elapsed(),
        summary,
    })
}

async fn receive_until_stopped<L: Fn(Pid) -> bool>(
    mut receiver: JoinHandle<ReceiveSummary>,
    watch: &mut StopWatch<L>,
    running: &AtomicBool,
    analyzer: &SharedAnalyzer,
) -> (ExitReason, ReceiveSummary) {
    let finished = tokio::select! {
        joined = &mut receiver => Ok(joined),
        reason = watch.wait() => Err(reason),
    };

    let (reason, joined) = match finished {
        Ok(joined) => (None, joined),
        Err(reason) => {
            running.store(false, Ordering::Release);
            (Some(reason), receiver.await)
        }
    };

    let received = joined.unwrap_or_else(|e| {
        error!("Receive task failed: {e}");
        ReceiveSummary {
            records: analyzer.read().total_records(),
            malformed: 0,
            end: EndReason::TransportBroken(e.to_string()),
        }
    });
    let reason = reason.unwrap_or_else(|| received.end.clone().into());
    (reason, received)
}

/// Tail output on its own thread; without it the session still profiles.
fn live_printer(tail: bool) -> Option<LivePrinter> {
    if !tail {
        return None;
    }
    LivePrinter::stdout()
        .map_err(|e| warn!("Tail output unavailable, continuing without it: {e}"))
        .ok()
}

/// Remove the hook, exactly once per session. Failures are logged only.
///
/// Removal is attempted even when the target looks dead: liveness is only a
/// signal check, and a PID that fails it may still be running the hook.
async fn uninstall<C, L>(injector: &Arc<Injector<C>>, pid: Pid, verbose: bool, is_alive: &L)
where
    C: ProcessControl + 'static,
    L: Fn(Pid) -> bool,
{
    let target_gone = !is_alive(pid);
    if target_gone {
        debug!("{pid} looks gone, attempting hook removal anyway");
    }

    let injector = Arc::clone(injector);
    match tokio::task::spawn_blocking(move || injector.uninstall(pid, verbose)).await {
        Ok(Ok(report)) if report.is_clean() => info!("Hook removed from {pid}"),
        Ok(Ok(_)) => warn!("Hook removal from {pid} reported errors"),
        Ok(Err(e)) if target_gone => warn!("Could not remove hook from exited target {pid}: {e}"),
        Ok(Err(e)) => error!("Failed to remove hook: {e}"),
        Err(e) => error!("Uninstall task failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_reason_from_end_reason() {
        assert_eq!(ExitReason::from(EndReason::Disconnected), ExitReason::TargetDisconnected);
        assert_eq!(
            ExitReason::from(EndReason::TransportBroken("reset".into())),
            ExitReason::TransportBroken("reset".into())
        );
    }

    #[test]
    fn test_exit_reason_display() {
        assert_eq!(ExitReason::TargetExited.to_string(), "process exited");
        assert_eq!(ExitReason::TransportBroken("eof".into()).to_string(), "transport broken (eof)");
    }

    #[tokio::test]
    async fn test_stop_watch_serves_summaries_until_stop() {
        let (tx, rx) = mpsc::channel(4);
        let analyzer = QueryAnalyzer::shared();
        analyzer.write().record_query("SELECT 1", 0.1);
        let mut watch = StopWatch {
            pid: Pid(1),
            is_alive: |_: Pid| true,
            events: rx,
            events_open: true,
            liveness: tokio::time::interval(Duration::from_millis(10)),
            deadline: None,
            analyzer,
            order_by: OrderBy::Count,
            top_n: 5,
        };

        tx.send(ControlEvent::Summarize).await.unwrap();
        tx.send(ControlEvent::Stop).await.unwrap();
        assert_eq!(watch.wait().await, ExitReason::Interrupted);
    }

    #[tokio::test]
    async fn test_stop_watch_detects_dead_target_and_deadline() {
        let (_tx, rx) = mpsc::channel(1);
        let mut watch = StopWatch {
            pid: Pid(1),
            is_alive: |_: Pid| false,
            events: rx,
            events_open: true,
            liveness: tokio::time::interval(Duration::from_millis(10)),
            deadline: None,
            analyzer: QueryAnalyzer::shared(),
            order_by: OrderBy::MaxDuration,
            top_n: 5,
        };
        assert_eq!(watch.wait().await, ExitReason::TargetExited);

        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let mut watch = StopWatch {
            pid: Pid(1),
            is_alive: |_: Pid| true,
            events: rx,
            events_open: true,
            liveness: tokio::time::interval(Duration::from_secs(60)),
            deadline: Some(Instant::now() + Duration::from_millis(50)),
            analyzer: QueryAnalyzer::shared(),
            order_by: OrderBy::MaxDuration,
            top_n: 5,
        };
        // A closed event channel is not a stop request
        assert_eq!(watch.wait().await, ExitReason::DurationElapsed);
    }
}

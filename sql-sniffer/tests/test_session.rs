//! End-to-end sessions against an in-process target.
//!
//! The process control backend here applies payloads straight to a
//! `HookRuntime` instead of going through a debugger, so the full path
//! (listener, injection, hook, transport, analyzer, cleanup) runs inside
//! the test process.

use parking_lot::Mutex;
use serde_json::Value;
use sql_sniffer::domain::{ControlError, OrderBy, Pid};
use sql_sniffer::injection::{Debugger, Evaluation, Injector, ProcessControl};
use sql_sniffer::lifecycle::{run_session, ControlEvent, ExitReason, SessionConfig};
use sql_sniffer_common::{Directive, Payload};
use sql_sniffer_hook::{ExtensionPoint, HookRuntime, QueryExecutor, SharedExecutor};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

struct FakeDb;

impl QueryExecutor for FakeDb {
    fn execute(&self, query: &str, _params: Option<&[Value]>) -> anyhow::Result<Value> {
        if query.contains("JOIN") {
            thread::sleep(Duration::from_millis(3));
        }
        Ok(Value::from(1))
    }

    fn execute_many(&self, _query: &str, param_list: &[Vec<Value>]) -> anyhow::Result<Value> {
        Ok(Value::from(param_list.len()))
    }
}

/// Applies payloads directly to a runtime living in this process.
struct InProcessControl {
    runtime: Arc<HookRuntime>,
    stderr: &'static str,
    fail_attach: Arc<AtomicBool>,
    directives: Mutex<Vec<Directive>>,
}

impl InProcessControl {
    fn new(runtime: Arc<HookRuntime>) -> Self {
        Self {
            runtime,
            stderr: "",
            fail_attach: Arc::new(AtomicBool::new(false)),
            directives: Mutex::new(Vec::new()),
        }
    }

    fn directives(&self) -> Vec<Directive> {
        self.directives.lock().clone()
    }
}

impl ProcessControl for InProcessControl {
    type Session = ();

    fn attach(&self, pid: Pid) -> Result<(), ControlError> {
        if self.fail_attach.load(Ordering::Relaxed) {
            return Err(ControlError::ProcessNotFound(pid));
        }
        Ok(())
    }

    fn evaluate(&self, _session: &mut (), code: &str) -> Result<Evaluation, ControlError> {
        let path: PathBuf = code
            .strip_prefix("sql_sniffer_eval(\"")
            .and_then(|rest| rest.strip_suffix("\")"))
            .expect("unexpected entry invocation")
            .into();
        let payload: Payload = std::fs::read_to_string(path).unwrap().parse().unwrap();
        self.directives.lock().push(payload.directive);

        let entry = if self.runtime.apply(&payload).is_ok() { 0 } else { -2 };
        Ok(Evaluation {
            status: Some(0),
            stdout: format!("$1 = {entry}\n").into_bytes(),
            stderr: self.stderr.as_bytes().to_vec(),
        })
    }

    fn detach(&self, _session: ()) {}

    fn entry_return(&self, evaluation: &Evaluation) -> Option<i32> {
        Debugger::Gdb.parse_return(&evaluation.stdout_text())
    }
}

/// A target: an extension point plus threads issuing queries through it.
struct Target {
    original: SharedExecutor,
    point: Arc<ExtensionPoint>,
    runtime: Arc<HookRuntime>,
    stop: Arc<AtomicBool>,
    workload: Option<thread::JoinHandle<()>>,
}

impl Target {
    fn start() -> Self {
        let original: SharedExecutor = Arc::new(FakeDb);
        let point = Arc::new(ExtensionPoint::new("db.cursor", Arc::clone(&original)));
        let runtime = Arc::new(
            HookRuntime::new(Arc::clone(&point)).with_dequeue_wait(Duration::from_millis(50)),
        );
        let stop = Arc::new(AtomicBool::new(false));

        let workload = {
            let point = Arc::clone(&point);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let _ = point.execute("SELECT 1", None);
                    let _ = point.execute("SELECT * FROM a JOIN b ON a.id = b.id", None);
                    thread::sleep(Duration::from_millis(2));
                }
            })
        };

        Self { original, point, runtime, stop, workload: Some(workload) }
    }

    fn is_restored(&self) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if self.point.is_current(&self.original) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

impl Drop for Target {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.runtime.shutdown();
        if let Some(workload) = self.workload.take() {
            let _ = workload.join();
        }
    }
}

fn config() -> SessionConfig {
    SessionConfig {
        pid: Pid(4242),
        tail: false,
        verbose: true,
        order_by: OrderBy::MaxDuration,
        top_n: 5,
        duration: None,
    }
}

fn stop_after(tx: mpsc::Sender<ControlEvent>, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(ControlEvent::Summarize).await;
        let _ = tx.send(ControlEvent::Stop).await;
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_event_uninstalls_once_and_summarizes() {
    let target = Target::start();
    let injector = Arc::new(Injector::new(InProcessControl::new(Arc::clone(&target.runtime))));
    let (tx, rx) = mpsc::channel(4);
    stop_after(tx, Duration::from_millis(800));

    let report = run_session(config(), Arc::clone(&injector), rx, |_| true).await.unwrap();

    assert_eq!(report.exit_reason, ExitReason::Interrupted);
    assert!(report.records > 0);
    assert_eq!(report.malformed, 0);
    assert_eq!(report.summary.len(), 2);
    assert_eq!(report.summary[0].query, "SELECT * FROM a JOIN b ON a.id = b.id");
    assert_eq!(injector.control().directives(), [Directive::Start, Directive::Stop]);
    assert!(target.is_restored());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hook_disconnect_ends_session() {
    let target = Target::start();
    let injector = Arc::new(Injector::new(InProcessControl::new(Arc::clone(&target.runtime))));
    let (_tx, rx) = mpsc::channel(4);

    // The hook goes away on its own, as when the target tears it down
    let runtime = Arc::clone(&target.runtime);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        tokio::task::spawn_blocking(move || runtime.shutdown()).await.unwrap();
    });

    let report = run_session(config(), Arc::clone(&injector), rx, |_| true).await.unwrap();

    assert_eq!(report.exit_reason, ExitReason::TargetDisconnected);
    assert!(report.records > 0);
    // Removal is still attempted; the hook treats it as a no-op
    assert_eq!(injector.control().directives(), [Directive::Start, Directive::Stop]);
    assert!(target.is_restored());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dead_target_still_gets_uninstall_attempt() {
    let target = Target::start();
    let injector = Arc::new(Injector::new(InProcessControl::new(Arc::clone(&target.runtime))));
    let (_tx, rx) = mpsc::channel(4);
    let alive = Arc::new(AtomicBool::new(true));

    let flag = Arc::clone(&alive);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        flag.store(false, Ordering::Relaxed);
    });

    // Liveness reports the PID gone while the hook is in fact still running
    let liveness = Arc::clone(&alive);
    let is_alive = move |_: Pid| liveness.load(Ordering::Relaxed);
    let report = run_session(config(), Arc::clone(&injector), rx, is_alive).await.unwrap();

    assert_eq!(report.exit_reason, ExitReason::TargetExited);
    assert_eq!(injector.control().directives(), [Directive::Start, Directive::Stop]);
    assert!(target.is_restored());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_uninstall_failure_on_dead_target_is_not_fatal() {
    let target = Target::start();
    let control = InProcessControl::new(Arc::clone(&target.runtime));
    let attach_fails = Arc::clone(&control.fail_attach);
    let injector = Arc::new(Injector::new(control));
    let (_tx, rx) = mpsc::channel(4);
    let alive = Arc::new(AtomicBool::new(true));

    // The target really exits: the hook goes away, liveness drops, attach fails
    let flag = Arc::clone(&alive);
    let runtime = Arc::clone(&target.runtime);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        attach_fails.store(true, Ordering::Relaxed);
        flag.store(false, Ordering::Relaxed);
        tokio::task::spawn_blocking(move || runtime.shutdown()).await.unwrap();
    });

    let liveness = Arc::clone(&alive);
    let is_alive = move |_: Pid| liveness.load(Ordering::Relaxed);
    let report = run_session(config(), Arc::clone(&injector), rx, is_alive).await.unwrap();

    assert!(matches!(
        report.exit_reason,
        ExitReason::TargetExited | ExitReason::TargetDisconnected
    ));
    assert!(report.records > 0);
    // Removal was attempted and failed at attach, before any payload ran
    assert_eq!(injector.control().directives(), [Directive::Start]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unclean_injection_still_accepts() {
    let target = Target::start();
    let mut control = InProcessControl::new(Arc::clone(&target.runtime));
    control.stderr = "warning: Unable to find libthread_db matching inferior's thread library\n";
    let injector = Arc::new(Injector::new(control));
    let (tx, rx) = mpsc::channel(4);
    stop_after(tx, Duration::from_millis(500));

    let report = run_session(config(), Arc::clone(&injector), rx, |_| true).await.unwrap();

    assert_eq!(report.exit_reason, ExitReason::Interrupted);
    assert!(report.records > 0);
    assert!(target.is_restored());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duration_limit_ends_session() {
    let target = Target::start();
    let injector = Arc::new(Injector::new(InProcessControl::new(Arc::clone(&target.runtime))));
    let (_tx, rx) = mpsc::channel(4);
    let config = SessionConfig {
        order_by: OrderBy::Count,
        top_n: 1,
        duration: Some(Duration::from_millis(400)),
        ..config()
    };

    let report = run_session(config, Arc::clone(&injector), rx, |_| true).await.unwrap();

    assert_eq!(report.exit_reason, ExitReason::DurationElapsed);
    assert_eq!(report.summary.len(), 1);
    assert!(target.is_restored());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_attach_failure_is_fatal() {
    let target = Target::start();
    let control = InProcessControl::new(Arc::clone(&target.runtime));
    control.fail_attach.store(true, Ordering::Relaxed);
    let (_tx, rx) = mpsc::channel(4);

    let injector = Arc::new(Injector::new(control));
    let err = run_session(config(), injector, rx, |_| true).await.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to install hook"));
    assert!(!target.runtime.is_active());
}

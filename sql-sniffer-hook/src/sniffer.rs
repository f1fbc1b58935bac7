//! Hook installation lifecycle.
//!
//! A [`Sniffer`] is one installation: connection + patch + forwarding thread.
//! [`HookRuntime`] owns the host's extension point and at most one active
//! installation, and applies injected payloads to it.

use parking_lot::Mutex;
use sql_sniffer_common::{Directive, Payload, PayloadError, LOOPBACK_HOST};
use std::net::TcpStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::errors::HookError;
use crate::executor::ExtensionPoint;
use crate::forwarder::Forwarder;
use crate::patch::Patch;
use crate::timing::TimingExecutor;

/// How long the forwarder blocks on an empty queue before re-checking its
/// running flag. Also the upper bound on how long a `stop` takes to restore
/// the original executor.
pub const DEFAULT_DEQUEUE_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct SnifferConfig {
    /// Collector port on the loopback interface
    pub port: u16,
    pub verbose: bool,
    pub dequeue_wait: Duration,
}

/// One active installation of the timing hook.
pub struct Sniffer {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    port: u16,
}

impl Sniffer {
    /// Connect to the collector, install the timing wrapper, and start the
    /// forwarding thread.
    ///
    /// The connection is made before patching, so a refused connection leaves
    /// the host untouched.
    ///
    /// # Errors
    /// `Connect` if the collector is not listening, `Spawn` if the thread
    /// cannot be created (the patch is rolled back in that case).
    pub fn start(point: &Arc<ExtensionPoint>, config: SnifferConfig) -> Result<Self, HookError> {
        hook_log!(config.verbose, "Connecting to collector on port {}", config.port);
        let conn = TcpStream::connect((LOOPBACK_HOST, config.port))
            .map_err(|source| HookError::Connect { port: config.port, source })?;
        let _ = conn.set_nodelay(true);

        let (tx, rx) = crossbeam_channel::unbounded();
        hook_log!(config.verbose, "Wrapping query executor at '{}'", point.name());
        let patch = Patch::apply(point, |inner| Arc::new(TimingExecutor::new(inner, tx)));

        let running = Arc::new(AtomicBool::new(true));
        let forwarder = Forwarder::new(
            conn,
            rx,
            Arc::clone(&running),
            patch,
            config.dequeue_wait,
            config.verbose,
        );

        // On spawn failure the closure (and the forwarder) is dropped, which
        // rolls the patch back.
        let handle = thread::Builder::new()
            .name("sql-sniffer-forwarder".to_string())
            .spawn(move || forwarder.run())
            .map_err(HookError::Spawn)?;

        Ok(Self { running, handle: Some(handle), port: config.port })
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the forwarder is still streaming.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the forwarder to stop. It observes the flag within one dequeue
    /// wait, then closes the connection and restores the original executor.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Wait for the forwarding thread to exit.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Forwarding thread panicked (executor was restored on unwind)");
            }
        }
    }
}

/// Owns the host's extension point and at most one [`Sniffer`].
pub struct HookRuntime {
    point: Arc<ExtensionPoint>,
    active: Mutex<Option<Sniffer>>,
    dequeue_wait: Duration,
}

impl HookRuntime {
    #[must_use]
    pub fn new(point: Arc<ExtensionPoint>) -> Self {
        Self { point, active: Mutex::new(None), dequeue_wait: DEFAULT_DEQUEUE_WAIT }
    }

    #[must_use]
    pub fn with_dequeue_wait(mut self, dequeue_wait: Duration) -> Self {
        self.dequeue_wait = dequeue_wait;
        self
    }

    #[must_use]
    pub fn point(&self) -> &Arc<ExtensionPoint> {
        &self.point
    }

    /// Whether an installation is currently streaming.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.lock().as_ref().is_some_and(Sniffer::is_running)
    }

    /// Apply a parsed payload.
    ///
    /// `start` while already streaming is ignored. `stop` while idle is a
    /// no-op, so repeated removal is harmless.
    ///
    /// # Errors
    /// See [`Sniffer::start`]; `Payload(MissingPort)` for a portless start.
    pub fn apply(&self, payload: &Payload) -> Result<(), HookError> {
        let mut active = self.active.lock();

        match payload.directive {
            Directive::Start => {
                if let Some(previous) = active.take() {
                    if previous.is_running() {
                        hook_log!(
                            payload.verbose,
                            "Already streaming to port {}, ignoring start",
                            previous.port()
                        );
                        *active = Some(previous);
                        return Ok(());
                    }
                    // A stopped forwarder must finish its rollback before we
                    // wrap again, or we would wrap its wrapper.
                    previous.stop();
                    previous.join();
                }

                let port = payload.port.ok_or(PayloadError::MissingPort)?;
                let config = SnifferConfig {
                    port,
                    verbose: payload.verbose,
                    dequeue_wait: self.dequeue_wait,
                };
                *active = Some(Sniffer::start(&self.point, config)?);
            }
            Directive::Stop => match active.as_ref() {
                Some(sniffer) => {
                    hook_log!(payload.verbose, "Stopping forwarder");
                    sniffer.stop();
                }
                None => hook_log!(payload.verbose, "Stop requested but hook is not installed"),
            },
        }
        Ok(())
    }

    /// Read, parse and apply a payload file.
    ///
    /// # Errors
    /// `ReadPayload`, `Payload`, or anything from [`HookRuntime::apply`].
    pub fn apply_file(&self, path: &Path) -> Result<(), HookError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| HookError::ReadPayload { path: path.to_path_buf(), source })?;
        let payload = Payload::parse(&text)?;
        self.apply(&payload)
    }

    /// Stop any installation and wait for its forwarder to restore the
    /// original executor.
    pub fn shutdown(&self) {
        if let Some(sniffer) = self.active.lock().take() {
            sniffer.stop();
            sniffer.join();
        }
    }
}

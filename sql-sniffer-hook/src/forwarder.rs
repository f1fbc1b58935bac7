//! Background forwarding task: drains the record queue onto the connection.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use sql_sniffer_common::{wire, TelemetryRecord, WireError};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::patch::Patch;

/// Owns the consumer side of the queue, the connection, and the patch.
///
/// Whatever way the forwarder ends (stop flag, closed peer, write error,
/// panic), the patch is rolled back: `run` does it explicitly and `Drop`
/// covers unwinding.
pub(crate) struct Forwarder<W: Write> {
    conn: W,
    queue: Receiver<TelemetryRecord>,
    running: Arc<AtomicBool>,
    patch: Patch,
    dequeue_wait: Duration,
    verbose: bool,
}

impl<W: Write> Forwarder<W> {
    pub(crate) fn new(
        conn: W,
        queue: Receiver<TelemetryRecord>,
        running: Arc<AtomicBool>,
        patch: Patch,
        dequeue_wait: Duration,
        verbose: bool,
    ) -> Self {
        Self { conn, queue, running, patch, dequeue_wait, verbose }
    }

    pub(crate) fn run(mut self) {
        hook_log!(self.verbose, "Forwarder started");

        while self.running.load(Ordering::Acquire) {
            match self.queue.recv_timeout(self.dequeue_wait) {
                Ok(record) => match wire::write_record(&mut self.conn, &record) {
                    Ok(()) => {}
                    Err(WireError::Io(e)) => {
                        if is_peer_closed(&e) {
                            hook_log!(self.verbose, "Collector closed the connection, exiting");
                        } else {
                            log::warn!("Unexpected error while streaming query: {e}");
                        }
                        break;
                    }
                    // Encoding failed before any byte was written; the stream is still in sync
                    Err(e) => log::warn!("Dropping query record: {e}"),
                },
                Err(RecvTimeoutError::Timeout) => {
                    log::trace!("No query executions in the last {:?}", self.dequeue_wait);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.running.store(false, Ordering::Release);
        if self.patch.rollback() {
            hook_log!(self.verbose, "Original query executor restored");
        }
        hook_log!(self.verbose, "Forwarder done");
        // Connection closes when `self` drops
    }
}

impl<W: Write> Drop for Forwarder<W> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.patch.rollback();
    }
}

fn is_peer_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::WriteZero
    )
}

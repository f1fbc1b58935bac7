//! Operator signals, forwarded to the session as [`ControlEvent`] messages.
//!
//! - SIGINT (Ctrl+C), SIGTERM: stop the session
//! - SIGUSR1: print the current summary and keep sniffing
//!
//! Nothing runs in signal context: tokio's signal driver wakes a task that
//! only sends on the channel.

use anyhow::{Context, Result};
use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::ControlEvent;

/// Channel depth; events are tiny and drained promptly.
pub const EVENT_CHANNEL_DEPTH: usize = 16;

/// Start forwarding operator signals to `events`.
///
/// The task ends once the receiving side is dropped.
///
/// # Errors
/// Returns an error if a signal handler cannot be registered.
#[cfg(unix)]
pub fn spawn_signal_listener(events: mpsc::Sender<ControlEvent>) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    let mut summarize =
        signal(SignalKind::user_defined1()).context("Failed to register SIGUSR1 handler")?;

    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = interrupt.recv() => {
                    debug!("Received SIGINT");
                    ControlEvent::Stop
                }
                _ = terminate.recv() => {
                    debug!("Received SIGTERM");
                    ControlEvent::Stop
                }
                _ = summarize.recv() => {
                    debug!("Received SIGUSR1");
                    ControlEvent::Summarize
                }
            };
            if events.send(event).await.is_err() {
                break;
            }
        }
    }))
}

/// Start forwarding Ctrl+C to `events`.
///
/// # Errors
/// Infallible on this platform; kept for a uniform signature.
#[cfg(not(unix))]
pub fn spawn_signal_listener(events: mpsc::Sender<ControlEvent>) -> Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("Received Ctrl+C");
            if events.send(ControlEvent::Stop).await.is_err() {
                break;
            }
        }
    }))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sigusr1_becomes_summarize() {
        let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);
        let listener = spawn_signal_listener(tx).unwrap();

        #[allow(unsafe_code)]
        // SAFETY: raising a signal we have a handler registered for
        unsafe {
            libc::raise(libc::SIGUSR1);
        }

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(event, Some(ControlEvent::Summarize));
        listener.abort();
    }
}

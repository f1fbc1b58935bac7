//! Framed receive loop.
//!
//! Reads length-delimited telemetry frames, decodes each body and folds it
//! into the shared analyzer. Each read is bounded by [`RECEIVE_POLL`] so the
//! running flag is observed promptly even when the target is idle. Tail
//! lines go to a [`LivePrinter`] and are never written from this task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use log::{debug, warn};
use sql_sniffer_common::wire::{self, LENGTH_PREFIX_LEN, MAX_FRAME_LEN};
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};

use crate::analysis::SharedAnalyzer;
use crate::display::LivePrinter;

/// Upper bound on a single read before re-checking the running flag.
pub const RECEIVE_POLL: Duration = Duration::from_millis(100);

/// Why the receive loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The running flag was cleared
    Stopped,
    /// The hook closed the connection on a frame boundary
    Disconnected,
    /// Read error or framing violation
    TransportBroken(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveSummary {
    pub records: u64,
    pub malformed: u64,
    pub end: EndReason,
}

impl ReceiveSummary {
    /// Nothing received (the hook never connected).
    #[must_use]
    pub fn empty() -> Self {
        Self { records: 0, malformed: 0, end: EndReason::Stopped }
    }
}

fn telemetry_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .big_endian()
        .length_field_length(LENGTH_PREFIX_LEN)
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

/// Receive records until the peer disconnects, the transport breaks or
/// `running` is cleared. With `live` set, every record is also shown in
/// tail mode.
pub async fn receive_loop<R>(
    reader: R,
    analyzer: SharedAnalyzer,
    mut live: Option<LivePrinter>,
    running: Arc<AtomicBool>,
) -> ReceiveSummary
where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(reader, telemetry_codec());
    let mut records = 0;
    let mut malformed = 0;

    let end = loop {
        if !running.load(Ordering::Acquire) {
            break EndReason::Stopped;
        }

        let frame = match tokio::time::timeout(RECEIVE_POLL, frames.next()).await {
            Err(_) => continue,
            Ok(None) => break EndReason::Disconnected,
            Ok(Some(Err(e))) => break EndReason::TransportBroken(e.to_string()),
            Ok(Some(Ok(frame))) => frame,
        };

        match wire::decode_body(&frame) {
            Ok(record) => {
                records += 1;
                let stats = analyzer.write().record_query(&record.query_text, record.duration);
                if let Some(printer) = live.as_mut() {
                    printer.show(&record.query_text, record.duration, &stats);
                }
            }
            Err(e) => {
                malformed += 1;
                warn!("Dropping record: {e}");
            }
        }
    };

    debug!("Receive loop ended ({end:?}) after {records} records, {malformed} malformed");
    if let Some(printer) = live {
        printer.finish().await;
    }
    ReceiveSummary { records, malformed, end }
}

//! # Shared Data Structures (Target ↔ Collector)
//!
//! Defines the data structures and formats shared between the in-target hook
//! (`sql-sniffer-hook`) and the collector (`sql-sniffer`). Both sides link this
//! crate, so the wire and payload formats cannot drift apart.
//!
//! ## Key Types
//!
//! - [`TelemetryRecord`] - One observed query execution, streamed target → collector
//! - [`wire`] - Length-delimited frame codec for telemetry records
//! - [`Payload`] - Directive text the injector hands to the target
//!
//! ## Data Flow
//!
//! ```text
//! collector                                  target
//! ─────────                                  ──────
//! Payload::render() ──(debugger eval)──▶ Payload::parse()
//!                                            │
//! wire::decode_body() ◀──(TCP frames)── wire::write_record()
//! ```

pub mod payload;
pub mod wire;

pub use payload::{Directive, Payload, PayloadError};
pub use wire::WireError;

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Symbol name of the C-ABI entry point the debugger calls inside the target.
///
/// The injector embeds this name in the evaluated expression; the hook crate
/// exports a function with exactly this name.
pub const EVAL_ENTRY_SYMBOL: &str = "sql_sniffer_eval";

/// Address the collector listens on and the hook connects to.
///
/// Localhost only: the transport carries no authentication.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Return codes of the evaluation entry point, as printed by the debugger.
pub const EVAL_OK: i32 = 0;
/// Null or non-UTF-8 payload path
pub const EVAL_BAD_ARGUMENT: i32 = -1;
/// Payload could not be read, parsed or applied
pub const EVAL_FAILED: i32 = -2;
/// Applying the payload panicked (caught at the FFI boundary)
pub const EVAL_PANICKED: i32 = -3;

/// Human-readable meaning of an evaluation entry return code.
#[must_use]
pub fn describe_eval_status(code: i32) -> &'static str {
    match code {
        EVAL_OK => "ok",
        EVAL_BAD_ARGUMENT => "bad payload path argument",
        EVAL_FAILED => "payload rejected by the hook (see target's log)",
        EVAL_PANICKED => "hook panicked while applying the payload",
        _ => "unknown status (is the hook linked into the target?)",
    }
}

// ============================================================================
// Telemetry Record
// ============================================================================

/// One observation of a single executed query.
///
/// Created once in the target when the wrapped execution call finishes
/// (successfully or not), consumed once by the collector's analyzer.
///
/// **Wire form**: `{"sql": "<query text>", "duration": <seconds>}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// The exact query string as executed (not parameter-substituted)
    #[serde(rename = "sql")]
    pub query_text: String,

    /// Elapsed wall-clock seconds measured around the execution call
    ///
    /// Always finite and non-negative; inclusive of failed executions.
    pub duration: f64,
}

impl TelemetryRecord {
    #[must_use]
    pub fn new(query_text: impl Into<String>, duration: f64) -> Self {
        Self { query_text: query_text.into(), duration }
    }

    /// Build a record from a measured elapsed time.
    #[must_use]
    pub fn from_elapsed(query_text: impl Into<String>, elapsed: Duration) -> Self {
        Self::new(query_text, elapsed.as_secs_f64())
    }

    /// Whether `duration` is something the collector will accept.
    #[must_use]
    pub fn has_valid_duration(&self) -> bool {
        self.duration.is_finite() && self.duration >= 0.0
    }
}

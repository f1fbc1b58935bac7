//! # sql-sniffer-hook - In-Target Query Interception
//!
//! Linked into the host application. The host dispatches every query through
//! an [`ExtensionPoint`]; when the collector injects a `start` payload, the
//! hook substitutes a timing wrapper at that point and streams one
//! [`TelemetryRecord`](sql_sniffer_common::TelemetryRecord) per execution back
//! to the collector. A `stop` payload (or a closed connection) restores the
//! original executor.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────── host threads ────────────────┐
//! │ ExtensionPoint::execute()                    │
//! │        │                                     │
//! │        ▼                                     │
//! │  TimingExecutor ──▶ original QueryExecutor   │
//! │        │ (drop guard, never blocks)          │
//! └────────┼─────────────────────────────────────┘
//!          ▼ crossbeam unbounded queue
//! ┌──────────────── forwarder thread ────────────┐
//! │ recv_timeout(5s) ──▶ wire::write_record()    │──TCP──▶ collector
//! │ on exit: Patch::rollback()                   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Host Integration
//!
//! ```no_run
//! use std::sync::Arc;
//! use sql_sniffer_hook::{host, ExtensionPoint, QueryExecutor};
//! # use serde_json::Value;
//! # struct Db;
//! # impl QueryExecutor for Db {
//! #     fn execute(&self, _: &str, _: Option<&[Value]>) -> anyhow::Result<Value> {
//! #         Ok(Value::Null)
//! #     }
//! #     fn execute_many(&self, _: &str, _: &[Vec<Value>]) -> anyhow::Result<Value> {
//! #         Ok(Value::Null)
//! #     }
//! # }
//!
//! let point = Arc::new(ExtensionPoint::new("db.cursor", Arc::new(Db)));
//! host::register(Arc::clone(&point)).unwrap();
//! point.execute("SELECT 1", None).unwrap();
//! ```
//!
//! The debugger then calls the exported `sql_sniffer_eval(path)` entry.

/// Log at `info` when the payload asked for verbose output, else `debug`.
macro_rules! hook_log {
    ($verbose:expr, $($arg:tt)+) => {
        log::log!(
            if $verbose { log::Level::Info } else { log::Level::Debug },
            $($arg)+
        )
    };
}

pub mod errors;
pub mod executor;
mod forwarder;
pub mod host;
pub mod patch;
pub mod sniffer;
pub mod timing;

pub use errors::HookError;
pub use executor::{ExtensionPoint, QueryExecutor, SharedExecutor};
pub use patch::Patch;
pub use sniffer::{HookRuntime, Sniffer, SnifferConfig};
pub use timing::TimingExecutor;

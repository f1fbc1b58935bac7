//! Collector side of the telemetry transport
//!
//! - `listener`: loopback listener that accepts exactly one hook connection
//! - `receiver`: framed receive loop feeding the analyzer

pub mod listener;
pub mod receiver;

pub use listener::CollectorListener;
pub use receiver::{receive_loop, EndReason, ReceiveSummary, RECEIVE_POLL};

//! Structured error types for sql-sniffer
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::Pid;
use thiserror::Error;

/// Failures reported by a process control backend.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Process {0} not found")]
    ProcessNotFound(Pid),

    #[error("Process control unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of one injection round trip.
///
/// An unclean evaluation (non-zero exit, error output) is not an error here;
/// it is reported through `InjectionReport` so the caller can decide.
#[derive(Error, Debug)]
pub enum InjectionError {
    #[error("Failed to attach to {pid}: {source}")]
    Attach {
        pid: Pid,
        #[source]
        source: ControlError,
    },

    #[error("Failed to evaluate payload in {pid}: {source}")]
    Evaluation {
        pid: Pid,
        #[source]
        source: ControlError,
    },

    #[error("Failed to write payload file: {0}")]
    Payload(#[from] std::io::Error),
}

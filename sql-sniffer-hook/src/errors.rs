//! Structured error types for the in-target hook

use sql_sniffer_common::PayloadError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HookError {
    #[error("No extension point registered; the host must call host::register() at startup")]
    NotRegistered,

    #[error("An extension point is already registered in this process")]
    AlreadyRegistered,

    #[error("Failed to connect to collector on port {port}: {source}")]
    Connect {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Failed to spawn forwarding thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("Failed to read payload {}: {source}", path.display())]
    ReadPayload {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid payload: {0}")]
    Payload(#[from] PayloadError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_display() {
        let err = HookError::Connect {
            port: 4242,
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(err.to_string().contains("port 4242"));
    }

    #[test]
    fn test_payload_error_wraps() {
        let err = HookError::from(PayloadError::MissingDirective);
        assert!(err.to_string().starts_with("Invalid payload"));
    }
}

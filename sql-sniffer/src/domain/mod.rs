//! Domain model for sql-sniffer
//!
//! Newtypes and enums shared by every layer, plus the structured errors of
//! the injection path.

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{OrderBy, Pid};

pub use errors::{ControlError, InjectionError};

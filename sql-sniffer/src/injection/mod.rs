//! Out-of-process injection
//!
//! - `control`: the process control boundary (attach / evaluate / detach)
//! - `debugger`: gdb / lldb backed implementation of that boundary
//! - `injector`: builds payloads and drives one control round trip per call

pub mod control;
pub mod debugger;
pub mod injector;

pub use control::{Evaluation, ProcessControl};
pub use debugger::{Debugger, DebuggerControl};
pub use injector::{entry_invocation, InjectionReport, Injector};

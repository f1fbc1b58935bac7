//! Pre-flight checks for sql-sniffer
//!
//! Validates that the target can be attached to before binding a port and
//! injecting anything. Provides clear, actionable error messages when
//! requirements aren't met.

use anyhow::{bail, Result};
use std::path::Path;

use crate::domain::Pid;
use crate::injection::DebuggerControl;
use crate::process_lookup::is_process_alive;

const PTRACE_SCOPE_PATH: &str = "/proc/sys/kernel/yama/ptrace_scope";

/// Run all pre-flight checks before injection
pub fn run_preflight_checks(pid: Pid, control: &DebuggerControl, quiet: bool) -> Result<()> {
    check_process_exists(pid)?;
    check_debugger_available(control)?;
    check_ptrace_scope(Path::new(PTRACE_SCOPE_PATH), is_root(), quiet)?;
    Ok(())
}

#[allow(unsafe_code)]
fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

/// Check if the target process exists
pub fn check_process_exists(pid: Pid) -> Result<()> {
    if !is_process_alive(pid) {
        bail!(
            "Process {} not found.\n\n\
             Is the process still running? Check with: ps -p {}",
            pid.0,
            pid.0
        );
    }
    Ok(())
}

/// Check that the debugger used for injection is installed
fn check_debugger_available(control: &DebuggerControl) -> Result<()> {
    if !control.is_available() {
        let program = control.debugger().program();
        bail!(
            "{program} not found on PATH.\n\n\
             sql-sniffer uses {program} to run the hook entry inside the target.\n\
             Install it with your package manager and try again."
        );
    }
    Ok(())
}

/// Check the Yama ptrace policy (Linux only; absent elsewhere)
fn check_ptrace_scope(path: &Path, root: bool, quiet: bool) -> Result<()> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Ok(());
    };
    let scope: u8 = contents.trim().parse().unwrap_or(0);

    match scope {
        3 => bail!(
            "Permission denied: ptrace attach is disabled system-wide ({} = 3).\n\n\
             This setting can only be changed by rebooting.",
            path.display()
        ),
        2 if !root => bail!(
            "Permission denied: attaching requires CAP_SYS_PTRACE ({} = 2).\n\n\
             Run with: sudo sql-sniffer ...",
            path.display()
        ),
        1 if !root && !quiet => {
            eprintln!(
                "warning: {} = 1, attaching to a non-child process may fail without sudo",
                path.display()
            );
        }
        _ => {}
    }
    Ok(())
}

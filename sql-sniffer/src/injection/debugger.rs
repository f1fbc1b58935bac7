//! Debugger-backed process control.
//!
//! Runs the debugger in batch mode: it attaches, calls the hook's C-ABI entry
//! inside the target, prints the return value and detaches on exit.
//!
//! - Linux: `gdb -p <pid> -batch -ex 'call (int) <code>'`
//! - macOS: `lldb -p <pid> -b -o 'expr (int) <code>'`

use std::env;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::control::{Evaluation, ProcessControl};
use crate::domain::{ControlError, Pid};
use crate::process_lookup::is_process_alive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debugger {
    Gdb,
    Lldb,
}

impl Debugger {
    /// The backend for the OS we were built for.
    #[must_use]
    pub fn for_host() -> Self {
        if cfg!(target_os = "macos") {
            Self::Lldb
        } else {
            Self::Gdb
        }
    }

    #[must_use]
    pub fn program(self) -> &'static str {
        match self {
            Self::Gdb => "gdb",
            Self::Lldb => "lldb",
        }
    }

    /// Arguments that make the debugger evaluate `code` in `pid` and exit.
    #[must_use]
    pub fn command_args(self, pid: Pid, code: &str) -> Vec<String> {
        match self {
            Self::Gdb => vec![
                "-p".to_string(),
                pid.0.to_string(),
                "-batch".to_string(),
                "-ex".to_string(),
                format!("call (int) {code}"),
            ],
            Self::Lldb => vec![
                "-p".to_string(),
                pid.0.to_string(),
                "-b".to_string(),
                "-o".to_string(),
                format!("expr (int) {code}"),
            ],
        }
    }

    /// Extract the printed return value of the evaluated expression.
    ///
    /// gdb prints `$1 = 0`, lldb prints `(int) $0 = 0`.
    #[must_use]
    pub fn parse_return(self, stdout: &str) -> Option<i32> {
        stdout.lines().rev().find_map(|line| {
            let (lhs, rhs) = line.trim().split_once(" = ")?;
            let var = lhs.rsplit(' ').next()?;
            let digits = var.strip_prefix('$')?;
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            rhs.trim().parse().ok()
        })
    }
}

/// Locate `program` on `PATH`.
fn find_on_path(program: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path).map(|dir| dir.join(program)).find(|candidate| candidate.is_file())
}

pub struct DebuggerControl {
    debugger: Debugger,
}

/// A resolved debugger binary bound to one target.
///
/// Batch-mode debuggers hold the ptrace attachment only while the command
/// runs, so the session itself owns no OS resources.
#[derive(Debug)]
pub struct DebuggerSession {
    pid: Pid,
    program: PathBuf,
}

impl DebuggerControl {
    #[must_use]
    pub fn new(debugger: Debugger) -> Self {
        Self { debugger }
    }

    #[must_use]
    pub fn for_host() -> Self {
        Self::new(Debugger::for_host())
    }

    #[must_use]
    pub fn debugger(&self) -> Debugger {
        self.debugger
    }

    /// Whether the debugger binary can be found.
    #[must_use]
    pub fn is_available(&self) -> bool {
        find_on_path(self.debugger.program()).is_some()
    }
}

impl ProcessControl for DebuggerControl {
    type Session = DebuggerSession;

    fn attach(&self, pid: Pid) -> Result<Self::Session, ControlError> {
        let program = find_on_path(self.debugger.program()).ok_or_else(|| {
            ControlError::Unavailable(format!("{} not found on PATH", self.debugger.program()))
        })?;
        if !is_process_alive(pid) {
            return Err(ControlError::ProcessNotFound(pid));
        }
        log::debug!("Attaching {} to {pid}", program.display());
        Ok(DebuggerSession { pid, program })
    }

    fn evaluate(
        &self,
        session: &mut Self::Session,
        code: &str,
    ) -> Result<Evaluation, ControlError> {
        let args = self.debugger.command_args(session.pid, code);
        log::debug!("Running {} {}", session.program.display(), args.join(" "));

        let output = Command::new(&session.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ControlError::Spawn {
                program: session.program.display().to_string(),
                source,
            })?;

        Ok(Evaluation {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn detach(&self, session: Self::Session) {
        log::debug!("Detached from {}", session.pid);
    }

    fn entry_return(&self, evaluation: &Evaluation) -> Option<i32> {
        self.debugger.parse_return(&evaluation.stdout_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gdb_command_args() {
        let args = Debugger::Gdb.command_args(Pid(42), "sql_sniffer_eval(\"/tmp/p\")");
        assert_eq!(args[..4], ["-p", "42", "-batch", "-ex"]);
        assert_eq!(args[4], "call (int) sql_sniffer_eval(\"/tmp/p\")");
    }

    #[test]
    fn test_lldb_command_args() {
        let args = Debugger::Lldb.command_args(Pid(7), "f()");
        assert_eq!(args, ["-p", "7", "-b", "-o", "expr (int) f()"]);
    }

    #[test]
    fn test_parse_gdb_return() {
        let stdout = "[Thread debugging using libthread_db enabled]\n\
                      0x00007f in __GI___clock_nanosleep ()\n\
                      $1 = 0\n\
                      [Inferior 1 (process 42) detached]\n";
        assert_eq!(Debugger::Gdb.parse_return(stdout), Some(0));
        assert_eq!(Debugger::Gdb.parse_return("$1 = -2\n"), Some(-2));
    }

    #[test]
    fn test_parse_lldb_return() {
        let stdout = "(lldb) expr (int) sql_sniffer_eval(\"/tmp/p\")\n(int) $0 = -3\n";
        assert_eq!(Debugger::Lldb.parse_return(stdout), Some(-3));
    }

    #[test]
    fn test_parse_return_ignores_noise() {
        assert_eq!(Debugger::Gdb.parse_return("No symbol table is loaded.\n"), None);
        assert_eq!(Debugger::Gdb.parse_return("a = 1\n$x = 2\n"), None);
    }

    #[test]
    fn test_attach_missing_process() {
        let control = DebuggerControl::for_host();
        if !control.is_available() {
            // No debugger in this environment: attach reports it as unavailable
            assert!(matches!(control.attach(Pid(999_999_999)), Err(ControlError::Unavailable(_))));
            return;
        }
        assert!(matches!(
            control.attach(Pid(999_999_999)),
            Err(ControlError::ProcessNotFound(_))
        ));
    }
}

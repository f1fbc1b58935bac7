//! Resolve a target PID from a process name, and check target liveness.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::Pid;

/// A running process as seen through `/proc`.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub exe_path: PathBuf,
    pub command: String,
}

/// Whether `pid` refers to a live process.
///
/// Uses a null signal: `EPERM` means the process exists but belongs to
/// someone else, which still counts as alive.
#[must_use]
#[allow(unsafe_code)]
pub fn is_process_alive(pid: Pid) -> bool {
    if pid.0 <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission check
    let rc = unsafe { libc::kill(pid.0, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Find the single process matching `name`.
///
/// Matches against the command name from `/proc/<pid>/stat` and the
/// executable basename from `/proc/<pid>/exe`. Our own process never
/// matches.
///
/// # Errors
/// - `/proc` unreadable
/// - No processes found
/// - Multiple processes found (ambiguous)
pub fn find_process_by_name(name: &str) -> Result<ProcessInfo> {
    let own_pid = Pid(i32::try_from(std::process::id()).unwrap_or(i32::MAX));
    let mut matches: Vec<ProcessInfo> = list_processes()?
        .into_iter()
        .filter(|info| info.pid != own_pid && is_match(&info.command, &info.exe_path, name))
        .collect();

    match matches.len() {
        0 => bail!(
            "No process matching '{name}' found.\n\
             Check running processes with: ps aux | grep {name}"
        ),
        1 => Ok(matches.remove(0)),
        _ => {
            let list: Vec<String> =
                matches.iter().map(|m| format!("  {} ({})", m.pid.0, m.command)).collect();
            bail!(
                "Multiple processes match '{name}':\n{}\n\n\
                 Specify PID explicitly: sql-sniffer --pid <PID>",
                list.join("\n")
            )
        }
    }
}

/// Every process whose `exe` link and `stat` we can read.
fn list_processes() -> Result<Vec<ProcessInfo>> {
    let proc_dir = fs::read_dir("/proc").context("Failed to read /proc")?;

    Ok(proc_dir
        .flatten()
        .filter_map(|entry| {
            let pid: i32 = entry.file_name().to_string_lossy().parse().ok()?;
            // Kernel threads and other users' processes drop out here
            let exe_path = fs::read_link(format!("/proc/{pid}/exe")).ok()?;
            let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
            let command = extract_comm(&stat).ok()?;
            Some(ProcessInfo { pid: Pid(pid), exe_path, command })
        })
        .collect())
}

/// Resolve binary path from PID via `/proc/<pid>/exe`.
///
/// # Errors
/// Returns error if the process doesn't exist or `/proc/<pid>/exe` is not readable.
pub fn resolve_exe_path(pid: Pid) -> Result<PathBuf> {
    let exe_link = format!("/proc/{}/exe", pid.0);
    fs::read_link(&exe_link).with_context(|| format!("Cannot read {exe_link}"))
}

/// Extract command name from `/proc/<pid>/stat`.
/// Format: "pid (comm) state ..."
fn extract_comm(stat_line: &str) -> Result<String> {
    let open = stat_line.find('(').context("Invalid stat format")?;
    let close = stat_line.rfind(')').context("Invalid stat format")?;
    if open >= close {
        bail!("Invalid stat format");
    }
    Ok(stat_line[open + 1..close].to_string())
}

fn is_match(command: &str, exe_path: &Path, pattern: &str) -> bool {
    let exe_basename = exe_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let pattern_basename =
        Path::new(pattern).file_name().and_then(|n| n.to_str()).unwrap_or(pattern);

    command == pattern_basename
        || exe_basename == pattern_basename
        || command.contains(pattern)
        || exe_basename.contains(pattern)
}

//! Payload injection.
//!
//! Each call renders a payload, writes it to a transient file, has the target
//! evaluate the hook entry against that file through one control session and
//! removes the file again, whatever the outcome.

use std::io::Write;
use std::path::Path;

use log::{debug, error};
use sql_sniffer_common::{describe_eval_status, Payload, EVAL_ENTRY_SYMBOL, EVAL_OK};

use super::control::{Evaluation, ProcessControl};
use crate::domain::{InjectionError, Pid};

/// What came back from one injection round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionReport {
    /// Exit status of the control tool
    pub status: Option<i32>,
    /// Return value of the hook entry, when the backend could read it
    pub entry_status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl InjectionReport {
    fn new(evaluation: &Evaluation, entry_status: Option<i32>) -> Self {
        Self {
            status: evaluation.status,
            entry_status,
            stdout: evaluation.stdout_text(),
            stderr: evaluation.stderr_text(),
        }
    }

    /// No error output, a zero exit status and no failure reported by the
    /// hook entry.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.status == Some(0)
            && self.stderr.trim().is_empty()
            && self.entry_status.map_or(true, |code| code == EVAL_OK)
    }
}

/// The expression evaluated inside the target for a payload file.
#[must_use]
pub fn entry_invocation(payload_path: &Path) -> String {
    let path = payload_path.to_string_lossy().replace('\\', "\\\\").replace('"', "\\\"");
    format!("{EVAL_ENTRY_SYMBOL}(\"{path}\")")
}

pub struct Injector<C> {
    control: C,
}

impl<C: ProcessControl> Injector<C> {
    pub fn new(control: C) -> Self {
        Self { control }
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    /// Install the interception hook in `pid`, streaming to `port` on the
    /// loopback interface.
    ///
    /// # Errors
    /// Attach, spawn or payload file failures. An unclean evaluation is
    /// logged and returned as a report.
    pub fn install(
        &self,
        pid: Pid,
        port: u16,
        verbose: bool,
    ) -> Result<InjectionReport, InjectionError> {
        self.inject(pid, &Payload::start(port, verbose))
    }

    /// Remove the interception hook from `pid`.
    ///
    /// # Errors
    /// Same as [`Injector::install`].
    pub fn uninstall(&self, pid: Pid, verbose: bool) -> Result<InjectionReport, InjectionError> {
        self.inject(pid, &Payload::stop(verbose))
    }

    fn inject(&self, pid: Pid, payload: &Payload) -> Result<InjectionReport, InjectionError> {
        let mut file =
            tempfile::Builder::new().prefix("sql-sniffer-").suffix(".payload").tempfile()?;
        file.write_all(payload.render().as_bytes())?;
        file.flush()?;

        // The target may run as a different user than we do
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file().set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }

        let code = entry_invocation(file.path());
        debug!("Injecting {:?} into {pid} via {}", payload.directive, file.path().display());

        let mut session =
            self.control.attach(pid).map_err(|source| InjectionError::Attach { pid, source })?;
        let evaluation = self.control.evaluate(&mut session, &code);
        self.control.detach(session);
        let evaluation = evaluation.map_err(|source| InjectionError::Evaluation { pid, source })?;

        let report = InjectionReport::new(&evaluation, self.control.entry_return(&evaluation));
        if !report.stdout.trim().is_empty() {
            debug!("Injection output:\n{}", report.stdout.trim_end());
        }
        if !report.stderr.trim().is_empty() {
            error!("Injected command resulted in error:\n{}", report.stderr.trim_end());
        }
        if report.status != Some(0) {
            match report.status {
                Some(code) => error!("Process control exited with status {code}"),
                None => error!("Process control was terminated by a signal"),
            }
        }
        if let Some(code) = report.entry_status.filter(|&code| code != EVAL_OK) {
            error!("Hook entry returned {code}: {}", describe_eval_status(code));
        }

        Ok(report)
    }
}

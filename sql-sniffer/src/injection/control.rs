//! Process control boundary.
//!
//! Whatever gets code running inside the target (a debugger today) sits
//! behind [`ProcessControl`]. Calls are synchronous, blocking and slow
//! (sub-second to several seconds); callers must not issue two sessions
//! against the same target concurrently.

use crate::domain::{ControlError, Pid};

/// Outcome of evaluating code inside the target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Exit status of the control tool (`None` if killed by a signal)
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Evaluation {
    #[must_use]
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

pub trait ProcessControl: Send + Sync {
    type Session;

    /// Attach a control session to `pid`.
    ///
    /// # Errors
    /// `ProcessNotFound` or `Unavailable` (the tool itself is missing).
    fn attach(&self, pid: Pid) -> Result<Self::Session, ControlError>;

    /// Make the target evaluate `code`.
    ///
    /// # Errors
    /// Only hard failures (the tool could not run at all). A tool that ran
    /// and complained is reported through the returned [`Evaluation`].
    fn evaluate(&self, session: &mut Self::Session, code: &str) -> Result<Evaluation, ControlError>;

    fn detach(&self, session: Self::Session);

    /// Return value of the evaluated expression, if the backend can read it
    /// from its output.
    fn entry_return(&self, _evaluation: &Evaluation) -> Option<i32> {
        None
    }
}

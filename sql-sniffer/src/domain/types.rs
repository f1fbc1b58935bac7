//! Domain types providing compile-time safety and self-documentation

use std::fmt;
use std::str::FromStr;

/// Process ID of the target
///
/// Externally supplied; existence is checked by the control interface at
/// attach time, not when the value is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(pub i32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl From<i32> for Pid {
    fn from(pid: i32) -> Self {
        Pid(pid)
    }
}

impl From<Pid> for i32 {
    fn from(pid: Pid) -> Self {
        pid.0
    }
}

/// Field a summary is ranked by (always descending)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    /// Slowest single execution
    #[default]
    MaxDuration,
    /// Cumulative time spent
    SumDuration,
    /// Number of executions
    Count,
}

impl OrderBy {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::MaxDuration => "max",
            Self::SumDuration => "sum",
            Self::Count => "count",
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OrderBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(Self::MaxDuration),
            "sum" => Ok(Self::SumDuration),
            "count" => Ok(Self::Count),
            other => Err(format!("unknown ordering '{other}' (expected max, sum or count)")),
        }
    }
}

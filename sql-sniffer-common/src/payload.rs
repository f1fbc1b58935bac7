//! Injection payload format.
//!
//! The injector writes a payload to a transient file and asks the debugger to
//! make the target evaluate it. The format is line oriented:
//!
//! ```text
//! # sql-sniffer payload
//! port = 40123
//! verbose = true
//! start
//! ```
//!
//! `key = value` lines parameterize the hook, exactly one bare directive line
//! (`start` or `stop`) says what to do, `#` lines are comments.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const HEADER: &str = "# sql-sniffer payload";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayloadError {
    #[error("line {line}: unknown key '{key}'")]
    UnknownKey { line: usize, key: String },

    #[error("line {line}: invalid value '{value}' for '{key}'")]
    InvalidValue { line: usize, key: String, value: String },

    #[error("line {line}: unexpected '{text}'")]
    UnexpectedLine { line: usize, text: String },

    #[error("line {0}: more than one directive")]
    DuplicateDirective(usize),

    #[error("payload has no start/stop directive")]
    MissingDirective,

    #[error("start directive requires a port")]
    MissingPort,
}

/// What the hook should do when it evaluates the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Connect to the collector, install the wrapper, start forwarding
    Start,
    /// Stop forwarding; the forwarding task restores the original entry point
    Stop,
}

impl Directive {
    fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

/// A parsed injection payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Collector port to stream to (required for `start`)
    pub port: Option<u16>,
    /// Enables the hook's informational logging
    pub verbose: bool,
    pub directive: Directive,
}

impl Payload {
    #[must_use]
    pub fn start(port: u16, verbose: bool) -> Self {
        Self { port: Some(port), verbose, directive: Directive::Start }
    }

    #[must_use]
    pub fn stop(verbose: bool) -> Self {
        Self { port: None, verbose, directive: Directive::Stop }
    }

    /// Render to the text form written into the payload file.
    ///
    /// The directive is always the last line.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Parse the text form.
    ///
    /// # Errors
    /// See [`PayloadError`].
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        let mut port = None;
        let mut verbose = false;
        let mut directive = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();
                let invalid = || PayloadError::InvalidValue {
                    line: line_no,
                    key: key.to_string(),
                    value: value.to_string(),
                };
                match key {
                    "port" => port = Some(value.parse::<u16>().map_err(|_| invalid())?),
                    "verbose" => verbose = value.parse::<bool>().map_err(|_| invalid())?,
                    _ => {
                        return Err(PayloadError::UnknownKey {
                            line: line_no,
                            key: key.to_string(),
                        })
                    }
                }
                continue;
            }

            let parsed = match line {
                "start" => Directive::Start,
                "stop" => Directive::Stop,
                _ => {
                    return Err(PayloadError::UnexpectedLine {
                        line: line_no,
                        text: line.to_string(),
                    })
                }
            };
            if directive.replace(parsed).is_some() {
                return Err(PayloadError::DuplicateDirective(line_no));
            }
        }

        let directive = directive.ok_or(PayloadError::MissingDirective)?;
        if directive == Directive::Start && port.is_none() {
            return Err(PayloadError::MissingPort);
        }
        Ok(Self { port, verbose, directive })
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{HEADER}")?;
        if let Some(port) = self.port {
            writeln!(f, "port = {port}")?;
        }
        writeln!(f, "verbose = {}", self.verbose)?;
        writeln!(f, "{}", self.directive.as_str())
    }
}

impl FromStr for Payload {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

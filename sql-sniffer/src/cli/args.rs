//! CLI argument definitions

use clap::Parser;
use std::time::Duration;

use crate::domain::{OrderBy, Pid};
use crate::lifecycle::SessionConfig;

#[derive(Parser, Debug)]
#[command(
    name = "sql-sniffer",
    version,
    about = "Analyze SQL queries executed by a running process",
    after_help = "\
EXAMPLES:
    sudo sql-sniffer my-app                 Find the PID by name, rank by max duration
    sudo sql-sniffer --pid 1234 --tail      Print every query as it runs
    sudo sql-sniffer --pid 1234 -c -n 10    Ten most frequent queries

SIGNALS:
    SIGINT, SIGTERM    Stop, remove the hook and print the summary
    SIGUSR1            Print the current summary and keep going"
)]
pub struct Args {
    /// Process name to attach to (auto-detects PID)
    #[arg(value_name = "PROCESS", conflicts_with = "pid")]
    pub process: Option<String>,

    /// Process ID to attach to
    #[arg(short, long)]
    pub pid: Option<i32>,

    /// Print queries as they are executed
    #[arg(short, long)]
    pub tail: bool,

    /// Verbose logging, here and inside the target
    #[arg(short, long)]
    pub verbose: bool,

    /// Rank the summary by cumulative duration
    #[arg(short, long, conflicts_with = "count")]
    pub sum: bool,

    /// Rank the summary by execution count
    #[arg(short, long)]
    pub count: bool,

    /// Number of queries in the summary
    #[arg(
        short = 'n',
        long,
        default_value_t = 5,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub number: u32,

    /// Stop after N seconds (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    #[must_use]
    pub fn order_by(&self) -> OrderBy {
        if self.count {
            OrderBy::Count
        } else if self.sum {
            OrderBy::SumDuration
        } else {
            OrderBy::MaxDuration
        }
    }

    /// Session settings for an already resolved target.
    #[must_use]
    pub fn session_config(&self, pid: Pid) -> SessionConfig {
        SessionConfig {
            pid,
            tail: self.tail,
            verbose: self.verbose,
            order_by: self.order_by(),
            top_n: self.number as usize,
            duration: (self.duration > 0).then(|| Duration::from_secs(self.duration)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("sql-sniffer").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--pid", "42"]).unwrap();
        let config = args.session_config(Pid(42));
        assert_eq!(config.order_by, OrderBy::MaxDuration);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.duration, None);
        assert!(!config.tail);
    }

    #[test]
    fn test_short_flags() {
        let args = parse(&["-p", "42", "-t", "-v", "-c", "-n", "10", "--duration", "30"]).unwrap();
        let config = args.session_config(Pid(42));
        assert!(config.tail && config.verbose);
        assert_eq!(config.order_by, OrderBy::Count);
        assert_eq!(config.top_n, 10);
        assert_eq!(config.duration, Some(Duration::from_secs(30)));
        assert_eq!(parse(&["-p", "1", "-s"]).unwrap().order_by(), OrderBy::SumDuration);
    }

    #[test]
    fn test_rejects_invalid_combinations() {
        assert!(parse(&["-p", "42", "-n", "0"]).is_err());
        assert!(parse(&["-p", "42", "--sum", "--count"]).is_err());
        assert!(parse(&["my-app", "--pid", "42"]).is_err());
    }
}

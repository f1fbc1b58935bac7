//! # sql-sniffer - Main Entry Point
//!
//! Resolves the target, runs pre-flight checks, then hands over to
//! [`sql_sniffer::lifecycle::run_session`] until a stop condition is met.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;

use sql_sniffer::cli::Args;
use sql_sniffer::domain::Pid;
use sql_sniffer::injection::{DebuggerControl, Injector};
use sql_sniffer::lifecycle::run_session;
use sql_sniffer::preflight::run_preflight_checks;
use sql_sniffer::process_lookup::{find_process_by_name, is_process_alive, resolve_exe_path};
use sql_sniffer::signals::{spawn_signal_listener, EVENT_CHANNEL_DEPTH};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

/// `info` by default, `debug` with `--verbose`; `RUST_LOG` wins over both.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") || msg.contains("operation not permitted") {
        EXIT_NOPERM
    } else if msg.contains("missing required argument") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

/// Resolve the target PID from `PROCESS` or `--pid`.
fn resolve_pid(args: &Args) -> Result<Pid> {
    if let Some(ref name) = args.process {
        return Ok(find_process_by_name(name)?.pid);
    }
    if let Some(pid) = args.pid {
        return Ok(Pid(pid));
    }
    anyhow::bail!(
        "Missing required argument: PROCESS or --pid\n\n\
         Usage:\n  \
         sql-sniffer my-app           Find the PID by name\n  \
         sql-sniffer --pid 1234       Explicit PID\n\n\
         Run 'sql-sniffer --help' for more options"
    )
}

#[tokio::main]
async fn run(args: &Args) -> Result<()> {
    let pid = resolve_pid(args)?;
    let control = DebuggerControl::for_host();
    run_preflight_checks(pid, &control, args.quiet)?;

    if !args.quiet {
        println!("sql-sniffer v{}", env!("CARGO_PKG_VERSION"));
        if let Ok(exe) = resolve_exe_path(pid) {
            println!("target: {}", exe.display());
        }
        println!("pid: {}", pid.0);
        println!("ranking: top {} by {}", args.number, args.order_by());
    }

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);
    let signal_listener = spawn_signal_listener(event_tx)?;

    let config = args.session_config(pid);
    let injector = Arc::new(Injector::new(control));
    let report = run_session(config, injector, event_rx, is_process_alive).await;
    signal_listener.abort();
    let report = report?;

    if !args.quiet {
        eprintln!(
            "\n{}: {:.1}s, {} records ({} malformed, {} distinct shown)",
            report.exit_reason,
            report.elapsed.as_secs_f64(),
            report.records,
            report.malformed,
            report.summary.len(),
        );
    }

    Ok(())
}

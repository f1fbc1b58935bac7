//! # sql-sniffer - Live SQL profiler for running processes
//!
//! sql-sniffer attaches to a process that is already running, installs an
//! interception hook around its query executor, and streams one telemetry
//! record per executed query back to a local collector, which aggregates
//! per-query statistics and prints a ranked summary. The target needs no
//! restart and no code changes beyond registering its extension point with
//! `sql-sniffer-hook`.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Target Process                         │
//! │                                                              │
//! │  callers ──► ExtensionPoint ──► TimingExecutor ──► executor  │
//! │                                     │ enqueue (never blocks) │
//! │                                     ▼                        │
//! │                             forwarding thread                │
//! └─────────────────────────────────────┬────────────────────────┘
//!          ▲ gdb / lldb                 │ TCP 127.0.0.1, length-prefixed JSON
//!          │ sql_sniffer_eval(payload)  ▼
//! ┌────────┴─────────────────────────────────────────────────────┐
//! │                   sql-sniffer (This Crate)                   │
//! │                                                              │
//! │  ┌───────────┐   ┌────────────┐   ┌──────────┐   ┌─────────┐ │
//! │  │ Injection │   │ Collector  │──▶│ Analysis │──▶│ Display │ │
//! │  │ (debugger)│   │ (receiver) │   │ (stats)  │   │ (stdout)│ │
//! │  └───────────┘   └────────────┘   └──────────┘   └─────────┘ │
//! │         ▲               ▲                                    │
//! │         └─── Lifecycle ─┴─── ControlEvents ◄── signals       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`injection`]: the process control boundary and the gdb / lldb backend
//!   that makes the target evaluate the hook entry against a payload file
//! - [`collector`]: the loopback listener and the framed receive loop
//! - [`analysis`]: per-query aggregation and top-N ranking
//! - [`display`]: tail-mode lines and summary tables
//! - [`lifecycle`]: sequences one session and guarantees cleanup runs once
//! - [`signals`]: turns SIGINT / SIGTERM / SIGUSR1 into [`lifecycle::ControlEvent`]s
//! - [`cli`], [`preflight`], [`process_lookup`]: the binary's front end
//! - [`domain`]: core types (Pid, `OrderBy`) and errors
//!
//! ## Typical Usage
//!
//! ```bash
//! # Rank queries of a running process by their slowest execution
//! sudo sql-sniffer --pid <PID>
//!
//! # Watch queries live, then rank by total time spent
//! sudo sql-sniffer my-app --tail --sum
//!
//! # Ask for an intermediate summary without stopping
//! kill -USR1 $(pgrep sql-sniffer)
//! ```

pub mod analysis;
pub mod cli;
pub mod collector;
pub mod display;
pub mod domain;
pub mod injection;
pub mod lifecycle;
pub mod preflight;
pub mod process_lookup;
pub mod signals;

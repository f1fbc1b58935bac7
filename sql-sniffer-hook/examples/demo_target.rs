//! Demo target for sql-sniffer
//!
//! A long-running process that dispatches a handful of fake queries through
//! an extension point, so there is something to profile.
//!
//! ## Usage
//!
//! ```bash
//! cargo build --release --example demo_target
//! RUST_LOG=info ./target/release/examples/demo_target
//!
//! # In another terminal
//! sudo ./target/release/sql-sniffer --pid $(pgrep demo_target) --tail
//! ```

use serde_json::{json, Value};
use sql_sniffer_hook::{host, ExtensionPoint, QueryExecutor};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Pretends to be a database: sleeps proportionally to how "expensive" the
/// query looks.
struct SleepyDb;

impl SleepyDb {
    fn cost(query: &str) -> Duration {
        if query.contains("JOIN") {
            Duration::from_millis(40)
        } else if query.starts_with("INSERT") {
            Duration::from_millis(5)
        } else {
            Duration::from_millis(1)
        }
    }
}

impl QueryExecutor for SleepyDb {
    fn execute(&self, query: &str, params: Option<&[Value]>) -> anyhow::Result<Value> {
        thread::sleep(Self::cost(query));
        if query.contains("missing_table") {
            anyhow::bail!("relation \"missing_table\" does not exist");
        }
        Ok(json!({ "rows": 1, "params": params.map_or(0, <[Value]>::len) }))
    }

    fn execute_many(&self, query: &str, param_list: &[Vec<Value>]) -> anyhow::Result<Value> {
        for _ in param_list {
            thread::sleep(Self::cost(query));
        }
        Ok(json!({ "rows": param_list.len() }))
    }
}

const QUERIES: &[&str] = &[
    "SELECT id, name FROM users WHERE id = %s",
    "SELECT * FROM orders o JOIN users u ON u.id = o.user_id WHERE u.id = %s",
    "SELECT count(*) FROM missing_table",
    "UPDATE users SET last_seen = now() WHERE id = %s",
];

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let point = Arc::new(ExtensionPoint::new("db.cursor", Arc::new(SleepyDb)));
    host::register(Arc::clone(&point))?;

    println!("demo_target pid: {}", std::process::id());

    let workers: Vec<_> = (0..2)
        .map(|worker| {
            let point = Arc::clone(&point);
            thread::spawn(move || loop {
                for (i, query) in QUERIES.iter().enumerate() {
                    let _ = point.execute(query, Some(&[json!(worker * 100 + i)]));
                }
                let _ = point.execute_many(
                    "INSERT INTO audit (event) VALUES (%s)",
                    &[vec![json!("login")], vec![json!("logout")]],
                );
                thread::sleep(Duration::from_millis(200));
            })
        })
        .collect();

    for worker in workers {
        let _ = worker.join();
    }
    Ok(())
}

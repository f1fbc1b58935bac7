//! Query execution capability and the host-owned extension point.
//!
//! The host never calls its database executor directly; it goes through an
//! [`ExtensionPoint`], which holds the executor currently installed under a
//! well-known name. Instrumentation is interface substitution at that point:
//! a wrapper implementing the same [`QueryExecutor`] trait is swapped in, and
//! later the original is swapped back.
//!
//! Dispatch is lock-free (`arc-swap` load); only substitutions serialize on a
//! mutex so "swap back only if still ours" is atomic.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The capability the host exposes for running queries.
///
/// Mirrors a database cursor: a single execution with optional parameters and
/// a batch execution with one parameter set per row.
pub trait QueryExecutor: Send + Sync {
    /// Execute `query` once.
    ///
    /// # Errors
    /// Whatever the underlying database reports.
    fn execute(&self, query: &str, params: Option<&[Value]>) -> anyhow::Result<Value>;

    /// Execute `query` once per parameter set.
    ///
    /// # Errors
    /// Whatever the underlying database reports.
    fn execute_many(&self, query: &str, param_list: &[Vec<Value>]) -> anyhow::Result<Value>;
}

pub type SharedExecutor = Arc<dyn QueryExecutor>;

/// Named slot through which all query executions are dispatched.
pub struct ExtensionPoint {
    name: String,
    current: ArcSwap<SharedExecutor>,
    /// Serializes substitutions; dispatch does not take it.
    patch_lock: Mutex<()>,
}

impl ExtensionPoint {
    pub fn new(name: impl Into<String>, executor: SharedExecutor) -> Self {
        Self {
            name: name.into(),
            current: ArcSwap::from_pointee(executor),
            patch_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The executor currently installed.
    #[must_use]
    pub fn current(&self) -> SharedExecutor {
        let guard = self.current.load();
        Arc::clone(&**guard)
    }

    /// Whether `executor` is the one currently installed (pointer identity).
    #[must_use]
    pub fn is_current(&self, executor: &SharedExecutor) -> bool {
        Arc::ptr_eq(&**self.current.load(), executor)
    }

    /// Install a wrapper built around the current executor.
    ///
    /// Returns `(original, wrapper)`.
    pub fn wrap<F>(&self, wrap: F) -> (SharedExecutor, SharedExecutor)
    where
        F: FnOnce(SharedExecutor) -> SharedExecutor,
    {
        let _guard = self.patch_lock.lock();
        let original = self.current();
        let wrapper = wrap(Arc::clone(&original));
        self.current.store(Arc::new(Arc::clone(&wrapper)));
        (original, wrapper)
    }

    /// Replace `expected` with `replacement`, but only if `expected` is still
    /// installed. Returns whether the swap happened.
    pub fn replace_if_current(
        &self,
        expected: &SharedExecutor,
        replacement: SharedExecutor,
    ) -> bool {
        let _guard = self.patch_lock.lock();
        if !self.is_current(expected) {
            return false;
        }
        self.current.store(Arc::new(replacement));
        true
    }

    /// Dispatch a single execution to the installed executor.
    ///
    /// # Errors
    /// Passes through the executor's error unchanged.
    pub fn execute(&self, query: &str, params: Option<&[Value]>) -> anyhow::Result<Value> {
        // Clone out of the guard: executions can be long-running
        let executor = self.current();
        executor.execute(query, params)
    }

    /// Dispatch a batch execution to the installed executor.
    ///
    /// # Errors
    /// Passes through the executor's error unchanged.
    pub fn execute_many(&self, query: &str, param_list: &[Vec<Value>]) -> anyhow::Result<Value> {
        let executor = self.current();
        executor.execute_many(query, param_list)
    }
}

impl fmt::Debug for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionPoint").field("name", &self.name).finish_non_exhaustive()
    }
}

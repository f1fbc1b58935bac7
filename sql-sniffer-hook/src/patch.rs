//! Installed substitution at an extension point, with idempotent rollback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::executor::{ExtensionPoint, SharedExecutor};

/// A wrapper installed at an [`ExtensionPoint`].
///
/// `rollback` restores the exact original executor once; later calls are
/// no-ops. If something else replaced the wrapper in the meantime, rollback
/// leaves the point alone rather than clobbering the newer executor.
pub struct Patch {
    point: Arc<ExtensionPoint>,
    original: SharedExecutor,
    wrapper: SharedExecutor,
    applied: AtomicBool,
}

impl Patch {
    /// Wrap the executor currently installed at `point`.
    pub fn apply<F>(point: &Arc<ExtensionPoint>, wrap: F) -> Self
    where
        F: FnOnce(SharedExecutor) -> SharedExecutor,
    {
        let (original, wrapper) = point.wrap(wrap);
        Self { point: Arc::clone(point), original, wrapper, applied: AtomicBool::new(true) }
    }

    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.applied.load(Ordering::Acquire)
    }

    /// Restore the original executor.
    ///
    /// Returns `true` only for the call that actually restored it.
    pub fn rollback(&self) -> bool {
        if !self.applied.swap(false, Ordering::AcqRel) {
            return false;
        }
        let restored = self.point.replace_if_current(&self.wrapper, Arc::clone(&self.original));
        if !restored {
            log::warn!(
                "Executor at '{}' was replaced by someone else; leaving it in place",
                self.point.name()
            );
        }
        restored
    }
}

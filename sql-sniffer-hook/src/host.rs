//! Process-wide host registration and the debugger-facing entry point.
//!
//! The host calls [`register`] once at startup with its extension point. The
//! collector later makes the debugger call [`sql_sniffer_eval`] with the path
//! of a payload file; the return code is printed by the debugger and read
//! back by the injector.

use sql_sniffer_common::{EVAL_BAD_ARGUMENT, EVAL_FAILED, EVAL_OK, EVAL_PANICKED};
use std::ffi::{c_char, c_int, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::errors::HookError;
use crate::executor::ExtensionPoint;
use crate::sniffer::HookRuntime;

static RUNTIME: OnceLock<HookRuntime> = OnceLock::new();

/// Register the host's extension point for this process.
///
/// # Errors
/// `AlreadyRegistered` on a second call.
pub fn register(point: Arc<ExtensionPoint>) -> Result<(), HookError> {
    RUNTIME.set(HookRuntime::new(point)).map_err(|_| HookError::AlreadyRegistered)?;
    // Keep the entry point referenced so the linker cannot discard it from
    // the host binary.
    std::hint::black_box(sql_sniffer_eval as unsafe extern "C" fn(*const c_char) -> c_int);
    log::debug!("sql-sniffer hook registered");
    Ok(())
}

/// The registered runtime, if any.
#[must_use]
pub fn runtime() -> Option<&'static HookRuntime> {
    RUNTIME.get()
}

/// Apply a payload file to the registered runtime.
///
/// # Errors
/// `NotRegistered`, or anything from [`HookRuntime::apply_file`].
pub fn eval_payload_file(path: &Path) -> Result<(), HookError> {
    runtime().ok_or(HookError::NotRegistered)?.apply_file(path)
}

/// Debugger entry point: apply the payload file at `path`.
///
/// Returns `EVAL_OK` on success or one of the negative `EVAL_*` codes.
/// Never unwinds across the FFI boundary.
///
/// # Safety
/// `path` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
#[no_mangle]
#[allow(unsafe_code)]
pub unsafe extern "C" fn sql_sniffer_eval(path: *const c_char) -> c_int {
    if path.is_null() {
        return EVAL_BAD_ARGUMENT;
    }
    // SAFETY: non-null and NUL-terminated per the function contract
    let path = unsafe { CStr::from_ptr(path) };
    let Ok(path) = path.to_str() else {
        return EVAL_BAD_ARGUMENT;
    };

    match panic::catch_unwind(AssertUnwindSafe(|| eval_payload_file(Path::new(path)))) {
        Ok(Ok(())) => EVAL_OK,
        Ok(Err(e)) => {
            log::error!("sql-sniffer payload {path} failed: {e}");
            EVAL_FAILED
        }
        Err(_) => EVAL_PANICKED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    #[allow(unsafe_code)]
    fn test_null_path_rejected() {
        // SAFETY: null is explicitly allowed
        assert_eq!(unsafe { sql_sniffer_eval(std::ptr::null()) }, EVAL_BAD_ARGUMENT);
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_unregistered_process_fails_cleanly() {
        // Unit tests never register, so the runtime is absent
        let path = CString::new("/nonexistent/payload").unwrap();
        // SAFETY: valid NUL-terminated string
        assert_eq!(unsafe { sql_sniffer_eval(path.as_ptr()) }, EVAL_FAILED);
        assert!(matches!(
            eval_payload_file(Path::new("/nonexistent/payload")),
            Err(HookError::NotRegistered)
        ));
    }
}

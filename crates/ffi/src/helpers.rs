use crate::error::{with_last_error_mut, DefaultWindVizError, WindVizError, WindVizErrorCode};
use crate::instance::WindVizInstance;
use std::ffi::CString;
use std::sync::{Mutex, MutexGuard};

/// Set the thread-local error message and code.
pub(crate) fn set_last_error(error: &impl WindVizError) {
    with_last_error_mut(|(cstring, code)| {
        *cstring = CString::new(error.msg()).ok();
        *code = error.code();
    });
}

/// Track an error by setting it in thread-local storage and returning its code.
#[inline]
pub(crate) fn track_error(error: &impl WindVizError) -> WindVizErrorCode {
    set_last_error(error);
    error.code()
}

/// Clear the thread-local error message and code.
/// Internal helper called on successful operations.
pub(crate) fn clear_last_error() {
    with_last_error_mut(|(cstring, code)| {
        *cstring = None;
        *code = WindVizErrorCode::Ok;
    });
}

/// Run `f`, recording its error (or clearing the last one) and returning the code
pub(crate) fn handle_ffi_result<F>(f: F) -> WindVizErrorCode
where
    F: FnOnce() -> Result<(), DefaultWindVizError>,
{
    match f() {
        Ok(()) => {
            clear_last_error();
            WindVizErrorCode::Ok
        }
        Err(err) => track_error(&err),
    }
}

/// Borrow the instance behind `ptr`.
///
/// # Safety
/// `ptr` must be null or a live pointer returned by `wind_viz_new`.
pub(crate) unsafe fn instance_from_ptr<'a>(
    ptr: *const WindVizInstance,
) -> Result<&'a WindVizInstance, DefaultWindVizError> {
    // SAFETY: caller guarantees `ptr` is null or valid for the returned lifetime
    unsafe { ptr.as_ref() }.ok_or_else(|| DefaultWindVizError::null_pointer("ptr"))
}

/// Lock one of the instance's mutexes, mapping poison to an FFI error
pub(crate) fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    name: &str,
) -> Result<MutexGuard<'a, T>, DefaultWindVizError> {
    mutex
        .lock()
        .map_err(|_| DefaultWindVizError::lock_poisoned(name))
}

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;
use wind_viz_core::ConfigError;

/// Common interface for FFI error types.
///
/// - `code()` - Returns the error code to be passed across FFI boundary
/// - `msg()` - Returns the error message for diagnostic purposes
pub(crate) trait WindVizError {
    /// Returns the error code to be returned across the FFI boundary.
    fn code(&self) -> WindVizErrorCode;

    /// Returns the human-readable error message.
    fn msg(&self) -> &str;
}

/// Default implementation of `WindVizError` for the failures this API can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultWindVizError {
    code: WindVizErrorCode,
    msg: String,
}

impl DefaultWindVizError {
    /// Create error for null pointer passed where non-null required.
    ///
    /// # Arguments
    /// * `param_name` - The name of the parameter that was null (e.g., `"out_instance"`, `"ptr"`)
    pub fn null_pointer(param_name: &str) -> Self {
        Self {
            code: WindVizErrorCode::NullPointer,
            msg: format!("Parameter '{param_name}' cannot be null"),
        }
    }

    /// Create error for poisoned lock.
    pub fn lock_poisoned(lock_name: &str) -> Self {
        Self {
            code: WindVizErrorCode::LockPoisoned,
            msg: format!("Lock '{lock_name}' was poisoned by a panic in another thread"),
        }
    }

    /// Create error for invalid parameter.
    pub fn invalid_parameter(message: String) -> Self {
        Self {
            code: WindVizErrorCode::InvalidParameter,
            msg: message,
        }
    }

    /// Create error for a configuration that failed to parse or validate.
    pub fn invalid_config(message: String) -> Self {
        Self {
            code: WindVizErrorCode::InvalidConfig,
            msg: message,
        }
    }

    /// Create error for a background runtime that could not be started.
    pub fn runtime_unavailable(err: &std::io::Error) -> Self {
        Self {
            code: WindVizErrorCode::RuntimeUnavailable,
            msg: format!("Failed to start background runtime: {err}"),
        }
    }
}

impl From<ConfigError> for DefaultWindVizError {
    fn from(err: ConfigError) -> Self {
        Self::invalid_config(err.to_string())
    }
}

impl From<serde_json::Error> for DefaultWindVizError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_config(format!("Configuration is not valid JSON: {err}"))
    }
}

impl WindVizError for DefaultWindVizError {
    fn code(&self) -> WindVizErrorCode {
        self.code
    }

    fn msg(&self) -> &str {
        &self.msg
    }
}

/// FFI error codes returned by wind visualization functions.
/// Follows standard C convention: 0 = success, non-zero = error.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindVizErrorCode {
    /// Operation completed successfully.
    Ok = 0,

    /// Invalid pointer: null pointer passed where non-null required.
    NullPointer = 1,

    /// Lock poisoned: internal synchronization primitive was poisoned by a panic.
    LockPoisoned = 2,

    /// Invalid parameter passed to function (non-finite viewport, zero size, ...).
    InvalidParameter = 3,

    /// Configuration JSON could not be parsed or failed validation.
    InvalidConfig = 4,

    /// The background fetch runtime could not be created.
    RuntimeUnavailable = 5,
}

impl From<DefaultWindVizError> for WindVizErrorCode {
    fn from(error: DefaultWindVizError) -> Self {
        error.code
    }
}

thread_local! {
    /// Thread-local storage for the most recent FFI error (C string, error code).
    /// Allows callers to retrieve diagnostic information after a failed call.
    static LAST_ERROR: RefCell<(Option<CString>, WindVizErrorCode)> = const { RefCell::new((None, WindVizErrorCode::Ok)) };
}

/// Internal helper to read `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error<F, R>(f: F) -> R
where
    F: FnOnce(&(Option<CString>, WindVizErrorCode)) -> R,
{
    LAST_ERROR.with_borrow(f)
}

/// Internal helper to mutate `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut (Option<CString>, WindVizErrorCode)) -> R,
{
    LAST_ERROR.with_borrow_mut(f)
}

/// Retrieve the most recent FFI error message as a null-terminated C string.
///
/// Returns:
/// - A borrowed pointer to the error message if an error occurred.
/// - `null` if the last call on this thread succeeded.
///
/// # Lifetime
/// The returned pointer is valid until the next FFI call on this thread.
///
/// **DO NOT FREE THIS POINTER** - it is managed internally.
///
/// Example:
/// ```cpp
/// WindVizInstance* viz = nullptr;
/// WindVizErrorCode err = wind_viz_new(config_json, fetch_wind, user_data, &viz);
/// if (err != Ok) {
///     const char* error = wind_viz_get_last_error();
///     if (error) {
///         printf("Wind viz creation failed: %s\n", error);
///     }
/// }
/// ```
#[no_mangle]
pub extern "C" fn wind_viz_get_last_error() -> *const c_char {
    with_last_error(|(cstring, _code)| cstring.as_ref().map_or(ptr::null(), |cs| cs.as_ptr()))
}

/// Retrieve the most recent FFI error code; `Ok` after a successful call.
#[no_mangle]
pub extern "C" fn wind_viz_get_last_error_code() -> WindVizErrorCode {
    with_last_error(|(_cstring, code)| *code)
}

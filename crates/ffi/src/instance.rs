use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::ptr;
use std::sync::{Arc, Mutex};
use tokio::runtime::{self, Runtime};
use tokio::task::JoinHandle;
use tracing::info;
use wind_viz_core::{
    CellCache, RecordingSurface, SimulationDriver, ViewportProjection, WindVizConfig,
};

use crate::error::{DefaultWindVizError, WindVizErrorCode};
use crate::helpers::{clear_last_error, track_error};
use crate::queries::WindVizParticle;
use crate::source::{CallbackSource, WindVizFetchFn};

/// One wind visualization: a background fetch runtime, the shared cell
/// cache and a frame driver for a single map view.
///
/// # Thread Safety
/// Every entry point locks what it touches, so calls may come from any
/// thread. Frames are expected from one thread at a time (the host's render
/// thread); fetch callbacks run on the instance's own worker threads.
pub struct WindVizInstance {
    pub(crate) driver: Mutex<SimulationDriver>,
    /// Viewport the next frame renders against
    pub(crate) view: Mutex<Option<ViewportProjection>>,
    pub(crate) surface: Mutex<RecordingSurface>,
    /// Particles drawn by the last frame, handed out by `wind_viz_get_particles`
    pub(crate) particles: Mutex<Vec<WindVizParticle>>,
    pub(crate) cache: CellCache,
    sweep: JoinHandle<()>,
    // Declared last so it is dropped after everything that spawns onto it
    runtime: Runtime,
}

impl WindVizInstance {
    pub(crate) fn new(
        config: WindVizConfig,
        fetch: WindVizFetchFn,
        user_data: *mut c_void,
    ) -> Result<Box<Self>, DefaultWindVizError> {
        config.validate()?;

        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("wind-viz-fetch")
            .enable_time()
            .build()
            .map_err(|err| DefaultWindVizError::runtime_unavailable(&err))?;

        let source = Arc::new(CallbackSource::new(fetch, user_data));
        let cache = CellCache::new(&config, source, runtime.handle().clone());
        let sweep = cache.spawn_eviction_sweep(config.eviction_interval());
        let capacity = config.particle_count_max;
        let driver = SimulationDriver::new(config, cache.clone());
        info!("Created wind visualization instance");

        Ok(Box::new(Self {
            driver: Mutex::new(driver),
            view: Mutex::new(None),
            surface: Mutex::new(RecordingSurface::new()),
            particles: Mutex::new(Vec::with_capacity(capacity)),
            cache,
            sweep,
            runtime,
        }))
    }

    /// Runtime the cache's fetch tasks run on
    pub(crate) fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

impl Drop for WindVizInstance {
    fn drop(&mut self) {
        self.sweep.abort();
    }
}

/// Parse an optional JSON configuration; null means all defaults.
///
/// # Safety
/// `config_json` must be null or a valid null-terminated string.
unsafe fn parse_config(config_json: *const c_char) -> Result<WindVizConfig, DefaultWindVizError> {
    if config_json.is_null() {
        return Ok(WindVizConfig::default());
    }
    // SAFETY: non-null and null-terminated per the caller contract
    let text = unsafe { CStr::from_ptr(config_json) }
        .to_str()
        .map_err(|err| {
            DefaultWindVizError::invalid_config(format!("Configuration is not UTF-8: {err}"))
        })?;
    Ok(serde_json::from_str(text)?)
}

/// Create a new wind visualization instance and return it via out-parameter.
///
/// Parameters
/// - `config_json`: JSON object with any `WindVizConfig` fields to override, or null
///   for defaults. Unknown fields are ignored.
/// - `fetch`: wind provider callback. Must be non-null.
/// - `user_data`: passed back to every `fetch` call. May be null.
/// - `out_instance`: receives the instance on success, null on failure.
///
/// Returns
/// - `WindVizErrorCode::Ok` (0): success
/// - `WindVizErrorCode::NullPointer`: `fetch` or `out_instance` is null
/// - `WindVizErrorCode::InvalidConfig`: the JSON did not parse or failed validation
/// - `WindVizErrorCode::RuntimeUnavailable`: worker threads could not be started
///
/// # Safety
///
/// - `out_instance` must be a valid, non-null pointer to writable memory.
/// - `config_json` must be null or a valid null-terminated string.
/// - `fetch` and `user_data` must remain valid, and be callable from any thread,
///   until `wind_viz_destroy` returns.
/// - The caller takes ownership of the returned instance and MUST call
///   `wind_viz_destroy` exactly once.
#[no_mangle]
pub unsafe extern "C" fn wind_viz_new(
    config_json: *const c_char,
    fetch: Option<WindVizFetchFn>,
    user_data: *mut c_void,
    out_instance: *mut *mut WindVizInstance,
) -> WindVizErrorCode {
    if out_instance.is_null() {
        return track_error(&DefaultWindVizError::null_pointer("out_instance"));
    }
    let result = match fetch {
        None => Err(DefaultWindVizError::null_pointer("fetch")),
        // SAFETY: forwarded caller contract on `config_json`
        Some(fetch) => unsafe { parse_config(config_json) }
            .and_then(|config| WindVizInstance::new(config, fetch, user_data)),
    };

    match result {
        Ok(instance) => {
            unsafe {
                *out_instance = Box::into_raw(instance);
            }
            clear_last_error();
            WindVizErrorCode::Ok
        }
        Err(err) => {
            unsafe {
                // Set to null on error (per documentation contract)
                *out_instance = ptr::null_mut();
            }
            track_error(&err)
        }
    }
}

/// Destroys an instance previously created by `wind_viz_new`.
///
/// In-flight fetches are abandoned; the call waits for any callback that is
/// currently running to return. If `ptr` is null this is a no-op.
///
/// # Safety
/// - The pointer MUST have been created by `wind_viz_new` and not freed already.
/// - Must not be called from inside a fetch callback.
/// - After calling this function, the caller must not use the pointer again.
#[no_mangle]
pub unsafe extern "C" fn wind_viz_destroy(ptr: *mut WindVizInstance) {
    if ptr.is_null() {
        return;
    }

    // SAFETY: The pointer was created by `Box::into_raw` in `wind_viz_new`
    // and has not been freed. Dropping the Box shuts the runtime down.
    unsafe {
        drop(Box::from_raw(ptr));
    }
}

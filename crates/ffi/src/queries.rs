use wind_viz_core::CacheStats;

use crate::error::{DefaultWindVizError, WindVizErrorCode};
use crate::helpers::{handle_ffi_result, instance_from_ptr, lock};
use crate::instance::WindVizInstance;

/// FFI-friendly particle draw position.
/// Keep this layout stable for C/C++/C# consumers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindVizParticle {
    /// Pixel x, from the viewport's left edge
    pub x: f32,
    /// Pixel y, from the viewport's top edge
    pub y: f32,
    /// Physical wind speed at the particle (m/s), for colouring
    pub speed: f32,
}

/// FFI-friendly snapshot of cache activity.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindVizCacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub rate_limit_blocks: u64,
    pub cooldown_blocks: u64,
    pub in_flight_count: usize,
    pub saturation_blocks: u64,
    pub dedup_blocks: u64,
    pub fetches_dispatched: u64,
    pub fetch_failures: u64,
    pub evictions: u64,
}

impl From<CacheStats> for WindVizCacheStats {
    fn from(stats: CacheStats) -> Self {
        Self {
            size: stats.size,
            hits: stats.hits,
            misses: stats.misses,
            hit_rate: stats.hit_rate,
            rate_limit_blocks: stats.rate_limit_blocks,
            cooldown_blocks: stats.cooldown_blocks,
            in_flight_count: stats.in_flight_count,
            saturation_blocks: stats.saturation_blocks,
            dedup_blocks: stats.dedup_blocks,
            fetches_dispatched: stats.fetches_dispatched,
            fetch_failures: stats.fetch_failures,
            evictions: stats.evictions,
        }
    }
}

/// Return a borrowed pointer to the particles drawn by the last frame.
///
/// - Returns the array via `out_array` and its length via `out_len`.
///   **DO NOT FREE THIS POINTER**.
/// - The pointer stays valid until the next `wind_viz_frame`, `wind_viz_stop`
///   or `wind_viz_destroy` on this instance.
///
/// # Safety
/// - `ptr` must be null or a valid pointer returned by `wind_viz_new`.
/// - `out_array` and `out_len` must be valid, writable pointers.
#[no_mangle]
pub unsafe extern "C" fn wind_viz_get_particles(
    ptr: *const WindVizInstance,
    out_array: *mut *const WindVizParticle,
    out_len: *mut usize,
) -> WindVizErrorCode {
    handle_ffi_result(|| {
        if out_array.is_null() {
            return Err(DefaultWindVizError::null_pointer("out_array"));
        }
        if out_len.is_null() {
            return Err(DefaultWindVizError::null_pointer("out_len"));
        }
        // SAFETY: forwarded caller contract
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let particles = lock(&instance.particles, "particles")?;
        // SAFETY: both out-pointers checked non-null above
        unsafe {
            *out_array = particles.as_ptr();
            *out_len = particles.len();
        }
        Ok(())
    })
}

/// Copy the shared cache's counters into `out_stats`.
///
/// # Safety
/// - `ptr` must be null or a valid pointer returned by `wind_viz_new`.
/// - `out_stats` must be a valid, writable pointer.
#[no_mangle]
pub unsafe extern "C" fn wind_viz_get_cache_stats(
    ptr: *const WindVizInstance,
    out_stats: *mut WindVizCacheStats,
) -> WindVizErrorCode {
    handle_ffi_result(|| {
        // SAFETY: forwarded caller contract
        let instance = unsafe { instance_from_ptr(ptr) }?;
        // SAFETY: null checked by `as_mut`, validity is the caller's contract
        let out = unsafe { out_stats.as_mut() }
            .ok_or_else(|| DefaultWindVizError::null_pointer("out_stats"))?;
        *out = instance.cache.stats().into();
        Ok(())
    })
}

//! C API for the wind visualization engine
//!
//! Lifecycle: `wind_viz_new` -> `wind_viz_start` -> (`wind_viz_set_viewport`,
//! `wind_viz_frame`, `wind_viz_get_particles`)* -> `wind_viz_stop` ->
//! `wind_viz_destroy`. Wind data comes from a host callback, run on the
//! instance's worker threads.

mod error;
mod helpers;
mod instance;
mod queries;
mod simulation;
mod source;

pub use error::{wind_viz_get_last_error, wind_viz_get_last_error_code, WindVizErrorCode};
pub use instance::{wind_viz_destroy, wind_viz_new, WindVizInstance};
pub use queries::{
    wind_viz_get_cache_stats, wind_viz_get_particles, WindVizCacheStats, WindVizParticle,
};
pub use simulation::{
    wind_viz_frame, wind_viz_set_viewport, wind_viz_start, wind_viz_stop, WindVizFrameInfo,
    WindVizViewport,
};
pub use source::{WindVizFetchFn, WindVizSample};

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{CStr, CString};
    use std::os::raw::c_void;
    use std::ptr;
    use std::thread;
    use std::time::Duration;

    unsafe extern "C" fn steady_wind(
        _user_data: *mut c_void,
        _lat: f64,
        _lon: f64,
        out_sample: *mut WindVizSample,
    ) -> i32 {
        unsafe {
            *out_sample = WindVizSample {
                speed_ms: 6.0,
                direction_deg: 225.0,
            };
        }
        0
    }

    unsafe extern "C" fn rejecting_wind(
        _user_data: *mut c_void,
        _lat: f64,
        _lon: f64,
        _out_sample: *mut WindVizSample,
    ) -> i32 {
        429
    }

    fn viewport() -> WindVizViewport {
        WindVizViewport {
            lat_min: -1.0,
            lon_min: -1.0,
            lat_max: 1.0,
            lon_max: 1.0,
            width_px: 800,
            height_px: 600,
            zoom: 7.0,
        }
    }

    fn create(config: Option<&str>, fetch: WindVizFetchFn) -> *mut WindVizInstance {
        let json = config.map(|c| CString::new(c).unwrap());
        let mut instance = ptr::null_mut();
        let code = unsafe {
            wind_viz_new(
                json.as_ref().map_or(ptr::null(), |c| c.as_ptr()),
                Some(fetch),
                ptr::null_mut(),
                &mut instance,
            )
        };
        assert_eq!(code, WindVizErrorCode::Ok);
        assert!(!instance.is_null());
        instance
    }

    #[test]
    fn test_full_lifecycle_produces_particles() {
        let instance = create(Some(r#"{ "grid_resolution_deg": 1.0 }"#), steady_wind);
        unsafe {
            assert_eq!(wind_viz_start(instance, viewport()), WindVizErrorCode::Ok);
            thread::sleep(Duration::from_millis(200));

            let mut info = WindVizFrameInfo::default();
            assert_eq!(wind_viz_frame(instance, &mut info), WindVizErrorCode::Ok);
            assert!(info.running);
            assert!(info.particle_count >= 300);

            let mut array = ptr::null();
            let mut len = 0;
            assert_eq!(
                wind_viz_get_particles(instance, &mut array, &mut len),
                WindVizErrorCode::Ok
            );
            assert_eq!(len, info.drawn);
            assert!(!array.is_null());

            let mut stats = WindVizCacheStats::default();
            assert_eq!(
                wind_viz_get_cache_stats(instance, &mut stats),
                WindVizErrorCode::Ok
            );
            assert!(stats.fetches_dispatched >= 1);

            assert_eq!(wind_viz_stop(instance), WindVizErrorCode::Ok);
            assert_eq!(wind_viz_frame(instance, &mut info), WindVizErrorCode::Ok);
            assert!(!info.running);
            wind_viz_destroy(instance);
        }
    }

    #[test]
    fn test_frame_before_start_is_idle() {
        let instance = create(None, steady_wind);
        unsafe {
            let mut info = WindVizFrameInfo::default();
            assert_eq!(wind_viz_frame(instance, &mut info), WindVizErrorCode::Ok);
            assert!(!info.running);
            wind_viz_destroy(instance);
        }
    }

    #[test]
    fn test_rejected_fetches_are_counted_not_fatal() {
        let instance = create(Some(r#"{ "grid_resolution_deg": 2.0 }"#), rejecting_wind);
        unsafe {
            assert_eq!(wind_viz_start(instance, viewport()), WindVizErrorCode::Ok);
            thread::sleep(Duration::from_millis(200));
            let mut info = WindVizFrameInfo::default();
            assert_eq!(wind_viz_frame(instance, &mut info), WindVizErrorCode::Ok);

            let mut stats = WindVizCacheStats::default();
            wind_viz_get_cache_stats(instance, &mut stats);
            assert!(stats.fetch_failures >= 1);
            assert_eq!(stats.size, 0);
            wind_viz_destroy(instance);
        }
    }

    #[test]
    fn test_null_pointers_are_reported() {
        unsafe {
            assert_eq!(
                wind_viz_start(ptr::null(), viewport()),
                WindVizErrorCode::NullPointer
            );
            let message = CStr::from_ptr(wind_viz_get_last_error());
            assert_eq!(message.to_str().unwrap(), "Parameter 'ptr' cannot be null");
            assert_eq!(wind_viz_get_last_error_code(), WindVizErrorCode::NullPointer);

            let mut instance = ptr::null_mut();
            assert_eq!(
                wind_viz_new(ptr::null(), None, ptr::null_mut(), &mut instance),
                WindVizErrorCode::NullPointer
            );
            assert!(instance.is_null());

            // Destroying null is a no-op
            wind_viz_destroy(ptr::null_mut());
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let bad = CString::new(r#"{ "max_concurrent": 0 }"#).unwrap();
        let mut instance = ptr::null_mut();
        unsafe {
            assert_eq!(
                wind_viz_new(bad.as_ptr(), Some(steady_wind), ptr::null_mut(), &mut instance),
                WindVizErrorCode::InvalidConfig
            );
            assert!(instance.is_null());
            let message = CStr::from_ptr(wind_viz_get_last_error()).to_str().unwrap();
            assert!(message.contains("max_concurrent"), "{message}");
        }
    }

    #[test]
    fn test_out_of_range_viewport_is_invalid() {
        let instance = create(None, steady_wind);
        unsafe {
            for view in [
                WindVizViewport {
                    lat_max: 95.0,
                    ..viewport()
                },
                WindVizViewport {
                    lon_min: f64::NAN,
                    ..viewport()
                },
                WindVizViewport {
                    lon_max: 200.0,
                    ..viewport()
                },
            ] {
                assert_eq!(
                    wind_viz_set_viewport(instance, view),
                    WindVizErrorCode::InvalidParameter
                );
            }
            let message = CStr::from_ptr(wind_viz_get_last_error()).to_str().unwrap();
            assert!(message.contains("Viewport corners"), "{message}");

            // Poles themselves are accepted; the renderer trims them
            let polar = WindVizViewport {
                lat_min: -90.0,
                lat_max: 90.0,
                ..viewport()
            };
            assert_eq!(wind_viz_start(instance, polar), WindVizErrorCode::Ok);
            wind_viz_destroy(instance);
        }
    }

    #[test]
    fn test_zero_sized_viewport_is_invalid() {
        let instance = create(None, steady_wind);
        unsafe {
            let view = WindVizViewport {
                width_px: 0,
                ..viewport()
            };
            assert_eq!(
                wind_viz_start(instance, view),
                WindVizErrorCode::InvalidParameter
            );
            // A later good call clears the error
            assert_eq!(wind_viz_start(instance, viewport()), WindVizErrorCode::Ok);
            assert!(wind_viz_get_last_error().is_null());
            wind_viz_destroy(instance);
        }
    }
}

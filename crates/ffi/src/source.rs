use async_trait::async_trait;
use std::os::raw::c_void;
use wind_viz_core::{Degrees, FetchError, MetersPerSecond, WindDataSource, WindSample};

/// Wind reported by the host's fetch callback
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindVizSample {
    /// Wind speed (m/s)
    pub speed_ms: f64,
    /// Direction the wind blows from, degrees clockwise from north
    pub direction_deg: f64,
}

/// Host-supplied wind provider.
///
/// Called on a background worker thread with the centre of the cell being
/// fetched; it may block (e.g. on an HTTP request). Write the result to
/// `out_sample` and return:
/// - `0` on success
/// - a positive provider status (e.g. 429, 503) when the provider refused
/// - a negative value for transport failures
pub type WindVizFetchFn = unsafe extern "C" fn(
    user_data: *mut c_void,
    lat: f64,
    lon: f64,
    out_sample: *mut WindVizSample,
) -> i32;

/// Opaque host pointer handed back to every callback invocation
#[derive(Debug, Clone, Copy)]
struct UserData(*mut c_void);

impl UserData {
    fn as_ptr(self) -> *mut c_void {
        self.0
    }
}

// SAFETY: `wind_viz_new` requires `user_data` to be usable from any thread
// for the lifetime of the instance.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

/// [`WindDataSource`] forwarding to a C callback
pub(crate) struct CallbackSource {
    fetch: WindVizFetchFn,
    user_data: UserData,
}

impl CallbackSource {
    pub fn new(fetch: WindVizFetchFn, user_data: *mut c_void) -> Self {
        Self {
            fetch,
            user_data: UserData(user_data),
        }
    }
}

#[async_trait]
impl WindDataSource for CallbackSource {
    async fn fetch(&self, lat: f64, lon: f64) -> Result<WindSample, FetchError> {
        let fetch = self.fetch;
        let user_data = self.user_data;
        let (status, sample) = tokio::task::spawn_blocking(move || {
            let mut sample = WindVizSample::default();
            // SAFETY: the host guarantees the callback and `user_data` stay
            // valid until `wind_viz_destroy`, and `sample` is a live local
            let status = unsafe { fetch(user_data.as_ptr(), lat, lon, &mut sample) };
            (status, sample)
        })
        .await
        .map_err(|err| FetchError::Transport(format!("fetch callback did not complete: {err}")))?;

        match status {
            0 if sample.speed_ms.is_finite() && sample.direction_deg.is_finite() => {
                Ok(WindSample::new(
                    MetersPerSecond::new(sample.speed_ms),
                    Degrees::new(sample.direction_deg).normalized(),
                ))
            }
            0 => Err(FetchError::InvalidResponse(
                "callback reported non-finite wind".to_string(),
            )),
            status if status > 0 => Err(FetchError::Rejected {
                status: u16::try_from(status).unwrap_or(u16::MAX),
            }),
            status => Err(FetchError::Transport(format!(
                "callback reported transport failure ({status})"
            ))),
        }
    }

    fn name(&self) -> &str {
        "host-callback"
    }
}

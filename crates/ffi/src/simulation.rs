use tokio::time::Instant;
use wind_viz_core::{is_valid_coordinate, GeoBounds, ViewportProjection};

use crate::error::{DefaultWindVizError, WindVizErrorCode};
use crate::helpers::{handle_ffi_result, instance_from_ptr, lock, track_error};
use crate::instance::WindVizInstance;
use crate::queries::WindVizParticle;

/// Map viewport as the host's renderer currently shows it
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindVizViewport {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
    /// Viewport width in pixels
    pub width_px: u32,
    /// Viewport height in pixels
    pub height_px: u32,
    /// Slippy-map zoom level
    pub zoom: f64,
}

impl TryFrom<WindVizViewport> for ViewportProjection {
    type Error = DefaultWindVizError;

    fn try_from(view: WindVizViewport) -> Result<Self, Self::Error> {
        if !is_valid_coordinate(view.lat_min, view.lon_min)
            || !is_valid_coordinate(view.lat_max, view.lon_max)
        {
            return Err(DefaultWindVizError::invalid_parameter(format!(
                "Viewport corners must be finite and within lat [-90, 90], lon [-180, 180], \
                 got ({}, {}) to ({}, {})",
                view.lat_min, view.lon_min, view.lat_max, view.lon_max
            )));
        }
        if !view.zoom.is_finite() {
            return Err(DefaultWindVizError::invalid_parameter(
                "Viewport zoom must be finite".to_string(),
            ));
        }
        let bounds = GeoBounds::new(view.lat_min, view.lon_min, view.lat_max, view.lon_max);
        if view.width_px == 0 || view.height_px == 0 {
            return Err(DefaultWindVizError::invalid_parameter(format!(
                "Viewport size must be positive, got {}x{}",
                view.width_px, view.height_px
            )));
        }
        Ok(ViewportProjection::new(
            bounds,
            view.width_px,
            view.height_px,
            view.zoom,
        ))
    }
}

/// Summary of one `wind_viz_frame` call
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindVizFrameInfo {
    /// False when the instance is stopped; nothing else is filled in then
    pub running: bool,
    /// Time step applied, after clamping (s)
    pub dt_sec: f64,
    pub particle_count: usize,
    /// Particles returned by `wind_viz_get_particles` for this frame
    pub drawn: usize,
    /// Particles respawned this frame (aged out or left the view)
    pub respawned: usize,
    /// Fraction of the previous frame's trails to keep before drawing
    pub trail_fade: f32,
    /// A debounced viewport change was applied this frame
    pub viewport_refreshed: bool,
}

/// Start animating over `viewport` and prime its wind cells.
///
/// No-op if already running.
///
/// # Safety
/// `ptr` must be null or a valid pointer returned by `wind_viz_new`.
#[no_mangle]
pub unsafe extern "C" fn wind_viz_start(
    ptr: *const WindVizInstance,
    viewport: WindVizViewport,
) -> WindVizErrorCode {
    handle_ffi_result(|| {
        // SAFETY: forwarded caller contract
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let view = ViewportProjection::try_from(viewport)?;

        let mut driver = lock(&instance.driver, "driver")?;
        *lock(&instance.view, "view")? = Some(view);
        driver.start(&view, Instant::now());
        Ok(())
    })
}

/// Report a pan or zoom. Cells are re-primed once the map has been still
/// for `viewport_debounce_ms`; frames render against the new viewport at once.
///
/// # Safety
/// `ptr` must be null or a valid pointer returned by `wind_viz_new`.
#[no_mangle]
pub unsafe extern "C" fn wind_viz_set_viewport(
    ptr: *const WindVizInstance,
    viewport: WindVizViewport,
) -> WindVizErrorCode {
    handle_ffi_result(|| {
        // SAFETY: forwarded caller contract
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let view = ViewportProjection::try_from(viewport)?;

        let mut driver = lock(&instance.driver, "driver")?;
        *lock(&instance.view, "view")? = Some(view);
        driver.viewport_changed(Instant::now());
        Ok(())
    })
}

/// Advance the particles to now and collect their pixel positions.
///
/// Call once per rendered frame. Apply `trail_fade` to your trail layer, then
/// draw what `wind_viz_get_particles` returns.
///
/// # Safety
/// - `ptr` must be null or a valid pointer returned by `wind_viz_new`.
/// - `out_info` must be null or point to writable memory; null skips the summary.
#[no_mangle]
pub unsafe extern "C" fn wind_viz_frame(
    ptr: *const WindVizInstance,
    out_info: *mut WindVizFrameInfo,
) -> WindVizErrorCode {
    // SAFETY: forwarded caller contract
    let instance = match unsafe { instance_from_ptr(ptr) } {
        Ok(instance) => instance,
        Err(err) => return track_error(&err),
    };
    let mut info = WindVizFrameInfo::default();

    let code = handle_ffi_result(|| {
        let _runtime = instance.runtime().enter();
        let mut driver = lock(&instance.driver, "driver")?;
        let Some(view) = *lock(&instance.view, "view")? else {
            // Never started
            return Ok(());
        };
        let mut surface = lock(&instance.surface, "surface")?;
        let mut particles = lock(&instance.particles, "particles")?;

        surface.reset();
        let Some(report) = driver.frame(&view, &mut *surface, Instant::now()) else {
            particles.clear();
            return Ok(());
        };

        particles.clear();
        particles.extend(
            surface
                .particles()
                .map(|(x, y, speed)| WindVizParticle { x, y, speed }),
        );
        info = WindVizFrameInfo {
            running: true,
            dt_sec: report.dt.as_secs_f64(),
            particle_count: report.particle_count,
            drawn: report.drawn,
            respawned: report.counts.respawned(),
            trail_fade: driver.config().trail_fade,
            viewport_refreshed: report.viewport_refreshed,
        };
        Ok(())
    });

    if let Some(out) = unsafe { out_info.as_mut() } {
        *out = info;
    }
    code
}

/// Stop animating and drop the particle pool. Fetches already dispatched
/// still complete and stay cached.
///
/// # Safety
/// `ptr` must be null or a valid pointer returned by `wind_viz_new`.
#[no_mangle]
pub unsafe extern "C" fn wind_viz_stop(ptr: *const WindVizInstance) -> WindVizErrorCode {
    handle_ffi_result(|| {
        // SAFETY: forwarded caller contract
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let mut driver = lock(&instance.driver, "driver")?;
        let mut surface = lock(&instance.surface, "surface")?;
        driver.stop(&mut *surface);
        lock(&instance.particles, "particles")?.clear();
        Ok(())
    })
}

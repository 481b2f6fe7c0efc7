//! Frame loop tying the wind cache, the particle pool and the renderer together
//!
//! The driver is a two-state machine. While **Running**, the host calls
//! [`SimulationDriver::frame`] once per animation frame; each call
//!
//! 1. clamps the elapsed time to `max_frame_step_ms`,
//! 2. handles a debounced viewport change whose quiet period has passed,
//! 3. samples wind for every particle through one cache snapshot and steps it,
//! 4. fades the surface by `trail_fade` and draws every on-screen particle.
//!
//! Nothing in a frame awaits. Cache priming runs as a background batch task,
//! and its fetches land in the cache between frames.

use crate::cache::{BatchSummary, CellCache};
use crate::config::WindVizConfig;
use crate::core_types::Vec2;
use crate::grid::{cell_key, visible_cells, CellKey, GeoBounds, MapView, WebMercator};
use crate::particles::{ParticleField, StepCounts};
use crate::simulation::render::DrawSurface;
use crate::simulation::sampling::sample_wind;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No frames are being produced
    Idle,
    /// The host is expected to call `frame` every animation frame
    Running,
}

/// What one frame did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Time step actually applied, after clamping
    pub dt: Duration,
    pub particle_count: usize,
    /// Particles that projected on-screen and were drawn
    pub drawn: usize,
    pub counts: StepCounts,
    /// A debounced viewport change was applied this frame
    pub viewport_refreshed: bool,
}

/// Per-view animation driver.
///
/// Owns its particle pool and shares the cache; several drivers over one
/// [`CellCache`] deduplicate their fetches through it.
pub struct SimulationDriver {
    config: WindVizConfig,
    cache: CellCache,
    field: ParticleField,
    state: DriverState,
    last_frame_at: Option<Instant>,
    zoom: f64,
    /// Deadline after which a pending viewport change is applied
    pending_viewport: Option<Instant>,
    priming: Option<JoinHandle<BatchSummary>>,
    last_primed_at: Option<Instant>,
    /// Physical wind speed sampled for each particle this frame
    speeds: Vec<f32>,
}

impl SimulationDriver {
    /// Idle driver over `cache`. `config` is expected to have passed
    /// [`WindVizConfig::validate`].
    #[must_use]
    pub fn new(config: WindVizConfig, cache: CellCache) -> Self {
        let field = ParticleField::from_config(&config);
        Self {
            config,
            cache,
            field,
            state: DriverState::Idle,
            last_frame_at: None,
            zoom: 0.0,
            pending_viewport: None,
            priming: None,
            last_primed_at: None,
            speeds: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == DriverState::Running
    }

    #[must_use]
    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    #[must_use]
    pub fn cache(&self) -> &CellCache {
        &self.cache
    }

    #[must_use]
    pub fn config(&self) -> &WindVizConfig {
        &self.config
    }

    /// Zoom level the particle pool was last laid out for
    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Whether a viewport change is waiting out its debounce
    #[must_use]
    pub fn has_pending_viewport(&self) -> bool {
        self.pending_viewport.is_some()
    }

    /// Hand over the most recent priming batch, e.g. to await it in a test
    pub fn take_priming_task(&mut self) -> Option<JoinHandle<BatchSummary>> {
        self.priming.take()
    }

    /// Idle -> Running: lay out the pool over `view` and prime its cells.
    ///
    /// Does nothing when already running. A view with non-finite bounds
    /// leaves the driver idle.
    pub fn start<V: MapView + ?Sized>(&mut self, view: &V, now: Instant) {
        if self.is_running() {
            debug!("Simulation already running, ignoring start");
            return;
        }
        let bounds = view.bounds().mercator_clamped();
        if !bounds.is_finite() {
            warn!("Cannot start wind simulation: viewport bounds are not finite");
            return;
        }

        let (width, height) = view.size_px();
        let target = self.config.target_particle_count(width, height);
        self.field.resize(&bounds, target);
        self.zoom = view.zoom();
        self.prime(&bounds, now);

        self.state = DriverState::Running;
        self.last_frame_at = Some(now);
        self.pending_viewport = None;
        info!(
            "Wind simulation started: {} particles over {}x{} px at zoom {:.2}",
            target, width, height, self.zoom
        );
    }

    /// Record a pan or zoom. The change is applied on the first frame after
    /// `viewport_debounce_ms` of quiet; later calls push the deadline back.
    pub fn viewport_changed(&mut self, now: Instant) {
        if self.is_running() {
            self.pending_viewport = Some(now + self.config.viewport_debounce());
        }
    }

    /// Advance and draw one frame; `None` while idle
    pub fn frame<V, S>(&mut self, view: &V, surface: &mut S, now: Instant) -> Option<FrameReport>
    where
        V: MapView + ?Sized,
        S: DrawSurface + ?Sized,
    {
        if !self.is_running() {
            return None;
        }

        let elapsed = self
            .last_frame_at
            .map_or(Duration::ZERO, |at| now.saturating_duration_since(at));
        let dt = elapsed.min(self.config.max_frame_step());
        self.last_frame_at = Some(now);

        let mut viewport_refreshed = false;
        match self.pending_viewport {
            Some(deadline) if now >= deadline => {
                self.pending_viewport = None;
                self.apply_viewport(view, now);
                viewport_refreshed = true;
            }
            Some(_) => {}
            None => self.refresh_if_due(view, now),
        }

        let mut report = FrameReport {
            dt,
            particle_count: self.field.len(),
            drawn: 0,
            counts: StepCounts::default(),
            viewport_refreshed,
        };
        let bounds = view.bounds().mercator_clamped();
        if !bounds.is_finite() {
            return Some(report);
        }

        report.counts = self.advect(dt.as_secs_f64(), &bounds);

        surface.fade(self.config.trail_fade);
        for (particle, &speed) in self.field.particles().iter().zip(&self.speeds) {
            if let Some((x, y)) = view.project(particle.lat, particle.lon) {
                surface.draw_particle(x, y, speed);
                report.drawn += 1;
            }
        }
        Some(report)
    }

    /// Running -> Idle: drop the pool and wipe the surface.
    ///
    /// Fetches already dispatched are left to finish and still fill the cache.
    pub fn stop<S: DrawSurface + ?Sized>(&mut self, surface: &mut S) {
        if !self.is_running() {
            return;
        }
        self.field.clear();
        self.speeds.clear();
        surface.clear();
        self.state = DriverState::Idle;
        self.last_frame_at = None;
        self.pending_viewport = None;
        // Detach rather than abort, the batch only feeds the shared cache
        self.priming = None;
        info!("Wind simulation stopped");
    }

    /// Sample and step every particle against one cache snapshot
    fn advect(&mut self, dt: f64, bounds: &GeoBounds) -> StepCounts {
        let multiplier = self.config.wind_speed_multiplier;
        let mut counts = StepCounts::default();
        self.speeds.clear();

        let snapshot = self.cache.snapshot();
        for index in 0..self.field.len() {
            let Some(&particle) = self.field.particles().get(index) else {
                break;
            };
            let wind = if particle.is_expired() {
                Vec2::zeros()
            } else {
                sample_wind(&snapshot, particle.lat, particle.lon)
            };
            if let Some(outcome) =
                self.field
                    .step(index, dt, wind * multiplier, bounds, &WebMercator)
            {
                counts.record(outcome);
            }
            self.speeds.push(wind.norm() as f32);
        }
        // Released before any cache request below or in a later frame
        drop(snapshot);
        counts
    }

    fn apply_viewport<V: MapView + ?Sized>(&mut self, view: &V, now: Instant) {
        let bounds = view.bounds().mercator_clamped();
        if !bounds.is_finite() {
            return;
        }
        let (width, height) = view.size_px();
        let target = self.config.target_particle_count(width, height);
        self.field.resize(&bounds, target);

        let zoom = view.zoom();
        if (zoom - self.zoom).abs() > f64::EPSILON {
            // Respawn everything inside the new view on the next step
            self.field.expire_all();
            debug!("Zoom changed {:.2} -> {:.2}, respawning particle pool", self.zoom, zoom);
            self.zoom = zoom;
        }
        self.prime(&bounds, now);
    }

    /// Re-prime the current view once the last batch is done and a cooldown
    /// has passed, so failed and expired cells get retried
    fn refresh_if_due<V: MapView + ?Sized>(&mut self, view: &V, now: Instant) {
        let batch_done = match &self.priming {
            Some(task) => task.is_finished(),
            None => true,
        };
        let due = match self.last_primed_at {
            Some(at) => now.saturating_duration_since(at) >= self.config.cooldown(),
            None => true,
        };
        if batch_done && due {
            let bounds = view.bounds().mercator_clamped();
            if bounds.is_finite() {
                self.prime(&bounds, now);
            }
        }
    }

    /// Batch-request every visible cell, centre first
    fn prime(&mut self, bounds: &GeoBounds, now: Instant) {
        let res = self.cache.resolution_deg();
        let (center_lat, center_lon) = bounds.center();
        let center = cell_key(center_lat, center_lon, res);
        let mut keys: Vec<CellKey> = visible_cells(bounds, res).into_iter().collect();
        keys.sort_by_key(|key| {
            let d_lat = i64::from(key.lat_index) - i64::from(center.lat_index);
            let d_lon = i64::from(key.lon_index) - i64::from(center.lon_index);
            (d_lat * d_lat + d_lon * d_lon, *key)
        });

        // A newer viewport supersedes the old batch; its dispatched fetches still land
        if let Some(previous) = self.priming.take() {
            previous.abort();
        }
        debug!("Priming {} visible cells around {}", keys.len(), center);
        self.priming = Some(self.cache.spawn_batch(keys));
        self.last_primed_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{Degrees, MetersPerSecond};
    use crate::grid::ViewportProjection;
    use crate::simulation::render::{DrawCommand, RecordingSurface};
    use crate::wind::StaticWindSource;
    use std::sync::Arc;
    use tokio::runtime::Handle;
    use tokio::time;

    fn config() -> WindVizConfig {
        WindVizConfig {
            grid_resolution_deg: 1.0,
            global_rate_limit_ms: 0,
            seed: Some(11),
            ..Default::default()
        }
    }

    fn driver(config: WindVizConfig) -> SimulationDriver {
        let cache = CellCache::new(
            &config,
            Arc::new(StaticWindSource::new(
                MetersPerSecond::new(5.0),
                Degrees::new(270.0),
            )),
            Handle::current(),
        );
        SimulationDriver::new(config, cache)
    }

    fn view(zoom: f64) -> ViewportProjection {
        ViewportProjection::new(GeoBounds::new(0.0, 0.0, 2.0, 2.0), 400, 300, zoom)
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_driver_produces_no_frames() {
        let mut driver = driver(config());
        let mut surface = RecordingSurface::new();
        assert!(driver.frame(&view(6.0), &mut surface, Instant::now()).is_none());
        assert!(surface.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_lays_out_pool_and_primes_cells() {
        let mut driver = driver(config());
        driver.start(&view(6.0), Instant::now());
        assert_eq!(driver.state(), DriverState::Running);
        assert_eq!(driver.field().len(), config().target_particle_count(400, 300));

        let summary = driver.take_priming_task().unwrap().await.unwrap();
        assert_eq!(summary.dispatched, 4);
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(driver.cache().stats().size, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_clamps_large_gaps() {
        let mut driver = driver(config());
        let start = Instant::now();
        driver.start(&view(6.0), start);
        let mut surface = RecordingSurface::new();

        let report = driver
            .frame(&view(6.0), &mut surface, start + Duration::from_secs(5))
            .unwrap();
        assert_eq!(report.dt, Duration::from_millis(100));
        assert_eq!(surface.commands()[0], DrawCommand::Fade(0.92));
        assert_eq!(report.drawn, surface.particles().count());
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewport_change_waits_for_debounce() {
        let mut driver = driver(config());
        let start = Instant::now();
        driver.start(&view(6.0), start);
        let mut surface = RecordingSurface::new();

        driver.viewport_changed(start);
        let early = driver
            .frame(&view(7.0), &mut surface, start + Duration::from_millis(100))
            .unwrap();
        assert!(!early.viewport_refreshed);
        assert!(driver.has_pending_viewport());

        let late = driver
            .frame(&view(7.0), &mut surface, start + Duration::from_millis(300))
            .unwrap();
        assert!(late.viewport_refreshed);
        // Zoom changed, so every particle respawned
        assert_eq!(late.counts.expired, late.particle_count);
        assert_eq!(driver.zoom(), 7.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pan_without_zoom_keeps_particles() {
        let mut driver = driver(config());
        let start = Instant::now();
        driver.start(&view(6.0), start);
        let mut surface = RecordingSurface::new();

        driver.viewport_changed(start);
        let report = driver
            .frame(&view(6.0), &mut surface, start + Duration::from_millis(300))
            .unwrap();
        assert!(report.viewport_refreshed);
        assert!(report.counts.expired < report.particle_count);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_pool_and_surface() {
        let mut driver = driver(config());
        driver.start(&view(6.0), Instant::now());
        let mut surface = RecordingSurface::new();
        driver.stop(&mut surface);

        assert_eq!(driver.state(), DriverState::Idle);
        assert!(driver.field().is_empty());
        assert_eq!(surface.commands(), &[DrawCommand::Clear]);
        assert!(driver.frame(&view(6.0), &mut surface, Instant::now()).is_none());
    }
}

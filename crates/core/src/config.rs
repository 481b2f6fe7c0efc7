//! Engine configuration
//!
//! All options deserialize from a flat JSON/TOML-style table with
//! `#[serde(default)]`, so a host only spells out what it overrides. Call
//! [`WindVizConfig::validate`] before handing the config to the engine.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Finest accepted grid resolution (deg)
pub const MIN_RESOLUTION_DEG: f64 = 0.01;

/// Configuration for the wind cache, particle field and frame loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindVizConfig {
    /// Angular size of one grid cell in degrees (both axes)
    pub grid_resolution_deg: f64,

    /// How long a fetched cell stays servable (ms)
    pub cell_ttl_ms: u64,

    /// Minimum spacing between fetch attempts for the same cell (ms)
    /// Independent of TTL: cooldown gates refetching, TTL gates serving.
    pub cell_cooldown_ms: u64,

    /// Minimum spacing between any two fetch dispatches (ms)
    pub global_rate_limit_ms: u64,

    /// Maximum number of fetches in flight at once
    pub max_concurrent: usize,

    /// Lower bound on the particle pool size
    pub particle_count_min: usize,

    /// Upper bound on the particle pool size
    pub particle_count_max: usize,

    /// Particles per square pixel of viewport before clamping
    pub particle_density: f64,

    /// Shortest randomized particle lifetime (s)
    pub particle_life_min_sec: f64,

    /// Longest randomized particle lifetime (s)
    pub particle_life_max_sec: f64,

    /// Visual amplification applied to sampled wind before advection.
    /// Raw m/s displacement is imperceptible at map scale.
    pub wind_speed_multiplier: f64,

    /// Largest time step a single frame may advance (ms)
    pub max_frame_step_ms: u64,

    /// Quiet period after the last pan/zoom before the viewport is re-primed (ms)
    pub viewport_debounce_ms: u64,

    /// Fraction of the previous frame's trails kept each frame, in [0, 1]
    pub trail_fade: f32,

    /// Interval of the background eviction sweep (ms)
    pub eviction_interval_ms: u64,

    /// Seed for particle placement; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for WindVizConfig {
    fn default() -> Self {
        Self {
            grid_resolution_deg: 0.5,
            cell_ttl_ms: 30 * 60 * 1000,      // Provider updates hourly; 30 min is fresh enough
            cell_cooldown_ms: 5 * 60 * 1000,  // Don't re-ask for a cell more than every 5 min
            global_rate_limit_ms: 250,        // ~240 requests/min, under typical free quotas
            max_concurrent: 4,
            particle_count_min: 300,
            particle_count_max: 4000,
            particle_density: 0.0015,
            particle_life_min_sec: 2.0,
            particle_life_max_sec: 6.0,
            wind_speed_multiplier: 3000.0,
            max_frame_step_ms: 100,
            viewport_debounce_ms: 250,
            trail_fade: 0.92,
            eviction_interval_ms: 60 * 1000,
            seed: None,
        }
    }
}

impl WindVizConfig {
    /// Check every option for values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let res = self.grid_resolution_deg;
        if !res.is_finite() || !(MIN_RESOLUTION_DEG..=90.0).contains(&res) {
            return Err(ConfigError::new(
                "grid_resolution_deg",
                format!("must be in [{MIN_RESOLUTION_DEG}, 90], got {res}"),
            ));
        }
        if self.cell_ttl_ms == 0 {
            return Err(ConfigError::new("cell_ttl_ms", "must be positive"));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::new("max_concurrent", "must be at least 1"));
        }
        if self.particle_count_min > self.particle_count_max {
            return Err(ConfigError::new(
                "particle_count_min",
                format!(
                    "{} exceeds particle_count_max {}",
                    self.particle_count_min, self.particle_count_max
                ),
            ));
        }
        if !self.particle_density.is_finite() || self.particle_density < 0.0 {
            return Err(ConfigError::new(
                "particle_density",
                format!("must be finite and non-negative, got {}", self.particle_density),
            ));
        }
        let (life_min, life_max) = (self.particle_life_min_sec, self.particle_life_max_sec);
        if !life_min.is_finite() || life_min <= 0.0 {
            return Err(ConfigError::new(
                "particle_life_min_sec",
                format!("must be finite and positive, got {life_min}"),
            ));
        }
        if !life_max.is_finite() || life_max < life_min {
            return Err(ConfigError::new(
                "particle_life_max_sec",
                format!("must be finite and >= particle_life_min_sec, got {life_max}"),
            ));
        }
        if !self.wind_speed_multiplier.is_finite() || self.wind_speed_multiplier < 0.0 {
            return Err(ConfigError::new(
                "wind_speed_multiplier",
                format!("must be finite and non-negative, got {}", self.wind_speed_multiplier),
            ));
        }
        if self.max_frame_step_ms == 0 {
            return Err(ConfigError::new("max_frame_step_ms", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.trail_fade) {
            return Err(ConfigError::new(
                "trail_fade",
                format!("must be in [0, 1], got {}", self.trail_fade),
            ));
        }
        if self.eviction_interval_ms == 0 {
            return Err(ConfigError::new("eviction_interval_ms", "must be positive"));
        }
        Ok(())
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.cell_ttl_ms)
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cell_cooldown_ms)
    }

    #[must_use]
    pub fn global_rate_limit(&self) -> Duration {
        Duration::from_millis(self.global_rate_limit_ms)
    }

    #[must_use]
    pub fn max_frame_step(&self) -> Duration {
        Duration::from_millis(self.max_frame_step_ms)
    }

    #[must_use]
    pub fn viewport_debounce(&self) -> Duration {
        Duration::from_millis(self.viewport_debounce_ms)
    }

    #[must_use]
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }

    /// Pool size for a viewport of the given pixel dimensions
    #[must_use]
    pub fn target_particle_count(&self, width_px: u32, height_px: u32) -> usize {
        let area = f64::from(width_px) * f64::from(height_px);
        let raw = (area * self.particle_density).round();
        // f64 -> usize saturates, so huge viewports land on the max clamp
        (raw as usize).clamp(self.particle_count_min, self.particle_count_max)
    }
}

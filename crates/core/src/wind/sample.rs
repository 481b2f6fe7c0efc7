//! Wind samples and cached wind cells
//!
//! Providers report wind the way meteorologists do: a speed and the compass
//! bearing the wind blows *from* (0° = from north, 90° = from east). The
//! simulation needs Cartesian components instead:
//!
//! ```text
//! u = -speed · sin(dir)     (eastward, m/s)
//! v = -speed · cos(dir)     (northward, m/s)
//! ```
//!
//! which is the same as rotating by 180° to the "to" bearing and taking
//! `u = speed · sin(to)`, `v = speed · cos(to)`.

use crate::core_types::{Degrees, MetersPerSecond, Vec2};
use crate::grid::{cell_bounds, CellBounds, CellKey};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Instantaneous wind at one coordinate, as reported by a provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindSample {
    /// Wind speed
    pub speed: MetersPerSecond,
    /// Meteorological direction the wind blows from
    pub direction: Degrees,
}

impl WindSample {
    #[must_use]
    pub fn new(speed: MetersPerSecond, direction: Degrees) -> Self {
        Self { speed, direction }
    }

    /// Cartesian `(u, v)` components in m/s
    #[must_use]
    pub fn to_uv(&self) -> Vec2 {
        let dir = self.direction.to_radians();
        Vec2::new(-*self.speed * dir.sin(), -*self.speed * dir.cos())
    }

    /// Inverse of [`WindSample::to_uv`]; calm air reports direction 0°
    #[must_use]
    pub fn from_uv(uv: Vec2) -> Self {
        let speed = uv.x.hypot(uv.y);
        let direction = if speed > 0.0 {
            Degrees::new((-uv.x).atan2(-uv.y).to_degrees()).normalized()
        } else {
            Degrees::new(0.0)
        };
        Self::new(MetersPerSecond::new(speed), direction)
    }
}

/// A fetched wind vector for one grid cell
///
/// The bounding box is fully determined by `key` and the grid resolution;
/// `u`/`v` are always derived from `speed`/`direction`. Entries are replaced
/// wholesale on refetch, never merged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindCell {
    pub key: CellKey,
    pub bounds: CellBounds,
    /// Eastward component (m/s)
    pub u: f64,
    /// Northward component (m/s)
    pub v: f64,
    pub speed: MetersPerSecond,
    /// Meteorological "from" direction
    pub direction: Degrees,
    pub fetched_at: Instant,
}

impl WindCell {
    /// Build a cell entry from a provider sample
    #[must_use]
    pub fn from_sample(
        key: CellKey,
        resolution_deg: f64,
        sample: WindSample,
        fetched_at: Instant,
    ) -> Self {
        let uv = sample.to_uv();
        Self {
            key,
            bounds: cell_bounds(key, resolution_deg),
            u: uv.x,
            v: uv.y,
            speed: sample.speed,
            direction: sample.direction,
            fetched_at,
        }
    }

    /// Wind components as a vector
    #[inline]
    #[must_use]
    pub fn wind(&self) -> Vec2 {
        Vec2::new(self.u, self.v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample(speed: f64, direction: f64) -> WindSample {
        WindSample::new(MetersPerSecond::new(speed), Degrees::new(direction))
    }

    #[test]
    fn test_northerly_blows_south() {
        let uv = sample(10.0, 0.0).to_uv();
        assert_abs_diff_eq!(uv.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(uv.y, -10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_westerly_blows_east() {
        let uv = sample(10.0, 270.0).to_uv();
        assert_abs_diff_eq!(uv.x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(uv.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_matches_to_bearing_form() {
        for dir in [15.0_f64, 95.0, 181.0, 300.0] {
            let uv = sample(7.0, dir).to_uv();
            let to = (dir + 180.0).to_radians();
            assert_abs_diff_eq!(uv.x, 7.0 * to.sin(), epsilon = 1e-9);
            assert_abs_diff_eq!(uv.y, 7.0 * to.cos(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_from_uv_recovers_direction() {
        let back = WindSample::from_uv(sample(4.0, 135.0).to_uv());
        assert_abs_diff_eq!(*back.speed, 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(*back.direction, 135.0, epsilon = 1e-9);

        let calm = WindSample::from_uv(Vec2::zeros());
        assert_eq!(*calm.speed, 0.0);
        assert_eq!(*calm.direction, 0.0);
    }

    #[test]
    fn test_cell_bounds_follow_key() {
        let key = CellKey::new(3, -4);
        let cell = WindCell::from_sample(key, 0.5, sample(5.0, 90.0), Instant::now());
        assert_eq!(cell.bounds, cell_bounds(key, 0.5));
        assert_abs_diff_eq!(cell.u, -5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cell.v, 0.0, epsilon = 1e-9);
    }
}

//! Semantic unit types for wind quantities
//!
//! Newtype wrappers keep speeds and angles from being mixed up with each other
//! (or with raw lat/lon degrees) at the data-source boundary.
//!
//! # Design Philosophy
//! - All wrappers use f64; wind samples feed geographic math done in f64
//! - `Deref` to the raw f64 for arithmetic at the use site
//! - Serde support so samples can be logged or cached as JSON
//!
//! # Usage
//! ```
//! use wind_viz_core::core_types::units::{Degrees, MetersPerSecond};
//!
//! let speed = MetersPerSecond::new(10.0);
//! let from = Degrees::new(270.0);
//! assert_eq!(*speed, 10.0);
//! assert!((*from.to_radians() - 3.0 * std::f64::consts::FRAC_PI_2).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

// ============================================================================
// VELOCITY TYPES
// ============================================================================

/// Velocity in meters per second
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MetersPerSecond(f64);

impl Deref for MetersPerSecond {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl MetersPerSecond {
    /// Create a new velocity
    #[inline]
    #[must_use]
    pub const fn new(value: f64) -> Self {
        MetersPerSecond(value)
    }
}

impl fmt::Display for MetersPerSecond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} m/s", self.0)
    }
}

// ============================================================================
// ANGLE TYPES
// ============================================================================

/// Angle in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Degrees(f64);

impl Deref for Degrees {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Degrees {
    /// Create a new angle in degrees
    #[inline]
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Degrees(value)
    }

    /// Convert to radians
    #[inline]
    #[must_use]
    pub fn to_radians(self) -> Radians {
        Radians(self.0.to_radians())
    }

    /// Wrap into the compass range `[0, 360)`
    #[inline]
    #[must_use]
    pub fn normalized(self) -> Self {
        Degrees(self.0.rem_euclid(360.0))
    }
}

impl fmt::Display for Degrees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°", self.0)
    }
}

/// Angle in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Radians(f64);

impl Deref for Radians {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Radians {
    /// Compute sine
    #[inline]
    #[must_use]
    pub fn sin(self) -> f64 {
        self.0.sin()
    }

    /// Compute cosine
    #[inline]
    #[must_use]
    pub fn cos(self) -> f64 {
        self.0.cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrees_normalized() {
        assert_eq!(Degrees::new(-90.0).normalized(), Degrees::new(270.0));
        assert_eq!(Degrees::new(450.0).normalized(), Degrees::new(90.0));
        assert_eq!(Degrees::new(360.0).normalized(), Degrees::new(0.0));
    }

    #[test]
    fn test_display_units() {
        assert_eq!(format!("{}", MetersPerSecond::new(10.0)), "10.00 m/s");
        assert_eq!(format!("{}", Degrees::new(270.0)), "270.0°");
    }

    #[test]
    fn test_radians_trig() {
        let east = Degrees::new(90.0).to_radians();
        assert!((east.sin() - 1.0).abs() < 1e-12);
        assert!(east.cos().abs() < 1e-12);
    }
}

//! Geographic cell grid
//!
//! Maps a latitude/longitude pair to a discrete cell at a fixed angular
//! resolution and back. Every function here is pure: the same inputs always
//! produce the same key, and a key plus the resolution fully determines the
//! cell's bounding box.
//!
//! Callers must reject non-finite coordinates with [`is_valid_coordinate`]
//! before calling in; the cell assignment for NaN/inf input is meaningless.

use super::projection::MERCATOR_MAX_LAT;
use rustc_hash::{FxBuildHasher, FxHashSet};
use std::fmt;

/// Valid latitude range (degrees)
pub const LAT_RANGE: (f64, f64) = (-90.0, 90.0);

/// Valid longitude range (degrees)
pub const LON_RANGE: (f64, f64) = (-180.0, 180.0);

/// Identity of one grid cell: floor-divided latitude and longitude indices.
///
/// Storing integer indices instead of formatted floats keeps the key
/// injective and cheap to hash. [`CellKey::label`] renders the textual form
/// (`"{lat}_{lon}"` of the cell's south-west corner) for logs and wire use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    /// `floor(lat / resolution)`
    pub lat_index: i32,
    /// `floor(lon / resolution)`
    pub lon_index: i32,
}

impl CellKey {
    #[must_use]
    pub const fn new(lat_index: i32, lon_index: i32) -> Self {
        Self {
            lat_index,
            lon_index,
        }
    }

    /// Neighbouring key offset by whole cells
    #[must_use]
    pub const fn offset(self, d_lat: i32, d_lon: i32) -> Self {
        Self::new(self.lat_index + d_lat, self.lon_index + d_lon)
    }

    /// Textual key: floored latitude and longitude joined by `_`
    #[must_use]
    pub fn label(&self, resolution_deg: f64) -> String {
        format!(
            "{}_{}",
            f64::from(self.lat_index) * resolution_deg,
            f64::from(self.lon_index) * resolution_deg
        )
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lat_index, self.lon_index)
    }
}

/// Bounding box and centre of one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub center_lat: f64,
    pub center_lon: f64,
}

impl CellBounds {
    /// Inclusive containment test
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat) && (self.lon_min..=self.lon_max).contains(&lon)
    }
}

/// Geographic bounding box of a viewport (no antimeridian wrap)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl GeoBounds {
    /// Build from any two corners; the result is normalized so `min <= max`
    #[must_use]
    pub fn new(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> Self {
        Self {
            lat_min: lat_a.min(lat_b),
            lat_max: lat_a.max(lat_b),
            lon_min: lon_a.min(lon_b),
            lon_max: lon_a.max(lon_b),
        }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.lat_min.is_finite()
            && self.lat_max.is_finite()
            && self.lon_min.is_finite()
            && self.lon_max.is_finite()
    }

    /// Inclusive containment test
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat) && (self.lon_min..=self.lon_max).contains(&lon)
    }

    /// Same box clamped to the valid latitude/longitude ranges
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            lat_min: self.lat_min.clamp(LAT_RANGE.0, LAT_RANGE.1),
            lat_max: self.lat_max.clamp(LAT_RANGE.0, LAT_RANGE.1),
            lon_min: self.lon_min.clamp(LON_RANGE.0, LON_RANGE.1),
            lon_max: self.lon_max.clamp(LON_RANGE.0, LON_RANGE.1),
        }
    }

    /// Same box clamped to what Web Mercator can show: latitude within
    /// `±MERCATOR_MAX_LAT`, longitude within the valid range
    #[must_use]
    pub fn mercator_clamped(&self) -> Self {
        let clamped = self.clamped();
        Self {
            lat_min: clamped.lat_min.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT),
            lat_max: clamped.lat_max.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT),
            ..clamped
        }
    }

    #[must_use]
    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    #[must_use]
    pub fn lon_span(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.lat_min + self.lat_max) * 0.5,
            (self.lon_min + self.lon_max) * 0.5,
        )
    }
}

/// True when `(lat, lon)` is finite and inside the valid ranges
#[must_use]
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (LAT_RANGE.0..=LAT_RANGE.1).contains(&lat)
        && (LON_RANGE.0..=LON_RANGE.1).contains(&lon)
}

#[inline]
fn grid_index(value: f64, resolution_deg: f64) -> i32 {
    (value / resolution_deg).floor() as i32
}

/// Cell containing `(lat, lon)` at the given resolution
#[must_use]
pub fn cell_key(lat: f64, lon: f64, resolution_deg: f64) -> CellKey {
    CellKey::new(
        grid_index(lat, resolution_deg),
        grid_index(lon, resolution_deg),
    )
}

/// Bounding box and centre of `key` at the given resolution
#[must_use]
pub fn cell_bounds(key: CellKey, resolution_deg: f64) -> CellBounds {
    let lat_min = f64::from(key.lat_index) * resolution_deg;
    let lon_min = f64::from(key.lon_index) * resolution_deg;
    let lat_max = lat_min + resolution_deg;
    let lon_max = lon_min + resolution_deg;
    CellBounds {
        lat_min,
        lat_max,
        lon_min,
        lon_max,
        center_lat: (lat_min + lat_max) * 0.5,
        center_lon: (lon_min + lon_max) * 0.5,
    }
}

/// Upper bound on the set capacity `visible_cells` reserves up front
const MAX_CAPACITY_HINT: usize = 1 << 16;

/// Index range of cells touching `[min, max]` along one axis
fn index_span(min: f64, max: f64, resolution_deg: f64) -> (i32, i32) {
    let first = grid_index(min, resolution_deg);
    // A max sitting exactly on a cell edge belongs to the cell below it
    let last = ((max / resolution_deg).ceil() as i32 - 1).max(first);
    (first, last)
}

/// Cell count of the index ranges, computed wide and capped at `MAX_CAPACITY_HINT`
fn capacity_hint(lat: (i32, i32), lon: (i32, i32)) -> usize {
    let rows = i64::from(lat.1) - i64::from(lat.0) + 1;
    let cols = i64::from(lon.1) - i64::from(lon.0) + 1;
    usize::try_from(rows.saturating_mul(cols))
        .unwrap_or(0)
        .min(MAX_CAPACITY_HINT)
}

/// Every cell whose bounding box intersects `bounds`, clamped to the globe
#[must_use]
pub fn visible_cells(bounds: &GeoBounds, resolution_deg: f64) -> FxHashSet<CellKey> {
    let bounds = bounds.clamped();
    let (lat_first, lat_last) = index_span(bounds.lat_min, bounds.lat_max, resolution_deg);
    let (lon_first, lon_last) = index_span(bounds.lon_min, bounds.lon_max, resolution_deg);

    let capacity = capacity_hint((lat_first, lat_last), (lon_first, lon_last));
    let mut cells = FxHashSet::with_capacity_and_hasher(capacity, FxBuildHasher);
    for lat_index in lat_first..=lat_last {
        for lon_index in lon_first..=lon_last {
            cells.insert(CellKey::new(lat_index, lon_index));
        }
    }
    cells
}

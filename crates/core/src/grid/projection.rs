//! Planar projection and the map-view contract
//!
//! The map renderer is an external collaborator. It is modelled by the
//! [`MapView`] trait: it knows the geographic bounds of what is on screen, its
//! pixel size and zoom, and can turn a coordinate into a pixel (or `None` when
//! the coordinate is off-screen).
//!
//! Particle advection happens in the renderer's planar space rather than in
//! raw degrees, so a metre of wind moves a particle the same on-screen
//! distance at every latitude. Slippy-map renderers use spherical Web
//! Mercator (EPSG:3857), implemented here as [`WebMercator`].
//!
//! [`ViewportProjection`] is a concrete `MapView` over a Web Mercator
//! viewport, used by hosts that pass plain numbers across an FFI boundary and
//! by the headless demo.

use crate::core_types::Vec2;
use crate::grid::GeoBounds;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// Spherical Web Mercator earth radius (m)
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Latitude where Web Mercator becomes a square world (deg)
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Tile edge in pixels for zoom-level arithmetic
pub const TILE_SIZE_PX: f64 = 256.0;

/// Conversion between geographic coordinates and a planar metric space
pub trait PlanarProjection {
    /// Project `(lat, lon)` in degrees to planar metres
    fn to_planar(&self, lat: f64, lon: f64) -> Vec2;

    /// Inverse of [`PlanarProjection::to_planar`], returning `(lat, lon)`
    fn from_planar(&self, point: Vec2) -> (f64, f64);

    /// Planar metres per ground metre at `lat`
    fn scale_factor(&self, lat: f64) -> f64;
}

/// Spherical Web Mercator (EPSG:3857)
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl PlanarProjection for WebMercator {
    #[inline]
    fn to_planar(&self, lat: f64, lon: f64) -> Vec2 {
        let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
        Vec2::new(
            EARTH_RADIUS_M * lon.to_radians(),
            EARTH_RADIUS_M * (FRAC_PI_4 + lat * 0.5).tan().ln(),
        )
    }

    #[inline]
    fn from_planar(&self, point: Vec2) -> (f64, f64) {
        let lon = (point.x / EARTH_RADIUS_M).to_degrees();
        let lat = (2.0 * (point.y / EARTH_RADIUS_M).exp().atan() - FRAC_PI_2).to_degrees();
        (lat, lon)
    }

    #[inline]
    fn scale_factor(&self, lat: f64) -> f64 {
        1.0 / lat
            .clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT)
            .to_radians()
            .cos()
    }
}

/// What the simulation needs from the map renderer
pub trait MapView {
    /// Geographic bounding box currently on screen
    fn bounds(&self) -> GeoBounds;

    /// Viewport size in pixels `(width, height)`
    fn size_px(&self) -> (u32, u32);

    /// Current zoom level (slippy-map convention)
    fn zoom(&self) -> f64;

    /// Pixel position of `(lat, lon)`, or `None` when off-screen
    fn project(&self, lat: f64, lon: f64) -> Option<(f32, f32)>;
}

/// A Web Mercator viewport described by bounds, pixel size and zoom
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportProjection {
    bounds: GeoBounds,
    width_px: u32,
    height_px: u32,
    zoom: f64,
    planar_min: Vec2,
    planar_max: Vec2,
}

impl ViewportProjection {
    /// Latitudes beyond `±MERCATOR_MAX_LAT` are trimmed from `bounds`; the
    /// renderer cannot show them.
    #[must_use]
    pub fn new(bounds: GeoBounds, width_px: u32, height_px: u32, zoom: f64) -> Self {
        let bounds = bounds.mercator_clamped();
        let planar_min = WebMercator.to_planar(bounds.lat_min, bounds.lon_min);
        let planar_max = WebMercator.to_planar(bounds.lat_max, bounds.lon_max);
        Self {
            bounds,
            width_px,
            height_px,
            zoom,
            planar_min,
            planar_max,
        }
    }

    /// Viewport of `width_px` x `height_px` centred on a coordinate at a zoom level
    #[must_use]
    pub fn from_center(
        center_lat: f64,
        center_lon: f64,
        zoom: f64,
        width_px: u32,
        height_px: u32,
    ) -> Self {
        let world_px = TILE_SIZE_PX * zoom.exp2();
        let meters_per_px = 2.0 * PI * EARTH_RADIUS_M / world_px;
        let center = WebMercator.to_planar(center_lat, center_lon);
        let half = Vec2::new(
            f64::from(width_px) * 0.5 * meters_per_px,
            f64::from(height_px) * 0.5 * meters_per_px,
        );
        let (lat_min, lon_min) = WebMercator.from_planar(center - half);
        let (lat_max, lon_max) = WebMercator.from_planar(center + half);
        Self::new(
            GeoBounds::new(lat_min, lon_min, lat_max, lon_max),
            width_px,
            height_px,
            zoom,
        )
    }
}

impl MapView for ViewportProjection {
    fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    fn size_px(&self) -> (u32, u32) {
        (self.width_px, self.height_px)
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn project(&self, lat: f64, lon: f64) -> Option<(f32, f32)> {
        let span = self.planar_max - self.planar_min;
        if span.x <= 0.0 || span.y <= 0.0 {
            return None;
        }
        if !(-MERCATOR_MAX_LAT..=MERCATOR_MAX_LAT).contains(&lat) {
            return None;
        }
        let p = WebMercator.to_planar(lat, lon);
        let width = f64::from(self.width_px);
        let height = f64::from(self.height_px);
        let x = (p.x - self.planar_min.x) / span.x * width;
        let y = (self.planar_max.y - p.y) / span.y * height;
        if x.is_finite() && y.is_finite() && (0.0..=width).contains(&x) && (0.0..=height).contains(&y) {
            Some((x as f32, y as f32))
        } else {
            None
        }
    }
}

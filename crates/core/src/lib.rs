//! Wind Visualization Core Library
//!
//! Live wind-field visualization for slippy maps. Wind vectors are fetched
//! per grid cell from a rate-limited external provider, cached with a TTL,
//! and sampled every animation frame to advect a pool of tracer particles
//! whose positions are handed to the map renderer.
//!
//! ## Layout
//!
//! - [`grid`]: cell keys, bounds, visible-cell sets and Web Mercator math
//! - [`wind`]: wind samples and the [`WindDataSource`] provider contract
//! - [`cache`]: [`CellCache`] with cooldown, global pacing and a concurrency cap
//! - [`particles`]: the [`ParticleField`] pool and its advection step
//! - [`simulation`]: [`SimulationDriver`], bilinear sampling and the draw contract

// Core types and utilities
pub mod config;
pub mod core_types;
pub mod error;

// Engine modules
pub mod cache;
pub mod grid;
pub mod particles;
pub mod simulation;
pub mod wind;

// Re-export core types
pub use config::WindVizConfig;
pub use core_types::{Degrees, MetersPerSecond, Radians, Vec2};
pub use error::{ConfigError, FetchError};

// Re-export engine types
pub use cache::{BatchSummary, CacheSnapshot, CacheStats, CellCache, RequestOutcome};
pub use grid::{
    cell_bounds, cell_key, is_valid_coordinate, visible_cells, CellBounds, CellKey, GeoBounds,
    MapView, PlanarProjection, ViewportProjection, WebMercator,
};
pub use particles::{Particle, ParticleField, StepCounts, StepOutcome};
pub use simulation::{
    bilinear, sample_wind, CellLookup, DrawCommand, DrawSurface, DriverState, FrameReport,
    RecordingSurface, SimulationDriver,
};
#[cfg(feature = "http")]
pub use wind::OpenMeteoSource;
pub use wind::{FnWindSource, StaticWindSource, WindCell, WindDataSource, WindSample};

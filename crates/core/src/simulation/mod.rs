//! Frame loop: wind sampling, particle stepping and drawing

pub mod driver;
pub mod render;
pub mod sampling;

pub use driver::{DriverState, FrameReport, SimulationDriver};
pub use render::{DrawCommand, DrawSurface, RecordingSurface};
pub use sampling::{bilinear, sample_wind, CellLookup};

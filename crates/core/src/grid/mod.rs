//! Geographic grid and projection modules

pub mod geo_grid;
pub mod projection;

// Re-export main types
pub use geo_grid::*;
pub use projection::*;

//! Wind cell cache and its statistics

pub mod cell_cache;
pub mod stats;

pub use cell_cache::{BatchSummary, CacheSnapshot, CellCache, RequestOutcome};
pub use stats::CacheStats;

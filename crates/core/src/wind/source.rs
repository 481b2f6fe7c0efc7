//! Wind data sources
//!
//! The external provider is reached through [`WindDataSource`]. It is called
//! only from the cell cache's background fetch tasks, never from the frame
//! loop, so implementations are free to await network I/O.

use crate::core_types::{Degrees, MetersPerSecond};
use crate::error::FetchError;
use crate::wind::WindSample;
use async_trait::async_trait;

/// Provider of instantaneous wind for a coordinate
#[async_trait]
pub trait WindDataSource: Send + Sync {
    /// Wind at `(lat, lon)`, or why it could not be fetched
    async fn fetch(&self, lat: f64, lon: f64) -> Result<WindSample, FetchError>;

    /// Short name for logs
    fn name(&self) -> &str {
        "wind-source"
    }
}

/// Same wind everywhere
#[derive(Debug, Clone, Copy)]
pub struct StaticWindSource {
    sample: WindSample,
}

impl StaticWindSource {
    #[must_use]
    pub fn new(speed: MetersPerSecond, direction: Degrees) -> Self {
        Self {
            sample: WindSample::new(speed, direction),
        }
    }
}

impl Default for StaticWindSource {
    fn default() -> Self {
        Self::new(MetersPerSecond::new(5.0), Degrees::new(330.0))
    }
}

#[async_trait]
impl WindDataSource for StaticWindSource {
    async fn fetch(&self, _lat: f64, _lon: f64) -> Result<WindSample, FetchError> {
        Ok(self.sample)
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Source backed by a synchronous closure, for synthetic fields
pub struct FnWindSource<F> {
    name: String,
    func: F,
}

impl<F> FnWindSource<F>
where
    F: Fn(f64, f64) -> Result<WindSample, FetchError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> WindDataSource for FnWindSource<F>
where
    F: Fn(f64, f64) -> Result<WindSample, FetchError> + Send + Sync,
{
    async fn fetch(&self, lat: f64, lon: f64) -> Result<WindSample, FetchError> {
        (self.func)(lat, lon)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

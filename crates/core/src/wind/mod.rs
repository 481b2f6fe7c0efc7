//! Wind samples and the external data-source contract

#[cfg(feature = "http")]
pub mod open_meteo;
pub mod sample;
pub mod source;

pub use sample::{WindCell, WindSample};
pub use source::{FnWindSource, StaticWindSource, WindDataSource};

#[cfg(feature = "http")]
pub use open_meteo::OpenMeteoSource;

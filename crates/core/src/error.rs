//! Error types for the wind visualization engine
//!
//! Only two kinds of failure ever surface as values:
//! - [`FetchError`] from a [`WindDataSource`](crate::wind::WindDataSource). The
//!   cell cache swallows these at its boundary (counted in stats, logged), so
//!   the render loop never sees them.
//! - [`ConfigError`] from [`WindVizConfig::validate`](crate::config::WindVizConfig::validate).
//!
//! Rate limiting and stale data are not errors: a throttled request is a
//! deliberate no-op and an expired cell reads as a cache miss.

use thiserror::Error;

/// Failure of a single wind fetch for one coordinate.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Provider answered with a non-success status (quota, outage, bad request)
    #[error("wind provider rejected request with status {status}")]
    Rejected {
        /// HTTP-style status code reported by the provider
        status: u16,
    },

    /// Network or transport failure before a response was received
    #[error("wind provider transport error: {0}")]
    Transport(String),

    /// Provider answered but the payload did not contain a usable sample
    #[error("wind provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Rejected {
                status: status.as_u16(),
            },
            None if err.is_decode() => FetchError::InvalidResponse(err.to_string()),
            None => FetchError::Transport(err.to_string()),
        }
    }
}

/// A configuration value that cannot drive the engine.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid configuration for `{field}`: {reason}")]
pub struct ConfigError {
    /// Name of the offending field as it appears in the config file
    pub field: &'static str,
    /// What constraint was violated
    pub reason: String,
}

impl ConfigError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

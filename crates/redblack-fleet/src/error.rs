//! Error types for fleet control and cloud lookups.

use redblack_core::ConfigError;
use thiserror::Error;

/// Result type alias for control-plane operations.
pub type FleetResult<T> = Result<T, FleetError>;

/// A control-plane call failed. Never retried at this layer.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} timed out after {secs}s")]
    RequestTimeout { url: String, secs: u64 },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("no task handle in response from {url}")]
    MissingTask { url: String },

    #[error("task {url} failed")]
    TaskFailed { url: String },

    #[error("cluster {0} reports no groups")]
    EmptyCluster(String),

    #[error("group {0} not found")]
    GroupNotFound(String),

    #[error("image {0} not found in any profile")]
    ImageNotFound(String),

    #[error("{count} images returned for {image_id} across profiles {profiles}")]
    AmbiguousImage {
        image_id: String,
        count: usize,
        profiles: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FleetError {
    pub fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub fn decode(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

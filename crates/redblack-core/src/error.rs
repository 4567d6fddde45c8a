//! Error types for identity validation and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// An image or group carries tags that do not name a complete identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("missing required tag `{0}`")]
    MissingTag(&'static str),

    #[error("neither `cluster` nor `play` tag is present")]
    MissingCluster,
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

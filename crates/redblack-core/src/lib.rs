//! redblack-core: shared types for red/black cluster deployments.
//!
//! Everything here is owned by external systems (the fleet control plane,
//! the autoscaling plane, load balancers) and only observed by the
//! orchestrator. Nothing is persisted.

pub mod config;
pub mod context;
pub mod error;
pub mod types;

pub use config::{Config, ProfileConfig, TimeoutConfig};
pub use context::RunContext;
pub use error::{ConfigError, IdentityError};
pub use types::*;

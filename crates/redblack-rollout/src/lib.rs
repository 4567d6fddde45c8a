//! redblack rollout: red/black deployment of a machine image.
//!
//! Given an image id, the rollout resolves which logical workload the
//! image belongs to, stands up one replacement group per cluster, gates
//! on instance health and then load balancer health, and finally retires
//! the old groups. If load balancers never turn healthy the new groups
//! are deactivated and the old ones keep serving.
//!
//! # Components
//!
//! - **`identity`**: image tags → (environment, deployment, cluster)
//! - **`finder`**: active groups matching an identity
//! - **`plan`**: per-run old/new group bookkeeping
//! - **`controller`**: the deployment state machine

pub mod controller;
pub mod error;
pub mod finder;
pub mod identity;
pub mod plan;

pub use controller::{Backends, DeployPhase, DeploySettings, Deployer};
pub use error::DeployError;
pub use finder::GroupFinder;
pub use identity::IdentityResolver;
pub use plan::{DeployReport, DeploymentPlan};

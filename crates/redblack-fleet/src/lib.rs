//! redblack-fleet: everything that talks to the fleet control plane.
//!
//! # Components
//!
//! - **`control`**: `FleetControl`: create, activate, and deactivate groups; task status
//! - **`topology`**: `TopologyIndex`: which cluster each group belongs to
//! - **`cloud`**: read-only image, autoscaling group, and load balancer views
//! - **`asgard`**: HTTP backend implementing all of the above
//!
//! All seams are `async_trait` traits so the orchestrator can run
//! against an in-memory fleet in tests.

pub mod asgard;
pub mod cloud;
pub mod control;
pub mod error;
pub mod http;
pub mod topology;

pub use asgard::Asgard;
pub use cloud::{AutoscalingPlane, GroupPage, ImageCatalog, LoadBalancerService};
pub use control::FleetControl;
pub use error::{FleetError, FleetResult};
pub use topology::{ClusterDirectory, ClusterMembers, TopologyIndex};

//! Read-only views of the cloud provider: images, autoscaling groups,
//! and load balancers.

use async_trait::async_trait;
use redblack_core::{Group, LoadBalancer, RunContext, Tags};

use crate::error::FleetResult;

/// Looks up image metadata.
#[async_trait]
pub trait ImageCatalog: Send + Sync {
    /// Tags of the single image with this id.
    ///
    /// Fails if no profile knows the image, or more than one does.
    async fn image_tags(&self, ctx: &RunContext, image_id: &str) -> FleetResult<Tags>;
}

/// One page of autoscaling groups.
#[derive(Debug, Clone, Default)]
pub struct GroupPage {
    pub groups: Vec<Group>,
    /// Token for the next page, `None` on the last page.
    pub next_token: Option<String>,
}

/// Enumerates and describes autoscaling groups.
#[async_trait]
pub trait AutoscalingPlane: Send + Sync {
    async fn list_groups(&self, ctx: &RunContext, next_token: Option<&str>)
        -> FleetResult<GroupPage>;

    async fn describe_group(&self, ctx: &RunContext, name: &str) -> FleetResult<Group>;
}

/// Reports instance health behind load balancers.
#[async_trait]
pub trait LoadBalancerService: Send + Sync {
    async fn describe_load_balancer(&self, ctx: &RunContext, name: &str)
        -> FleetResult<LoadBalancer>;
}

//! Identity resolution: which workload an image belongs to.

use std::sync::Arc;

use redblack_core::{Edc, RunContext};
use redblack_fleet::ImageCatalog;
use tracing::info;

use crate::controller::DeployPhase;
use crate::error::DeployError;

/// Maps an image id to its (environment, deployment, cluster) identity.
#[derive(Clone)]
pub struct IdentityResolver {
    images: Arc<dyn ImageCatalog>,
}

impl IdentityResolver {
    pub fn new(images: Arc<dyn ImageCatalog>) -> Self {
        Self { images }
    }

    /// Read the image's tags and validate them into an identity.
    pub async fn resolve(&self, ctx: &RunContext, image_id: &str) -> Result<Edc, DeployError> {
        info!(run = %ctx.run_id, %image_id, "looking up identity");
        let tags = self
            .images
            .image_tags(ctx, image_id)
            .await
            .map_err(DeployError::control_plane(DeployPhase::ResolveIdentity))?;

        Edc::from_tags(&tags).map_err(|source| DeployError::Identity {
            image_id: image_id.to_string(),
            source,
        })
    }
}

//! Cluster topology: which cluster each autoscaling group belongs to.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use redblack_core::{ClusterName, GroupName, RunContext};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FleetResult;

/// A cluster and all of its member groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMembers {
    pub cluster: ClusterName,
    #[serde(rename = "autoScalingGroups")]
    pub groups: Vec<GroupName>,
}

/// Source of the full cluster listing.
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    async fn list_clusters(&self, ctx: &RunContext) -> FleetResult<Vec<ClusterMembers>>;
}

/// Maps groups to the clusters that contain them.
#[derive(Clone)]
pub struct TopologyIndex {
    directory: Arc<dyn ClusterDirectory>,
}

impl TopologyIndex {
    pub fn new(directory: Arc<dyn ClusterDirectory>) -> Self {
        Self { directory }
    }

    /// Clusters with at least one member in `groups`, each mapped to
    /// *all* of its member groups, not just the matching ones.
    ///
    /// Reads a fresh listing on every call.
    pub async fn clusters_for_groups(
        &self,
        ctx: &RunContext,
        groups: &BTreeSet<GroupName>,
    ) -> FleetResult<BTreeMap<ClusterName, Vec<GroupName>>> {
        let listing = self.directory.list_clusters(ctx).await?;

        let relevant: BTreeMap<_, _> = listing
            .into_iter()
            .filter(|entry| entry.groups.iter().any(|g| groups.contains(g)))
            .map(|entry| (entry.cluster, entry.groups))
            .collect();

        debug!(
            run = %ctx.run_id,
            candidates = groups.len(),
            clusters = relevant.len(),
            "resolved clusters for groups"
        );
        Ok(relevant)
    }
}

//! Per-run deployment bookkeeping.

use std::collections::{BTreeMap, BTreeSet};

use redblack_core::{ClusterName, Edc, GroupName};
use serde::Serialize;

/// Old and new groups of one deployment run, keyed by cluster.
///
/// Holds at most one new group per cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentPlan {
    pub identity: Edc,
    /// Every member of each cluster at the time the run started.
    pub old_groups: BTreeMap<ClusterName, Vec<GroupName>>,
    /// The group this run created for each cluster.
    pub new_groups: BTreeMap<ClusterName, GroupName>,
}

impl DeploymentPlan {
    pub fn new(identity: Edc, old_groups: BTreeMap<ClusterName, Vec<GroupName>>) -> Self {
        Self {
            identity,
            old_groups,
            new_groups: BTreeMap::new(),
        }
    }

    pub fn clusters(&self) -> impl Iterator<Item = &ClusterName> {
        self.old_groups.keys()
    }

    pub fn is_old(&self, cluster: &str, group: &str) -> bool {
        self.old_groups
            .get(cluster)
            .is_some_and(|groups| groups.iter().any(|g| g == group))
    }

    /// Every old group across all clusters.
    pub fn all_old_groups(&self) -> impl Iterator<Item = &GroupName> {
        self.old_groups.values().flatten()
    }

    pub fn all_new_groups(&self) -> impl Iterator<Item = &GroupName> {
        self.new_groups.values()
    }
}

/// Outcome of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    #[serde(flatten)]
    pub plan: DeploymentPlan,
    pub load_balancers: BTreeSet<String>,
}

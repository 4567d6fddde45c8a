//! Fleet control operations.
//!
//! Mutations return a [`Task`] handle; callers poll [`FleetControl::task_status`]
//! until the task is terminal. Errors propagate as-is, nothing here retries.

use std::collections::BTreeSet;

use async_trait::async_trait;
use redblack_core::{GroupName, RunContext, Task, TaskStatus};

use crate::error::FleetResult;

#[async_trait]
pub trait FleetControl: Send + Sync {
    /// Request the next group of `cluster` running `image_id`, with traffic
    /// disabled and health checking enabled.
    async fn create_next_group(
        &self,
        ctx: &RunContext,
        cluster: &str,
        image_id: &str,
    ) -> FleetResult<Task>;

    /// Enable traffic to a group.
    async fn activate(&self, ctx: &RunContext, group: &str) -> FleetResult<Task>;

    /// Disable traffic to a group.
    async fn deactivate(&self, ctx: &RunContext, group: &str) -> FleetResult<Task>;

    async fn task_status(&self, ctx: &RunContext, task: &Task) -> FleetResult<TaskStatus>;

    /// Member groups of a cluster in creation order; the newest is last.
    async fn groups_for_cluster(&self, ctx: &RunContext, cluster: &str)
        -> FleetResult<Vec<GroupName>>;

    async fn load_balancers_for(&self, ctx: &RunContext, group: &str)
        -> FleetResult<BTreeSet<String>>;
}

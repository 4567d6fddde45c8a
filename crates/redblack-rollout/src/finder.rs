//! Group discovery: the groups currently serving an identity.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use redblack_core::{Edc, Group, GroupName, RunContext};
use redblack_fleet::{AutoscalingPlane, FleetError, FleetResult};
use tracing::debug;

/// Finds autoscaling groups whose tags resolve to a given identity.
#[derive(Clone)]
pub struct GroupFinder {
    plane: Arc<dyn AutoscalingPlane>,
}

impl GroupFinder {
    pub fn new(plane: Arc<dyn AutoscalingPlane>) -> Self {
        Self { plane }
    }

    /// Lazily walk every group page and yield the matching groups.
    ///
    /// Each call starts a fresh enumeration. Groups whose tags do not
    /// form an identity are skipped.
    pub fn find_groups<'a>(
        &'a self,
        ctx: &'a RunContext,
        identity: &'a Edc,
    ) -> BoxStream<'a, FleetResult<Group>> {
        // `None` once the last page has been read.
        let start: Option<Option<String>> = Some(None);

        stream::try_unfold(start, move |cursor| async move {
            let Some(token) = cursor else {
                return Ok::<_, FleetError>(None);
            };
            let page = self.plane.list_groups(ctx, token.as_deref()).await?;
            debug!(
                run = %ctx.run_id,
                groups = page.groups.len(),
                more = page.next_token.is_some(),
                "group page"
            );
            Ok(Some((page.groups, page.next_token.map(Some))))
        })
        .map_ok(|groups| stream::iter(groups.into_iter().map(Ok::<_, FleetError>)))
        .try_flatten()
        .try_filter(move |group| std::future::ready(matches_identity(group, identity)))
        .boxed()
    }

    /// Names of every group matching `identity`.
    pub async fn group_names(
        &self,
        ctx: &RunContext,
        identity: &Edc,
    ) -> FleetResult<BTreeSet<GroupName>> {
        self.find_groups(ctx, identity)
            .map_ok(|group| group.name)
            .try_collect()
            .await
    }
}

fn matches_identity(group: &Group, identity: &Edc) -> bool {
    match group.identity() {
        Ok(edc) => edc == *identity,
        Err(err) => {
            debug!(group = %group.name, error = %err, "skipping untagged group");
            false
        }
    }
}

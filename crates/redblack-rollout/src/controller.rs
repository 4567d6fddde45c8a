//! Deployment controller: drives the red/black state machine.
//!
//! ```text
//! ResolveIdentity → FindOldGroups → CreateNewGroups → WaitNewInstancesHealthy
//!   → ActivateAndCollectElbs → WaitElbHealthy ─┬─ ok ──────→ DeactivateOld → Done
//!                                               └─ timeout ─→ Rollback → Done (error)
//! ```
//!
//! Only the load balancer timeout has a compensating action. Every other
//! failure stops the run and leaves already-created resources as they are:
//! new groups that never received traffic stay inactive, old groups keep
//! serving.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use redblack_core::{GroupName, RunContext, Task, TaskStatus, TimeoutConfig};
use redblack_fleet::{
    AutoscalingPlane, ClusterDirectory, FleetControl, FleetError, ImageCatalog,
    LoadBalancerService, TopologyIndex,
};
use redblack_health::{Poller, DEFAULT_INTERVAL};
use tracing::{debug, error, info, warn};

use crate::error::DeployError;
use crate::finder::GroupFinder;
use crate::identity::IdentityResolver;
use crate::plan::{DeployReport, DeploymentPlan};

/// Phase of a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeployPhase {
    ResolveIdentity,
    FindOldGroups,
    CreateNewGroups,
    WaitNewInstancesHealthy,
    ActivateAndCollectElbs,
    WaitElbHealthy,
    DeactivateOld,
    Rollback,
    Done,
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResolveIdentity => "resolve identity",
            Self::FindOldGroups => "find old groups",
            Self::CreateNewGroups => "create new groups",
            Self::WaitNewInstancesHealthy => "wait for new instances",
            Self::ActivateAndCollectElbs => "activate new groups",
            Self::WaitElbHealthy => "wait for load balancers",
            Self::DeactivateOld => "deactivate old groups",
            Self::Rollback => "rollback",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Health gate deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploySettings {
    pub instance_health_timeout: Duration,
    pub elb_health_timeout: Duration,
    pub task_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            instance_health_timeout: Duration::from_secs(300),
            elb_health_timeout: Duration::from_secs(600),
            task_timeout: Duration::from_secs(300),
            poll_interval: DEFAULT_INTERVAL,
        }
    }
}

impl From<&TimeoutConfig> for DeploySettings {
    fn from(timeouts: &TimeoutConfig) -> Self {
        Self {
            instance_health_timeout: timeouts.instance_health(),
            elb_health_timeout: timeouts.elb_health(),
            task_timeout: timeouts.task(),
            poll_interval: timeouts.poll_interval(),
        }
    }
}

/// The external systems a deployment talks to.
#[derive(Clone)]
pub struct Backends {
    pub images: Arc<dyn ImageCatalog>,
    pub groups: Arc<dyn AutoscalingPlane>,
    pub load_balancers: Arc<dyn LoadBalancerService>,
    pub fleet: Arc<dyn FleetControl>,
    pub clusters: Arc<dyn ClusterDirectory>,
}

impl Backends {
    /// Use one backend for every seam.
    pub fn shared<B>(backend: Arc<B>) -> Self
    where
        B: ImageCatalog
            + AutoscalingPlane
            + LoadBalancerService
            + FleetControl
            + ClusterDirectory
            + 'static,
    {
        Self {
            images: backend.clone(),
            groups: backend.clone(),
            load_balancers: backend.clone(),
            fleet: backend.clone(),
            clusters: backend,
        }
    }
}

/// Runs red/black deployments.
///
/// Holds no per-run state: one `Deployer` can drive several runs at
/// once, each with its own [`RunContext`].
#[derive(Clone)]
pub struct Deployer {
    resolver: IdentityResolver,
    finder: GroupFinder,
    topology: TopologyIndex,
    groups: Arc<dyn AutoscalingPlane>,
    load_balancers: Arc<dyn LoadBalancerService>,
    fleet: Arc<dyn FleetControl>,
    settings: DeploySettings,
}

impl Deployer {
    pub fn new(backends: Backends, settings: DeploySettings) -> Self {
        Self {
            resolver: IdentityResolver::new(backends.images),
            finder: GroupFinder::new(backends.groups.clone()),
            topology: TopologyIndex::new(backends.clusters),
            groups: backends.groups,
            load_balancers: backends.load_balancers,
            fleet: backends.fleet,
            settings,
        }
    }

    pub fn settings(&self) -> &DeploySettings {
        &self.settings
    }

    /// Deploy `ctx.image_id` to every cluster of its identity.
    ///
    /// Dropping the returned future stops the run at its next await
    /// point; requests already sent to the fleet are not revoked.
    pub async fn run_deployment(&self, ctx: &RunContext) -> Result<DeployReport, DeployError> {
        info!(run = %ctx.run_id, image = %ctx.image_id, requester = ?ctx.requester, "starting red/black deployment");

        let (ctx, mut plan) = self.discover(ctx).await?;
        let ctx = &ctx;

        self.create_new_groups(ctx, &mut plan).await?;
        self.wait_new_instances(ctx, &plan).await?;
        let load_balancers = self.activate_new_groups(ctx, &plan).await?;

        match self.wait_load_balancers(ctx, &load_balancers).await {
            Ok(()) => {}
            Err(DeployError::Timeout { remaining, .. }) => {
                return Err(self.rollback(ctx, &plan, remaining).await);
            }
            Err(err) => return Err(err),
        }

        self.deactivate_old_groups(ctx, &plan).await?;

        info!(
            run = %ctx.run_id,
            identity = %plan.identity,
            new_groups = ?plan.new_groups,
            phase = %DeployPhase::Done,
            "deployment complete"
        );
        Ok(DeployReport {
            plan,
            load_balancers,
        })
    }

    /// Resolve the image's identity and the groups currently serving it,
    /// without changing anything.
    pub async fn plan(&self, ctx: &RunContext) -> Result<DeploymentPlan, DeployError> {
        self.discover(ctx).await.map(|(_, plan)| plan)
    }

    /// ResolveIdentity and FindOldGroups. Returns the context scoped to
    /// the identity's profile.
    async fn discover(&self, ctx: &RunContext) -> Result<(RunContext, DeploymentPlan), DeployError> {
        let identity = self.resolver.resolve(ctx, &ctx.image_id).await?;
        info!(run = %ctx.run_id, %identity, phase = %DeployPhase::ResolveIdentity, "resolved identity");

        let ctx = match ctx.profile {
            Some(_) => ctx.clone(),
            None => ctx.with_profile(&identity.deployment),
        };

        let candidates = self
            .finder
            .group_names(&ctx, &identity)
            .await
            .map_err(DeployError::control_plane(DeployPhase::FindOldGroups))?;
        let old_groups = self
            .topology
            .clusters_for_groups(&ctx, &candidates)
            .await
            .map_err(DeployError::control_plane(DeployPhase::FindOldGroups))?;

        if old_groups.is_empty() {
            return Err(DeployError::NoGroups { identity });
        }
        info!(
            run = %ctx.run_id,
            old_groups = ?old_groups,
            phase = %DeployPhase::FindOldGroups,
            "found clusters to replace"
        );

        Ok((ctx, DeploymentPlan::new(identity, old_groups)))
    }

    /// One new group per cluster, created one cluster at a time.
    ///
    /// Groups created before a later failure are left inactive.
    async fn create_new_groups(
        &self,
        ctx: &RunContext,
        plan: &mut DeploymentPlan,
    ) -> Result<(), DeployError> {
        let phase = DeployPhase::CreateNewGroups;
        let clusters: Vec<_> = plan.clusters().cloned().collect();

        for cluster in clusters {
            let task = self
                .fleet
                .create_next_group(ctx, &cluster, &ctx.image_id)
                .await
                .map_err(DeployError::control_plane(phase))?;
            self.await_task(ctx, phase, task).await?;

            // Another deployment creating a group in this cluster at the
            // same time can make its group look like ours.
            let newest = self
                .fleet
                .groups_for_cluster(ctx, &cluster)
                .await
                .map_err(DeployError::control_plane(phase))?
                .pop()
                .ok_or_else(|| DeployError::ControlPlane {
                    phase,
                    source: FleetError::EmptyCluster(cluster.clone()),
                })?;

            if plan.is_old(&cluster, &newest) {
                return Err(DeployError::NewGroupMissing { cluster, newest });
            }

            info!(run = %ctx.run_id, %cluster, group = %newest, "created new group");
            plan.new_groups.insert(cluster, newest);
        }
        Ok(())
    }

    /// Gate on every instance of every new group being ready.
    ///
    /// The new groups have no traffic yet, so a timeout needs no rollback.
    async fn wait_new_instances(
        &self,
        ctx: &RunContext,
        plan: &DeploymentPlan,
    ) -> Result<(), DeployError> {
        let poller = Poller::new(self.settings.instance_health_timeout, self.settings.poll_interval);
        let groups = &self.groups;

        poller
            .await_all(
                "instance health",
                plan.all_new_groups().cloned(),
                |name: &GroupName| {
                    let name = name.clone();
                    async move {
                        let group = groups.describe_group(ctx, &name).await?;
                        if !group.all_instances_ready() {
                            debug!(
                                run = %ctx.run_id,
                                group = %name,
                                instances = group.instances.len(),
                                pending = group.pending_instances().count(),
                                "instances not ready"
                            );
                        }
                        Ok::<_, FleetError>(group.all_instances_ready())
                    }
                },
            )
            .await
            .map_err(|err| DeployError::from_poll(DeployPhase::WaitNewInstancesHealthy, err))
    }

    /// Activate each new group and collect the load balancers in front of them.
    async fn activate_new_groups(
        &self,
        ctx: &RunContext,
        plan: &DeploymentPlan,
    ) -> Result<BTreeSet<String>, DeployError> {
        let phase = DeployPhase::ActivateAndCollectElbs;
        let mut load_balancers = BTreeSet::new();

        for (cluster, group) in &plan.new_groups {
            let task = self
                .fleet
                .activate(ctx, group)
                .await
                .map_err(DeployError::control_plane(phase))?;
            self.await_task(ctx, phase, task).await?;
            info!(run = %ctx.run_id, %cluster, %group, "activated new group");

            let attached = self
                .fleet
                .load_balancers_for(ctx, group)
                .await
                .map_err(DeployError::control_plane(phase))?;
            debug!(run = %ctx.run_id, %group, load_balancers = ?attached, "collected load balancers");
            load_balancers.extend(attached);
        }
        Ok(load_balancers)
    }

    async fn wait_load_balancers(
        &self,
        ctx: &RunContext,
        load_balancers: &BTreeSet<String>,
    ) -> Result<(), DeployError> {
        let poller = Poller::new(self.settings.elb_health_timeout, self.settings.poll_interval);
        let service = &self.load_balancers;

        poller
            .await_all(
                "load balancer health",
                load_balancers.iter().cloned(),
                |name: &String| {
                    let name = name.clone();
                    async move {
                        let lb = service.describe_load_balancer(ctx, &name).await?;
                        Ok::<_, FleetError>(lb.is_ready())
                    }
                },
            )
            .await
            .map_err(|err| DeployError::from_poll(DeployPhase::WaitElbHealthy, err))
    }

    async fn deactivate_old_groups(
        &self,
        ctx: &RunContext,
        plan: &DeploymentPlan,
    ) -> Result<(), DeployError> {
        let phase = DeployPhase::DeactivateOld;
        for group in plan.all_old_groups() {
            let task = self
                .fleet
                .deactivate(ctx, group)
                .await
                .map_err(DeployError::control_plane(phase))?;
            self.await_task(ctx, phase, task).await?;
            info!(run = %ctx.run_id, %group, "deactivated old group");
        }
        Ok(())
    }

    /// Deactivate every new group after a load balancer timeout. Old
    /// groups are never touched here.
    ///
    /// Keeps going past individual failures so as many new groups as
    /// possible stop taking traffic.
    async fn rollback(
        &self,
        ctx: &RunContext,
        plan: &DeploymentPlan,
        remaining: Vec<String>,
    ) -> DeployError {
        let phase = DeployPhase::Rollback;
        warn!(
            run = %ctx.run_id,
            unhealthy = ?remaining,
            new_groups = ?plan.new_groups,
            "load balancers never became healthy, rolling back"
        );

        let mut rolled_back = Vec::new();
        let mut rollback_errors = Vec::new();
        for group in plan.all_new_groups() {
            let result = match self.fleet.deactivate(ctx, group).await {
                Ok(task) => self.await_task(ctx, phase, task).await,
                Err(source) => Err(DeployError::ControlPlane { phase, source }),
            };
            match result {
                Ok(()) => {
                    info!(run = %ctx.run_id, %group, "rolled back new group");
                    rolled_back.push(group.clone());
                }
                Err(err) => {
                    error!(run = %ctx.run_id, %group, error = %err, "failed to roll back new group");
                    rollback_errors.push((group.clone(), err));
                }
            }
        }

        DeployError::RolledBack {
            remaining,
            rolled_back,
            rollback_errors,
        }
    }

    /// Wait for a fleet task to complete. A failed task ends the wait at once.
    async fn await_task(
        &self,
        ctx: &RunContext,
        phase: DeployPhase,
        task: Task,
    ) -> Result<(), DeployError> {
        let poller = Poller::new(self.settings.task_timeout, self.settings.poll_interval);
        let fleet = &self.fleet;

        poller
            .await_all("task", [task], |task: &Task| {
                let task = task.clone();
                async move {
                    match fleet.task_status(ctx, &task).await? {
                        TaskStatus::Completed => Ok(true),
                        TaskStatus::Failed => Err(FleetError::TaskFailed { url: task.url }),
                        TaskStatus::Pending | TaskStatus::InProgress => Ok(false),
                    }
                }
            })
            .await
            .map_err(|err| DeployError::from_poll(phase, err))
    }
}

//! In-memory fleet for rollout tests.
//!
//! Implements every backend seam over one shared state. Mutations are
//! recorded as [`Event`]s so tests can assert on ordering. Readiness is
//! driven by the tokio clock, so tests run with `start_paused = true`.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use redblack_core::{
    ClusterName, EndpointState, Group, GroupName, HealthStatus, Instance, LifecycleState,
    LoadBalancer, RunContext, Tags, Task, TaskStatus,
};
use redblack_fleet::{
    AutoscalingPlane, ClusterDirectory, ClusterMembers, FleetControl, FleetError, FleetResult,
    GroupPage, ImageCatalog, LoadBalancerService,
};
use redblack_rollout::{Backends, DeploySettings, Deployer};
use tokio::time::Instant;

pub const PAGE_SIZE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Created(GroupName),
    Activated(GroupName),
    Deactivated(GroupName),
}

/// A control plane call, as seen by the fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub run_id: String,
    pub profile: Option<String>,
    pub op: &'static str,
}

struct FakeGroup {
    tags: Tags,
    active: bool,
    load_balancers: Vec<String>,
    /// `None` means the instances never become ready.
    ready_at: Option<Instant>,
}

enum Pending {
    Activate(GroupName),
    Deactivate(GroupName),
    Nothing,
}

struct FakeTask {
    polls: u32,
    outcome: TaskStatus,
    effect: Pending,
}

#[derive(Default)]
struct State {
    images: HashMap<String, Tags>,
    groups: BTreeMap<GroupName, FakeGroup>,
    clusters: BTreeMap<ClusterName, Vec<GroupName>>,
    elb_ready_at: HashMap<String, Instant>,
    tasks: HashMap<String, FakeTask>,
    next_task: u64,
    events: Vec<Event>,
    calls: Vec<Call>,

    instance_delay: HashMap<ClusterName, Option<Duration>>,
    elb_delay: HashMap<String, Option<Duration>>,
    unregistered_elbs: HashSet<String>,
    reject_create: HashSet<ClusterName>,
    silent_create: HashSet<ClusterName>,
    failing_activation: HashSet<ClusterName>,
    reject_deactivate: HashSet<GroupName>,
}

#[derive(Clone, Default)]
pub struct FakeFleet {
    state: Arc<Mutex<State>>,
}

pub fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn identity_tags(environment: &str, deployment: &str, cluster: &str) -> Tags {
    tags(&[
        ("environment", environment),
        ("deployment", deployment),
        ("cluster", cluster),
    ])
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // ── Setup ─────────────────────────────────────────────────────

    pub fn image(self, image_id: &str, image_tags: Tags) -> Self {
        self.state().images.insert(image_id.to_string(), image_tags);
        self
    }

    /// Add an active, healthy group to `cluster`, named `<cluster>-vNNN`.
    pub fn serving_group(self, cluster: &str, group_tags: Tags, load_balancers: &[&str]) -> Self {
        {
            let mut state = self.state();
            let members = state.clusters.entry(cluster.to_string()).or_default();
            let name = format!("{cluster}-v{:03}", members.len() + 1);
            members.push(name.clone());
            state.groups.insert(
                name,
                FakeGroup {
                    tags: group_tags,
                    active: true,
                    load_balancers: load_balancers.iter().map(|s| s.to_string()).collect(),
                    ready_at: Some(Instant::now()),
                },
            );
            for lb in load_balancers {
                state.elb_ready_at.insert(lb.to_string(), Instant::now());
            }
        }
        self
    }

    /// New instances in `cluster` become ready after `delay`, or never.
    pub fn instances_ready_after(self, cluster: &str, delay: Option<Duration>) -> Self {
        self.state().instance_delay.insert(cluster.to_string(), delay);
        self
    }

    /// `lb` turns healthy `delay` after a new group is activated behind it, or never.
    pub fn elb_ready_after(self, lb: &str, delay: Option<Duration>) -> Self {
        self.state().elb_delay.insert(lb.to_string(), delay);
        self
    }

    /// `lb` reports no registered instances at all.
    pub fn unregistered_elb(self, lb: &str) -> Self {
        self.state().unregistered_elbs.insert(lb.to_string());
        self
    }

    /// Creating a group in `cluster` fails outright.
    pub fn reject_create(self, cluster: &str) -> Self {
        self.state().reject_create.insert(cluster.to_string());
        self
    }

    /// Creating a group in `cluster` completes without adding a group.
    pub fn silent_create(self, cluster: &str) -> Self {
        self.state().silent_create.insert(cluster.to_string());
        self
    }

    /// Activation tasks for new groups of `cluster` end up failed.
    pub fn failing_activation(self, cluster: &str) -> Self {
        self.state().failing_activation.insert(cluster.to_string());
        self
    }

    pub fn reject_deactivate(self, group: &str) -> Self {
        self.state().reject_deactivate.insert(group.to_string());
        self
    }

    // ── Inspection ────────────────────────────────────────────────

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn active_groups(&self) -> BTreeSet<GroupName> {
        self.state()
            .groups
            .iter()
            .filter(|(_, g)| g.active)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn members(&self, cluster: &str) -> Vec<GroupName> {
        self.state().clusters.get(cluster).cloned().unwrap_or_default()
    }

    pub fn deployer(&self) -> Deployer {
        Deployer::new(Backends::shared(Arc::new(self.clone())), test_settings())
    }
}

pub fn test_settings() -> DeploySettings {
    DeploySettings {
        instance_health_timeout: Duration::from_secs(60),
        elb_health_timeout: Duration::from_secs(120),
        task_timeout: Duration::from_secs(30),
        poll_interval: Duration::from_secs(1),
    }
}

impl State {
    fn record(&mut self, ctx: &RunContext, op: &'static str) {
        self.calls.push(Call {
            run_id: ctx.run_id.clone(),
            profile: ctx.profile.clone(),
            op,
        });
    }

    fn task(&mut self, outcome: TaskStatus, effect: Pending) -> Task {
        self.next_task += 1;
        let url = format!("http://fleet/task/{}", self.next_task);
        self.tasks.insert(
            url.clone(),
            FakeTask {
                polls: 0,
                outcome,
                effect,
            },
        );
        Task::new(url)
    }

    fn cluster_of(&self, group: &str) -> Option<&ClusterName> {
        self.clusters
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == group))
            .map(|(cluster, _)| cluster)
    }

    fn apply(&mut self, effect: Pending) {
        match effect {
            Pending::Activate(name) => {
                let Some(group) = self.groups.get_mut(&name) else {
                    return;
                };
                group.active = true;
                let lbs = group.load_balancers.clone();
                for lb in lbs {
                    match self.elb_delay.get(&lb).copied().unwrap_or(Some(Duration::ZERO)) {
                        Some(delay) => {
                            self.elb_ready_at.insert(lb, Instant::now() + delay);
                        }
                        None => {
                            self.elb_ready_at.remove(&lb);
                        }
                    }
                }
                self.events.push(Event::Activated(name));
            }
            Pending::Deactivate(name) => {
                if let Some(group) = self.groups.get_mut(&name) {
                    group.active = false;
                }
                self.events.push(Event::Deactivated(name));
            }
            Pending::Nothing => {}
        }
    }

    fn describe(&self, name: &str) -> Option<Group> {
        let group = self.groups.get(name)?;
        let ready = group.ready_at.is_some_and(|at| Instant::now() >= at);
        let instance = |n: usize| Instance {
            instance_id: format!("i-{name}-{n}"),
            health_status: if ready {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            lifecycle_state: if ready {
                LifecycleState::InService
            } else {
                LifecycleState::Pending
            },
        };
        Some(Group {
            name: name.to_string(),
            tags: group.tags.clone(),
            instances: vec![instance(1), instance(2)],
        })
    }
}

fn server_error(url: &str) -> FleetError {
    FleetError::Status {
        url: url.to_string(),
        status: 500,
    }
}

#[async_trait]
impl ImageCatalog for FakeFleet {
    async fn image_tags(&self, ctx: &RunContext, image_id: &str) -> FleetResult<Tags> {
        let mut state = self.state();
        state.record(ctx, "image_tags");
        state
            .images
            .get(image_id)
            .cloned()
            .ok_or_else(|| FleetError::ImageNotFound(image_id.to_string()))
    }
}

#[async_trait]
impl AutoscalingPlane for FakeFleet {
    async fn list_groups(
        &self,
        ctx: &RunContext,
        next_token: Option<&str>,
    ) -> FleetResult<GroupPage> {
        let mut state = self.state();
        state.record(ctx, "list_groups");
        let start: usize = match next_token {
            Some(token) => token.parse().map_err(|_| FleetError::Decode {
                url: "autoScaling/list".to_string(),
                message: format!("bad token {token}"),
            })?,
            None => 0,
        };
        let names: Vec<_> = state.groups.keys().cloned().collect();
        let end = (start + PAGE_SIZE).min(names.len());
        let groups = names[start.min(end)..end]
            .iter()
            .filter_map(|name| state.describe(name))
            .collect();
        Ok(GroupPage {
            groups,
            next_token: (end < names.len()).then(|| end.to_string()),
        })
    }

    async fn describe_group(&self, ctx: &RunContext, name: &str) -> FleetResult<Group> {
        let mut state = self.state();
        state.record(ctx, "describe_group");
        state
            .describe(name)
            .ok_or_else(|| FleetError::GroupNotFound(name.to_string()))
    }
}

#[async_trait]
impl LoadBalancerService for FakeFleet {
    async fn describe_load_balancer(
        &self,
        ctx: &RunContext,
        name: &str,
    ) -> FleetResult<LoadBalancer> {
        let mut state = self.state();
        state.record(ctx, "describe_load_balancer");
        if state.unregistered_elbs.contains(name) {
            return Ok(LoadBalancer {
                name: name.to_string(),
                instance_states: vec![],
            });
        }
        let healthy = state
            .elb_ready_at
            .get(name)
            .is_some_and(|at| Instant::now() >= *at);
        let second = if healthy {
            EndpointState::InService
        } else {
            EndpointState::OutOfService
        };
        Ok(LoadBalancer {
            name: name.to_string(),
            instance_states: vec![EndpointState::InService, second],
        })
    }
}

#[async_trait]
impl FleetControl for FakeFleet {
    async fn create_next_group(
        &self,
        ctx: &RunContext,
        cluster: &str,
        _image_id: &str,
    ) -> FleetResult<Task> {
        let mut state = self.state();
        state.record(ctx, "create_next_group");
        if state.reject_create.contains(cluster) {
            return Err(server_error("cluster/createNextGroup"));
        }
        if state.silent_create.contains(cluster) {
            return Ok(state.task(TaskStatus::Completed, Pending::Nothing));
        }

        let members = state.clusters.get(cluster).cloned().unwrap_or_default();
        let template = members.last().and_then(|newest| state.groups.get(newest));
        let (group_tags, load_balancers) = template
            .map(|g| (g.tags.clone(), g.load_balancers.clone()))
            .unwrap_or_default();
        let ready_at = state
            .instance_delay
            .get(cluster)
            .copied()
            .unwrap_or(Some(Duration::ZERO))
            .map(|delay| Instant::now() + delay);

        let name = format!("{cluster}-v{:03}", members.len() + 1);
        state.groups.insert(
            name.clone(),
            FakeGroup {
                tags: group_tags,
                active: false,
                load_balancers,
                ready_at,
            },
        );
        state
            .clusters
            .entry(cluster.to_string())
            .or_default()
            .push(name.clone());
        state.events.push(Event::Created(name));
        Ok(state.task(TaskStatus::Completed, Pending::Nothing))
    }

    async fn activate(&self, ctx: &RunContext, group: &str) -> FleetResult<Task> {
        let mut state = self.state();
        state.record(ctx, "activate");
        let fails = state
            .cluster_of(group)
            .is_some_and(|cluster| state.failing_activation.contains(cluster));
        if fails {
            return Ok(state.task(TaskStatus::Failed, Pending::Nothing));
        }
        Ok(state.task(TaskStatus::Completed, Pending::Activate(group.to_string())))
    }

    async fn deactivate(&self, ctx: &RunContext, group: &str) -> FleetResult<Task> {
        let mut state = self.state();
        state.record(ctx, "deactivate");
        if state.reject_deactivate.contains(group) {
            return Err(server_error("cluster/deactivate"));
        }
        Ok(state.task(TaskStatus::Completed, Pending::Deactivate(group.to_string())))
    }

    /// Tasks report in progress on the first poll and finish on the second.
    async fn task_status(&self, ctx: &RunContext, task: &Task) -> FleetResult<TaskStatus> {
        let mut state = self.state();
        state.record(ctx, "task_status");
        let Some(entry) = state.tasks.get_mut(&task.url) else {
            return Err(FleetError::MissingTask {
                url: task.url.clone(),
            });
        };
        entry.polls += 1;
        if entry.polls < 2 {
            return Ok(TaskStatus::InProgress);
        }
        let outcome = entry.outcome;
        let effect = std::mem::replace(&mut entry.effect, Pending::Nothing);
        state.apply(effect);
        Ok(outcome)
    }

    async fn groups_for_cluster(
        &self,
        ctx: &RunContext,
        cluster: &str,
    ) -> FleetResult<Vec<GroupName>> {
        let mut state = self.state();
        state.record(ctx, "groups_for_cluster");
        Ok(state.clusters.get(cluster).cloned().unwrap_or_default())
    }

    async fn load_balancers_for(
        &self,
        ctx: &RunContext,
        group: &str,
    ) -> FleetResult<BTreeSet<String>> {
        let mut state = self.state();
        state.record(ctx, "load_balancers_for");
        state
            .groups
            .get(group)
            .map(|g| g.load_balancers.iter().cloned().collect())
            .ok_or_else(|| FleetError::GroupNotFound(group.to_string()))
    }
}

#[async_trait]
impl ClusterDirectory for FakeFleet {
    async fn list_clusters(&self, ctx: &RunContext) -> FleetResult<Vec<ClusterMembers>> {
        let mut state = self.state();
        state.record(ctx, "list_clusters");
        Ok(state
            .clusters
            .iter()
            .map(|(cluster, groups)| ClusterMembers {
                cluster: cluster.clone(),
                groups: groups.clone(),
            })
            .collect())
    }
}

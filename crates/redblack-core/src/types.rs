//! Domain types for red/black deployments.
//!
//! These mirror the shape of resources owned by the autoscaling plane,
//! load balancers, and the fleet control service. They are plain values:
//! the orchestrator reads them, it never mutates them in-process.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Name of an autoscaling group.
pub type GroupName = String;

/// Name of a logical cluster in the fleet control service.
pub type ClusterName = String;

/// Resource tags (image or group).
pub type Tags = BTreeMap<String, String>;

// ── Identity ──────────────────────────────────────────────────────

/// The (environment, deployment, cluster) triple that groups the
/// autoscaling groups serving one logical workload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edc {
    pub environment: String,
    pub deployment: String,
    pub cluster: String,
}

impl Edc {
    pub fn new(environment: &str, deployment: &str, cluster: &str) -> Self {
        Self {
            environment: environment.to_string(),
            deployment: deployment.to_string(),
            cluster: cluster.to_string(),
        }
    }

    /// Build an identity from resource tags.
    ///
    /// `environment` and `deployment` are required. The cluster comes from
    /// the `cluster` tag, falling back to `play` when `cluster` is absent.
    pub fn from_tags(tags: &Tags) -> Result<Self, IdentityError> {
        let environment = tags
            .get("environment")
            .ok_or(IdentityError::MissingTag("environment"))?;
        let deployment = tags
            .get("deployment")
            .ok_or(IdentityError::MissingTag("deployment"))?;
        let cluster = tags
            .get("cluster")
            .or_else(|| tags.get("play"))
            .ok_or(IdentityError::MissingCluster)?;

        Ok(Self::new(environment, deployment, cluster))
    }
}

impl fmt::Display for Edc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.environment, self.deployment, self.cluster)
    }
}

// ── Instance ──────────────────────────────────────────────────────

/// Health reported by the autoscaling plane for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

impl HealthStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "Healthy" => Self::Healthy,
            "Unhealthy" => Self::Unhealthy,
            _ => Self::Unknown,
        }
    }
}

/// Lifecycle state of an instance inside its autoscaling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Pending,
    InService,
    Terminating,
    Terminated,
    Standby,
    Other,
}

impl LifecycleState {
    /// Parse a lifecycle state; hook sub-states like `Pending:Wait` fold
    /// into their parent state.
    pub fn parse(s: &str) -> Self {
        match s.split(':').next().unwrap_or_default() {
            "Pending" => Self::Pending,
            "InService" => Self::InService,
            "Terminating" => Self::Terminating,
            "Terminated" => Self::Terminated,
            "Standby" => Self::Standby,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub instance_id: String,
    pub health_status: HealthStatus,
    pub lifecycle_state: LifecycleState,
}

impl Instance {
    /// An instance is ready when it is healthy *or* in service.
    ///
    /// Only an instance failing both checks holds up a deployment.
    pub fn is_ready(&self) -> bool {
        self.health_status == HealthStatus::Healthy
            || self.lifecycle_state == LifecycleState::InService
    }
}

// ── Group ─────────────────────────────────────────────────────────

/// An autoscaling group as seen by the autoscaling plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: GroupName,
    pub tags: Tags,
    pub instances: Vec<Instance>,
}

impl Group {
    /// Identity derived from this group's tags.
    pub fn identity(&self) -> Result<Edc, IdentityError> {
        Edc::from_tags(&self.tags)
    }

    /// True when every instance in the group is ready.
    ///
    /// A group with no instances is vacuously ready.
    pub fn all_instances_ready(&self) -> bool {
        self.instances.iter().all(Instance::is_ready)
    }

    /// Instances still holding the group back.
    pub fn pending_instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter().filter(|i| !i.is_ready())
    }
}

// ── Load balancer ─────────────────────────────────────────────────

/// Registration state of an instance behind a load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    InService,
    OutOfService,
    Unknown,
}

impl EndpointState {
    pub fn parse(s: &str) -> Self {
        match s {
            "InService" => Self::InService,
            "OutOfService" => Self::OutOfService,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancer {
    pub name: String,
    pub instance_states: Vec<EndpointState>,
}

impl LoadBalancer {
    /// Ready when every registered instance is in service. A load balancer
    /// with nothing registered is ready.
    pub fn is_ready(&self) -> bool {
        self.instance_states
            .iter()
            .all(|s| *s == EndpointState::InService)
    }
}

// ── Task ──────────────────────────────────────────────────────────

/// Handle for an asynchronous fleet control operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Task {
    pub url: String,
}

impl Task {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "completed" => Self::Completed,
            "failed" | "error" => Self::Failed,
            "running" | "in_progress" | "inprogress" => Self::InProgress,
            _ => Self::Pending,
        }
    }
}

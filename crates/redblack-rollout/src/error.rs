//! Deployment errors.

use std::fmt;

use redblack_core::{ClusterName, Edc, GroupName, IdentityError};
use redblack_fleet::FleetError;
use redblack_health::PollError;
use thiserror::Error;

use crate::controller::DeployPhase;

/// Why a deployment run did not complete.
///
/// Every variant can name the phase it came from; only
/// [`DeployError::RolledBack`] means a compensating action ran.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The image's tags do not name a complete identity. Nothing was mutated.
    #[error("cannot resolve identity of {image_id}: {source}")]
    Identity {
        image_id: String,
        #[source]
        source: IdentityError,
    },

    #[error("no groups match {identity}")]
    NoGroups { identity: Edc },

    /// The newest group of a cluster after creation was one of the old groups.
    #[error("no new group appeared in cluster {cluster} (newest is {newest})")]
    NewGroupMissing {
        cluster: ClusterName,
        newest: GroupName,
    },

    #[error("{phase}: {source}")]
    ControlPlane {
        phase: DeployPhase,
        #[source]
        source: FleetError,
    },

    /// A health gate elapsed. Carries exactly the items never seen ready.
    #[error("{phase}: timed out waiting for {remaining:?}")]
    Timeout {
        phase: DeployPhase,
        remaining: Vec<String>,
    },

    /// Load balancers never turned healthy; the new groups were deactivated.
    #[error(
        "load balancers {remaining:?} never became healthy; rolled back {rolled_back:?}{}",
        RollbackFailures(.rollback_errors)
    )]
    RolledBack {
        remaining: Vec<String>,
        rolled_back: Vec<GroupName>,
        rollback_errors: Vec<(GroupName, DeployError)>,
    },
}

struct RollbackFailures<'a>(&'a [(GroupName, DeployError)]);

impl fmt::Display for RollbackFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (group, err) in self.0 {
            write!(f, "; failed to deactivate {group}: {err}")?;
        }
        Ok(())
    }
}

impl DeployError {
    pub fn control_plane(phase: DeployPhase) -> impl FnOnce(FleetError) -> Self {
        move |source| Self::ControlPlane { phase, source }
    }

    /// Map a health-gate failure into the phase that was waiting.
    pub fn from_poll<T: fmt::Debug + fmt::Display>(
        phase: DeployPhase,
        err: PollError<T, FleetError>,
    ) -> Self {
        match err {
            PollError::TimedOut { remaining } => Self::Timeout {
                phase,
                remaining: remaining.iter().map(ToString::to_string).collect(),
            },
            PollError::Check(source) => Self::ControlPlane { phase, source },
        }
    }

    pub fn phase(&self) -> DeployPhase {
        match self {
            Self::Identity { .. } => DeployPhase::ResolveIdentity,
            Self::NoGroups { .. } => DeployPhase::FindOldGroups,
            Self::NewGroupMissing { .. } => DeployPhase::CreateNewGroups,
            Self::ControlPlane { phase, .. } | Self::Timeout { phase, .. } => *phase,
            Self::RolledBack { .. } => DeployPhase::Rollback,
        }
    }

    /// True when a health gate's deadline elapsed, rolled back or not.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::RolledBack { .. })
    }
}

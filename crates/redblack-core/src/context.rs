//! Per-invocation deployment context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static NEXT_RUN: AtomicU64 = AtomicU64::new(1);

/// Context for one deployment run.
///
/// Passed by reference into every call that needs the caller or the
/// account profile, so concurrent runs never share mutable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Identifier used to correlate log lines of one run.
    pub run_id: String,
    /// Image being deployed.
    pub image_id: String,
    /// Who asked for the deployment, if known.
    pub requester: Option<String>,
    /// Account profile for autoscaling and load balancer queries.
    pub profile: Option<String>,
}

impl RunContext {
    pub fn new(image_id: &str) -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let seq = NEXT_RUN.fetch_add(1, Ordering::Relaxed);
        Self {
            run_id: format!("{secs:x}-{seq}"),
            image_id: image_id.to_string(),
            requester: None,
            profile: None,
        }
    }

    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    /// Copy of this context scoped to an account profile.
    pub fn with_profile(&self, profile: &str) -> Self {
        Self {
            profile: Some(profile.to_string()),
            ..self.clone()
        }
    }
}

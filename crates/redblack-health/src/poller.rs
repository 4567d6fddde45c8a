//! Deadline-bounded polling of a set of items.
//!
//! Items are re-checked every interval until each has reported ready once
//! or the deadline passes. An item that has reported ready is never
//! checked again.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

/// Default gap between polling rounds.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Why a wait ended without every item becoming ready.
#[derive(Debug, Error)]
pub enum PollError<T: fmt::Debug, E: std::error::Error + 'static> {
    /// The deadline elapsed. Holds exactly the items never seen ready.
    #[error("timed out waiting for {remaining:?}")]
    TimedOut { remaining: Vec<T> },

    /// A readiness check itself failed.
    #[error("readiness check failed: {0}")]
    Check(#[source] E),
}

/// Polls items until all are ready or a deadline elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    timeout: Duration,
    interval: Duration,
}

impl Poller {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Poller with the default one-second interval.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_INTERVAL)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until `is_ready` has returned `true` for every item.
    ///
    /// An item counts only if its check completed with `true` strictly
    /// before the deadline. A check still running at the deadline is
    /// abandoned and the item stays pending. An empty item set succeeds
    /// immediately. A check error aborts the wait at once.
    pub async fn await_all<T, E, F, Fut>(
        &self,
        what: &str,
        items: impl IntoIterator<Item = T>,
        mut is_ready: F,
    ) -> Result<(), PollError<T, E>>
    where
        T: fmt::Debug,
        E: std::error::Error + 'static,
        F: FnMut(&T) -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut pending: Vec<T> = items.into_iter().collect();
        let total = pending.len();

        loop {
            if pending.is_empty() {
                info!(what, total, "all ready");
                return Ok(());
            }

            if Instant::now() >= deadline {
                warn!(
                    what,
                    remaining = ?pending,
                    timeout_secs = self.timeout.as_secs(),
                    "timed out waiting for readiness"
                );
                return Err(PollError::TimedOut { remaining: pending });
            }

            let mut still_pending = Vec::with_capacity(pending.len());
            for item in pending {
                if Instant::now() >= deadline {
                    still_pending.push(item);
                    continue;
                }
                match timeout_at(deadline, is_ready(&item)).await {
                    Ok(result) => {
                        if result.map_err(PollError::Check)? && Instant::now() < deadline {
                            debug!(what, item = ?item, "ready");
                        } else {
                            still_pending.push(item);
                        }
                    }
                    Err(_) => {
                        debug!(what, item = ?item, "check outlived the deadline");
                        still_pending.push(item);
                    }
                }
            }
            pending = still_pending;

            if !pending.is_empty() {
                debug!(what, remaining = pending.len(), total, "waiting");
                sleep_until((Instant::now() + self.interval).min(deadline)).await;
            }
        }
    }
}

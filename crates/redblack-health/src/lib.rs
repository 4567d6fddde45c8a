//! redblack-health: health gates for red/black deployments.
//!
//! A deployment waits on three kinds of readiness: instances in a new
//! group, load balancers in front of activated groups, and fleet control
//! tasks. All three go through one [`Poller`], so deadline bookkeeping
//! and timeout reporting are the same everywhere.
//!
//! # Polling
//!
//! ```text
//! Poller::await_all(items, is_ready)
//!   ├── every `interval`: check each still-pending item
//!   ├── each check is cut off at the deadline
//!   ├── ready items leave the pending set for good (no re-check)
//!   └── at `timeout`: PollError::TimedOut { remaining }
//! ```

pub mod poller;

pub use poller::{DEFAULT_INTERVAL, PollError, Poller};

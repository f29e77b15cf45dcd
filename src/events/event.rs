//! # Missed-block delta events.
//!
//! A [`DeltaEvent`] is the unit of notification: one producer's missed-block counter
//! went up by `delta` since the last observation. It is built by the
//! [`DeltaEngine`](crate::DeltaEngine), immutable afterwards, and handed to every
//! consumer as a shared `Arc`.
//!
//! ## Example
//! ```rust
//! use bpwatch::DeltaEvent;
//!
//! let ev = DeltaEvent::now("producer1a", 9, 4);
//! assert_eq!(ev.line(), "producer1a 9 +4");
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One observed increase of a producer's missed-block counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeltaEvent {
    /// Producer account name.
    pub owner: String,
    /// Cumulative missed blocks in the current rotation.
    pub missed_blocks: u64,
    /// Increase since the previous observation.
    pub delta: u64,
    /// When the counter was read.
    pub observed_at: DateTime<Utc>,
}

impl DeltaEvent {
    /// Creates an event observed at `at`.
    pub fn new(owner: impl Into<String>, missed_blocks: u64, delta: u64, at: DateTime<Utc>) -> Self {
        Self {
            owner: owner.into(),
            missed_blocks,
            delta,
            observed_at: at,
        }
    }

    /// Creates an event stamped with the current time.
    #[inline]
    pub fn now(owner: impl Into<String>, missed_blocks: u64, delta: u64) -> Self {
        Self::new(owner, missed_blocks, delta, Utc::now())
    }

    /// Single-line rendering used by chat notifications.
    pub fn line(&self) -> String {
        format!("{} {} +{}", self.owner, self.missed_blocks, self.delta)
    }
}

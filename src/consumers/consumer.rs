//! # Core consumer trait and its inbox.
//!
//! `Consume` is the extension point for notification sinks. Each consumer is driven by
//! its own supervised task and reads from a private [`Inbox`] that only the
//! [`Dispatcher`](crate::consumers::Dispatcher) writes to.
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they do **not** block the scheduler
//!   nor other consumers.
//! - `consume` runs until the context token is cancelled and then returns
//!   `Err(TaskError::Canceled)`. A closed inbox (the scheduler finished and dropped the
//!   dispatcher) is a normal stop.
//! - Cancellation is checked before every dequeue; nothing is taken from the inbox
//!   after cancellation has been observed.
//!
//! ## Example (skeleton)
//! ```rust
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use bpwatch::{Consume, Inbox, TaskError};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Consume for Audit {
//!     async fn consume(&self, mut inbox: Inbox, ctx: CancellationToken) -> Result<(), TaskError> {
//!         while let Some(ev) = inbox.recv(&ctx).await {
//!             let _ = ev.line(); // write audit record...
//!         }
//!         Err(TaskError::Canceled)
//!     }
//!     fn name(&self) -> &'static str { "audit" }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::DeltaEvent;

/// Contract for notification sinks.
#[async_trait]
pub trait Consume: Send + Sync + 'static {
    /// Drains `inbox` at this consumer's own pace until `ctx` is cancelled.
    async fn consume(&self, inbox: Inbox, ctx: CancellationToken) -> Result<(), TaskError>;

    /// Human-readable name (for logs and task names).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Receiving end of one consumer's private queue.
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Arc<DeltaEvent>>,
}

impl Inbox {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Arc<DeltaEvent>>) -> Self {
        Self { rx }
    }

    /// Creates a detached inbox and the sender that feeds it.
    pub fn channel() -> (mpsc::UnboundedSender<Arc<DeltaEvent>>, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Inbox::new(rx))
    }

    /// Waits for the next event.
    ///
    /// Returns `None` when `ctx` is cancelled (checked first) or when the dispatcher is gone.
    pub async fn recv(&mut self, ctx: &CancellationToken) -> Option<Arc<DeltaEvent>> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => None,
            ev = self.rx.recv() => ev,
        }
    }

    /// Takes up to `max` events that are already queued, without waiting.
    pub fn drain(&mut self, max: usize) -> Vec<Arc<DeltaEvent>> {
        let mut out = Vec::new();
        while out.len() < max {
            match self.rx.try_recv() {
                Ok(ev) => out.push(ev),
                Err(_) => break,
            }
        }
        out
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Sleeps for `dur` unless `ctx` is cancelled first; returns `false` on cancellation.
pub(crate) async fn pause(ctx: &CancellationToken, dur: std::time::Duration) -> bool {
    tokio::select! {
        _ = ctx.cancelled() => false,
        _ = tokio::time::sleep(dur) => true,
    }
}

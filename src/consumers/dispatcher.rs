//! # Non-blocking fan-out of delta events to every consumer.
//!
//! ## Architecture
//! ```text
//! publish(event)
//!     │  Arc::new(event) once
//!     ├──► [inbox 1] ──► consumer 1 (own pace)
//!     │   (unbounded)
//!     ├──► [inbox 2] ──► consumer 2
//!     │   (unbounded)
//!     └──► [inbox N] ──► consumer N
//! ```
//!
//! ## Rules
//! - **Static registration**: one inbox per consumer, fixed at construction
//! - **Per-inbox FIFO**: each consumer sees events in publish order
//! - **No cross-consumer ordering**: consumer A may handle event N while B handles N+5
//! - **Non-blocking**: inboxes are unbounded, `publish()` never waits
//! - **Closed inbox**: its consumer has exited; the event is skipped for it (warn)

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::consumers::{Consume, Inbox};
use crate::events::DeltaEvent;

/// Per-consumer channel metadata.
struct InboxSender {
    name: &'static str,
    sender: mpsc::UnboundedSender<Arc<DeltaEvent>>,
}

/// Fan-out coordinator: the single writer of every consumer inbox.
pub struct Dispatcher {
    channels: Vec<InboxSender>,
}

impl Dispatcher {
    /// Creates one inbox per consumer.
    ///
    /// Inboxes are returned in the same order as `consumers`.
    #[must_use]
    pub fn for_consumers(consumers: &[Arc<dyn Consume>]) -> (Self, Vec<Inbox>) {
        let mut channels = Vec::with_capacity(consumers.len());
        let mut inboxes = Vec::with_capacity(consumers.len());

        for c in consumers {
            let (tx, rx) = mpsc::unbounded_channel();
            channels.push(InboxSender {
                name: c.name(),
                sender: tx,
            });
            inboxes.push(Inbox::new(rx));
        }
        (Self { channels }, inboxes)
    }

    /// Delivers `event` to every inbox.
    pub fn publish(&self, event: DeltaEvent) {
        let event = Arc::new(event);
        for channel in &self.channels {
            if channel.sender.send(Arc::clone(&event)).is_err() {
                warn!(consumer = channel.name, owner = %event.owner, "inbox closed; event dropped");
            }
        }
    }

    /// Number of registered consumers.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

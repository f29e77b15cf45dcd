//! # StreamLogger: writes every delta event to the log.
//!
//! ## Example output (tracing fmt)
//! ```text
//! INFO bpwatch::consumers::log: missed blocks increased owner="producer1a" missed_blocks=9 delta=4
//! ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::consumers::{Consume, Inbox};
use crate::error::TaskError;

/// Streaming log consumer: one line per event, as soon as it arrives.
#[derive(Default)]
pub struct StreamLogger;

impl StreamLogger {
    /// Construct a new [`StreamLogger`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Consume for StreamLogger {
    async fn consume(&self, mut inbox: Inbox, ctx: CancellationToken) -> Result<(), TaskError> {
        while let Some(ev) = inbox.recv(&ctx).await {
            info!(
                owner = %ev.owner,
                missed_blocks = ev.missed_blocks,
                delta = ev.delta,
                observed_at = %ev.observed_at,
                "missed blocks increased"
            );
        }
        if ctx.is_cancelled() {
            return Err(TaskError::Canceled);
        }
        // The scheduler finished and dropped the dispatcher; the runtime is stopping.
        debug!("inbox closed; dispatcher gone");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stream-log"
    }
}

//! # HttpPoster: one POST per delta event.
//!
//! Reads exactly one event per tick (waiting if none is queued), POSTs it as JSON to
//! the configured endpoint, then pauses briefly. Failed posts are logged and not
//! retried. A closed inbox means the scheduler is gone and ends the consumer cleanly.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::consumers::consumer::pause;
use crate::consumers::{Consume, Inbox};
use crate::error::{SinkError, TaskError};
use crate::events::DeltaEvent;

/// Generic periodic poster.
pub struct HttpPoster {
    client: reqwest::Client,
    url: String,
    interval: Duration,
}

impl HttpPoster {
    /// Creates a poster for `url` with a 10ms pause between posts and a 10s request
    /// timeout.
    pub fn new(url: impl Into<String>) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            interval: Duration::from_millis(10),
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    async fn post(&self, ev: &DeltaEvent) -> Result<(), reqwest::Error> {
        let resp = self.client.post(&self.url).json(ev).send().await?;
        resp.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Consume for HttpPoster {
    async fn consume(&self, mut inbox: Inbox, ctx: CancellationToken) -> Result<(), TaskError> {
        while let Some(ev) = inbox.recv(&ctx).await {
            match self.post(&ev).await {
                Ok(()) => trace!(owner = %ev.owner, "event posted"),
                Err(err) => warn!(owner = %ev.owner, error = %err, "event post failed"),
            }
            if !pause(&ctx, self.interval).await {
                break;
            }
        }
        if ctx.is_cancelled() {
            return Err(TaskError::Canceled);
        }
        debug!("inbox closed; dispatcher gone");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http-poster"
    }
}

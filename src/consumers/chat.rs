//! # ChatPoster: batched chat notifications.
//!
//! Each tick drains at most `batch_size` queued events and posts them as one message,
//! one `"{owner} {missed_blocks} +{delta}"` line per event. The message rate is capped at
//! one per interval no matter how many events arrive in a burst; leftovers wait for the
//! next tick.
//!
//! ```text
//! tick ─► drain(≤ batch_size) ─┬─ empty ──► sleep(interval) ─► tick
//!                              └─ n > 0 ──► sink.send(lines) ─► sleep(interval) ─► tick
//! ```
//!
//! Send failures are logged and the batch is dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::consumers::consumer::pause;
use crate::consumers::{Consume, Inbox};
use crate::error::{SinkError, TaskError};

/// Outbound chat transport.
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    /// Posts `text` to `channel_id`.
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), SinkError>;
}

/// Telegram Bot API `sendMessage`.
pub struct TelegramSink {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramSink {
    /// Creates a sink for the bot `token` against `api_base` (normally `https://api.telegram.org`).
    ///
    /// Requests time out after 30s.
    pub fn new(api_base: &str, token: &str) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
        })
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
        let body = serde_json::json!({ "chat_id": channel_id, "text": text });
        let resp: BotResponse = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if resp.ok {
            Ok(())
        } else {
            Err(SinkError::Rejected {
                description: resp.description.unwrap_or_default(),
            })
        }
    }
}

/// Batching chat consumer.
pub struct ChatPoster {
    sink: Arc<dyn NotificationSink>,
    channel_id: String,
    batch_size: usize,
    interval: Duration,
    announce_start: bool,
}

impl ChatPoster {
    /// Default maximum number of events per message.
    pub const DEFAULT_BATCH_SIZE: usize = 21;

    /// Creates a poster with a 21-event cap, 1s interval and a start announcement.
    pub fn new(sink: Arc<dyn NotificationSink>, channel_id: impl Into<String>) -> Self {
        Self {
            sink,
            channel_id: channel_id.into(),
            batch_size: Self::DEFAULT_BATCH_SIZE,
            interval: Duration::from_secs(1),
            announce_start: true,
        }
    }

    /// Sets the per-message cap (min 1).
    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n.max(1);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_announce_start(mut self, on: bool) -> Self {
        self.announce_start = on;
        self
    }

    /// Runs one drain cycle; returns how many events went into the message.
    pub async fn flush(&self, inbox: &mut Inbox) -> usize {
        let batch = inbox.drain(self.batch_size);
        if batch.is_empty() {
            return 0;
        }

        let text = batch
            .iter()
            .map(|ev| ev.line())
            .collect::<Vec<_>>()
            .join("\n");
        match self.sink.send(&self.channel_id, &text).await {
            Ok(()) => debug!(events = batch.len(), "chat batch posted"),
            Err(err) => warn!(error = %err, label = err.as_label(), events = batch.len(), "chat post failed; batch dropped"),
        }
        batch.len()
    }
}

#[async_trait]
impl Consume for ChatPoster {
    async fn consume(&self, mut inbox: Inbox, ctx: CancellationToken) -> Result<(), TaskError> {
        if self.announce_start {
            if let Err(err) = self.sink.send(&self.channel_id, "Started.").await {
                warn!(error = %err, "start announcement failed");
            }
        }

        while !ctx.is_cancelled() {
            self.flush(&mut inbox).await;
            if !pause(&ctx, self.interval).await {
                break;
            }
        }
        Err(TaskError::Canceled)
    }

    fn name(&self) -> &'static str {
        "chat-poster"
    }
}

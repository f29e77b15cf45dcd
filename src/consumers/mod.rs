//! # Notification consumers and the fan-out dispatcher.
//!
//! ## Architecture
//! ```text
//! Scheduler ── publish(DeltaEvent) ──► Dispatcher
//!                                        │
//!                       ┌────────────────┼────────────────┐
//!                       ▼                ▼                ▼
//!                   [Inbox 1]        [Inbox 2]        [Inbox N]
//!                       │                │                │
//!                 StreamLogger      ChatPoster        HttpPoster
//!                 (one by one)   (≤21 per message)  (one POST each)
//! ```
//!
//! ## Consumer types
//! - [`StreamLogger`] logs every event as it arrives
//! - [`ChatPoster`] batches events into chat messages through a [`NotificationSink`]
//! - [`HttpPoster`] posts each event as JSON to an endpoint
//!
//! Custom sinks implement [`Consume`] and are registered with the supervisor builder.

mod chat;
mod consumer;
mod dispatcher;
mod http;
mod log;

pub use chat::{ChatPoster, NotificationSink, TelegramSink};
pub use consumer::{Consume, Inbox};
pub use dispatcher::Dispatcher;
pub use http::HttpPoster;
pub use log::StreamLogger;

pub(crate) use consumer::pause;

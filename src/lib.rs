//! # bpwatch
//!
//! **bpwatch** watches the missed-block counters of block producers on an EOSIO-style
//! chain and fans every increase out to independent notification consumers.
//!
//! It polls the system contract's `producers` table (or only the producers in the
//! current schedule), turns cumulative counters into per-round deltas, and can
//! re-register the operator's own producer with a backup key or deregister it once
//! configured thresholds are crossed.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                  ┌───────────────────────────────────┐
//!                  │  ProducerSource                   │
//!                  │  (pagination, filtering)          │
//!                  └───────────────┬───────────────────┘
//!                                  │ Vec<ProducerRecord>
//!                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scheduler (one task)                                             │
//! │  - DeltaEngine        (per-producer last counter)                 │
//! │  - RemediationManager (failover / deregistration, fire-once)      │
//! └───────────────────────────────┬───────────────────────────────────┘
//!                                 │ DeltaEvent
//!                                 ▼
//!                       ┌────────────────────┐
//!                       │     Dispatcher     │
//!                       └──┬───────┬───────┬─┘
//!                          ▼       ▼       ▼
//!                      [inbox]  [inbox]  [inbox]     (unbounded, one per consumer)
//!                          ▼       ▼       ▼
//!                   StreamLogger ChatPoster HttpPoster
//!
//!  Supervisor: owns all tasks, the runtime CancellationToken and the grace period.
//! ```
//!
//! ### Lifecycle
//! ```text
//! Supervisor::run()
//!   ├─► spawn Scheduler + one task per consumer
//!   ├─► wait: OS signal | token cancelled | any task finished
//!   ├─► cancel runtime token
//!   └─► join everything within grace, abort stragglers ─► Ok / RuntimeError
//! ```
//!
//! ## Features
//! | Area             | Description                                               | Key types / traits                        |
//! |------------------|-----------------------------------------------------------|-------------------------------------------|
//! | **Chain access** | Table reads over HTTP or `cleos`, producer roster paging. | [`ChainClient`], [`ProducerSource`]       |
//! | **Deltas**       | Cumulative counters to increase events.                   | [`DeltaEngine`], [`DeltaEvent`]           |
//! | **Consumers**    | Independent sinks, each with its own inbox and pace.      | [`Consume`], [`Inbox`], [`Dispatcher`]    |
//! | **Remediation**  | One-shot failover and deregistration.                     | [`RemediationManager`], [`ManagementActions`] |
//! | **Supervision**  | Task lifecycle and graceful shutdown.                     | [`Supervisor`], [`SupervisorBuilder`]     |
//! | **Errors**       | Typed errors for every layer.                             | [`RuntimeError`], [`TaskError`], [`SourceError`] |
//! | **Configuration**| JSON settings file.                                       | [`Settings`]                              |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bpwatch::{Consume, HttpChainClient, ProducerSource, SchedulerConfig, StreamLogger, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(HttpChainClient::new("https://api.example.org", Duration::from_secs(30))?);
//!     let source = ProducerSource::new(client);
//!
//!     let consumers: Vec<Arc<dyn Consume>> = vec![Arc::new(StreamLogger::new())];
//!
//!     let sup = Supervisor::builder(source)
//!         .with_scheduler(SchedulerConfig::default())
//!         .with_consumers(consumers)
//!         .build();
//!
//!     // Runs until SIGINT/SIGTERM or until a task ends.
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```
mod chain;
mod config;
mod consumers;
mod core;
mod error;
mod events;

// ---- Public re-exports ----

pub use crate::chain::{
    ChainClient, CleosChainClient, CleosManagement, HttpChainClient, ProducerRecord, ProducerSource,
    TablePage, TableQuery,
};
pub use crate::config::{
    FailoverSettings, HttpPostSettings, ManagedAccount, PollMode, Settings, TelegramSettings, Transport,
    UnregisterSettings,
};
pub use crate::consumers::{
    ChatPoster, Consume, Dispatcher, HttpPoster, Inbox, NotificationSink, StreamLogger, TelegramSink,
};
pub use crate::core::{
    DeltaEngine, ManagementActions, RegisterProducer, RemediationManager, RemediationState, Scheduler,
    SchedulerConfig, Supervisor, SupervisorBuilder,
};
pub use crate::error::{ActionError, ConfigError, RuntimeError, SinkError, SourceError, TaskError};
pub use crate::events::DeltaEvent;

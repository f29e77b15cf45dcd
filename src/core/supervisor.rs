//! # Supervisor: owns every task, the runtime token and graceful shutdown.
//!
//! The [`Supervisor`] spawns the scheduler and one task per consumer into a single
//! `JoinSet`, each with a child of the runtime [`CancellationToken`]. Cancelling that
//! token is the only way tasks are stopped.
//!
//! ## High-level architecture
//! ```text
//! Supervisor::run_until(shutdown)
//!
//! Spawn:
//!   Scheduler::run(child token)            ──► JoinSet
//!   Consume::consume(inbox_i, child token) ──► JoinSet   (one per consumer)
//!
//! Wait for the first of:
//!   - shutdown future (OS signal)          ─┐
//!   - runtime token cancelled by the host   ├─► runtime_token.cancel()
//!   - any task finishing (Ok, Err, panic)  ─┘         │
//!                                                      ▼
//!                                   wait_all_with_grace(grace):
//!                                     ├─ all joined → Ok / TaskFailed
//!                                     └─ timeout    → abort_all, GraceExceeded{stuck}
//! ```
//!
//! ## Rules
//! - Tasks are expected to run until cancelled; any task ending first is a fatal
//!   condition for the whole runtime (the scheduler ends after deregistration).
//! - A task ending with `TaskError::Fatal` or panicking is reported as
//!   [`RuntimeError::TaskFailed`] once everything has stopped.
//! - Panics are caught per task and converted to `TaskError::Fatal`.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::consumers::{Consume, Inbox};
use crate::core::{alive::AliveTracker, builder::SupervisorBuilder, scheduler::Scheduler, shutdown};
use crate::chain::ProducerSource;
use crate::error::{RuntimeError, TaskError};

/// Name and result of a finished task.
type TaskOutcome = (String, Result<(), TaskError>);

/// Coordinates the scheduler, consumers and graceful shutdown.
pub struct Supervisor {
    grace: Duration,
    scheduler: Scheduler,
    consumers: Vec<(Arc<dyn Consume>, Inbox)>,
    token: CancellationToken,
    alive: Arc<AliveTracker>,
}

impl Supervisor {
    /// Starts building a supervisor around `source`.
    pub fn builder(source: ProducerSource) -> SupervisorBuilder {
        SupervisorBuilder::new(source)
    }

    pub(crate) fn new_internal(
        grace: Duration,
        scheduler: Scheduler,
        consumers: Vec<(Arc<dyn Consume>, Inbox)>,
        token: CancellationToken,
    ) -> Self {
        Self {
            grace,
            scheduler,
            consumers,
            token,
            alive: Arc::new(AliveTracker::new()),
        }
    }

    /// Runtime token; cancelling it shuts the supervisor down.
    ///
    /// Hosts that handle signals themselves route them here instead of keeping a
    /// parallel shutdown path.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runs until an OS termination signal, a task finishing, or token cancellation.
    pub async fn run(self) -> Result<(), RuntimeError> {
        self.run_until(shutdown::wait_for_shutdown_signal()).await
    }

    /// Runs until `shutdown` resolves, a task finishes, or the token is cancelled.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let Supervisor {
            grace,
            scheduler,
            consumers,
            token,
            alive,
        } = self;

        let mut set = JoinSet::new();
        spawn_tracked(&mut set, &alive, "scheduler", scheduler.run(token.child_token())).await;
        for (consumer, inbox) in consumers {
            let ctx = token.child_token();
            let name = consumer.name();
            spawn_tracked(&mut set, &alive, name, async move {
                consumer.consume(inbox, ctx).await
            })
            .await;
        }
        info!(tasks = set.len(), "supervisor started");

        let trigger = tokio::select! {
            _ = token.cancelled() => {
                info!("runtime token cancelled");
                None
            }
            res = shutdown => {
                match res {
                    Ok(()) => info!("shutdown signal received"),
                    Err(err) => error!(error = %err, "signal handling failed; shutting down"),
                }
                None
            }
            Some(joined) = set.join_next() => Some(joined.unwrap_or_else(|e| {
                ("unknown".to_string(), Err(TaskError::Fatal { error: e.to_string() }))
            })),
        };

        token.cancel();

        let failure = match trigger {
            None => None,
            Some((task, Ok(()))) => {
                info!(%task, "task finished; shutting down");
                None
            }
            Some((task, Err(error))) => {
                if error.is_canceled() {
                    info!(%task, "task cancelled; shutting down");
                    None
                } else {
                    error!(%task, error = %error, "task failed; shutting down");
                    Some(RuntimeError::TaskFailed { task, error })
                }
            }
        };

        wait_all_with_grace(&mut set, grace, &alive).await?;
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Spawns `fut` into `set`, tracking it as alive until it ends and converting panics
/// into `TaskError::Fatal`.
async fn spawn_tracked<F>(set: &mut JoinSet<TaskOutcome>, alive: &Arc<AliveTracker>, name: &str, fut: F)
where
    F: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    alive.mark_started(name).await;
    let alive = Arc::clone(alive);
    let name = name.to_string();

    set.spawn(async move {
        let res = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res,
            Err(panic_err) => {
                let any = &*panic_err;
                let error = if let Some(msg) = any.downcast_ref::<&'static str>() {
                    (*msg).to_string()
                } else if let Some(msg) = any.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                };
                Err(TaskError::Fatal { error })
            }
        };
        alive.mark_stopped(&name).await;
        (name, res)
    });
}

/// Waits for every task to finish within `grace`; aborts the rest on timeout.
async fn wait_all_with_grace(
    set: &mut JoinSet<TaskOutcome>,
    grace: Duration,
    alive: &AliveTracker,
) -> Result<(), RuntimeError> {
    let done = async {
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((task, Ok(()))) => debug!(%task, "stopped"),
                Ok((task, Err(e))) if e.is_canceled() => debug!(%task, "stopped on cancel"),
                Ok((task, Err(e))) => warn!(%task, error = %e, "stopped with error"),
                Err(e) => warn!(error = %e, "task join failed"),
            }
        }
    };

    match tokio::time::timeout(grace, done).await {
        Ok(()) => {
            info!("all tasks stopped within grace");
            Ok(())
        }
        Err(_) => {
            let stuck = alive.snapshot().await;
            set.abort_all();
            error!(?grace, ?stuck, "grace exceeded; aborting tasks");
            Err(RuntimeError::GraceExceeded { grace, stuck })
        }
    }
}

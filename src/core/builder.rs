use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{
    remediation::RemediationManager,
    scheduler::{Scheduler, SchedulerConfig},
    supervisor::Supervisor,
};
use crate::chain::ProducerSource;
use crate::consumers::{Consume, Dispatcher};

/// Builder for constructing a [`Supervisor`] with optional features.
pub struct SupervisorBuilder {
    source: ProducerSource,
    scheduler: SchedulerConfig,
    consumers: Vec<Arc<dyn Consume>>,
    remediation: Option<RemediationManager>,
    grace: Duration,
    token: Option<CancellationToken>,
}

impl SupervisorBuilder {
    /// Default time tasks get to stop after cancellation.
    pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);

    /// Creates a builder polling `source` with default scheduler settings.
    pub fn new(source: ProducerSource) -> Self {
        Self {
            source,
            scheduler: SchedulerConfig::default(),
            consumers: Vec::new(),
            remediation: None,
            grace: Self::DEFAULT_GRACE,
            token: None,
        }
    }

    /// Sets polling mode, intervals and the producer check list.
    pub fn with_scheduler(mut self, cfg: SchedulerConfig) -> Self {
        self.scheduler = cfg;
        self
    }

    /// Sets the event consumers.
    ///
    /// Each consumer gets its own inbox and task; one slow consumer never delays
    /// the others or the scheduler.
    pub fn with_consumers(mut self, consumers: Vec<Arc<dyn Consume>>) -> Self {
        self.consumers = consumers;
        self
    }

    /// Enables failover/deregistration for the managed account.
    pub fn with_remediation(mut self, manager: RemediationManager) -> Self {
        self.remediation = Some(manager);
        self
    }

    /// Sets the shutdown grace period.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Uses an externally owned runtime token instead of a fresh one.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Wires the dispatcher, scheduler and consumer inboxes together.
    pub fn build(self) -> Supervisor {
        let (dispatcher, inboxes) = Dispatcher::for_consumers(&self.consumers);

        let mut scheduler = Scheduler::new(self.source, self.scheduler, dispatcher);
        if let Some(manager) = self.remediation {
            scheduler = scheduler.with_remediation(manager);
        }

        let consumers = self.consumers.into_iter().zip(inboxes).collect();
        let token = self.token.unwrap_or_default();

        Supervisor::new_internal(self.grace, scheduler, consumers, token)
    }
}

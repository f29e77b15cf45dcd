//! # Scheduler: the poll → compute → emit loop.
//!
//! ## State machine
//! ```text
//! IDLE ─► POLLING ─► AGGREGATING ─► SLEEPING ─► POLLING ─► ...
//!            │                         ▲
//!            └── SourceError (logged) ─┘
//!
//! any state ── ctx cancelled ──► exit (TaskError::Canceled)
//! AGGREGATING ── deregistration fired ──► exit (Ok)
//! ```
//!
//! ## Polling modes
//! - [`PollMode::Roster`]: one paginated fetch of the whole `producers` table, filtered by
//!   `check_list`.
//! - [`PollMode::Schedule`]: the scheduled producer names are re-read from `schedulemetr`
//!   every `schedule_interval`; each round fetches every scheduled producer concurrently and
//!   joins all sub-fetches before aggregating. A failed sub-fetch only drops that producer
//!   from the round.
//!
//! ## Rules
//! - A round's records are applied to the [`DeltaEngine`] serially, after the fetch has
//!   been joined, so observations of one producer never interleave.
//! - Rounds are never retried; the next interval polls again.
//! - After deregistration the current round is finished, then the loop exits.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chain::{ProducerRecord, ProducerSource};
use crate::config::{PollMode, Settings};
use crate::consumers::{pause, Dispatcher};
use crate::core::delta::DeltaEngine;
use crate::core::remediation::RemediationManager;
use crate::error::{SourceError, TaskError};

/// Scheduler timing and selection.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Producer discovery mode.
    pub mode: PollMode,
    /// Sleep between rounds.
    pub poll_interval: Duration,
    /// Schedule refresh period (schedule mode only).
    pub schedule_interval: Duration,
    /// Producers to watch; empty watches all.
    pub check_list: BTreeSet<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: PollMode::Roster,
            poll_interval: Duration::from_secs(126),
            schedule_interval: Duration::from_secs(600),
            check_list: BTreeSet::new(),
        }
    }
}

impl From<&Settings> for SchedulerConfig {
    fn from(s: &Settings) -> Self {
        Self {
            mode: s.mode,
            poll_interval: s.poll_interval(),
            schedule_interval: s.schedule_interval(),
            check_list: s.check_list.clone(),
        }
    }
}

/// Drives polling rounds and feeds the dispatcher.
pub struct Scheduler {
    source: ProducerSource,
    cfg: SchedulerConfig,
    engine: DeltaEngine,
    dispatcher: Dispatcher,
    remediation: Option<RemediationManager>,
    schedule: Vec<String>,
    schedule_read_at: Option<Instant>,
}

impl Scheduler {
    pub fn new(source: ProducerSource, cfg: SchedulerConfig, dispatcher: Dispatcher) -> Self {
        Self {
            source,
            cfg,
            engine: DeltaEngine::new(),
            dispatcher,
            remediation: None,
            schedule: Vec::new(),
            schedule_read_at: None,
        }
    }

    /// Attaches the remediation manager evaluated on every observed record.
    pub fn with_remediation(mut self, manager: RemediationManager) -> Self {
        self.remediation = Some(manager);
        self
    }

    /// Runs rounds until cancelled or until deregistration fires.
    pub async fn run(mut self, ctx: CancellationToken) -> Result<(), TaskError> {
        info!(
            mode = ?self.cfg.mode,
            transport = self.source.transport(),
            interval = ?self.cfg.poll_interval,
            consumers = self.dispatcher.len(),
            managed = ?self.remediation.as_ref().map(RemediationManager::account),
            "scheduler started"
        );

        loop {
            let polled = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(TaskError::Canceled),
                res = self.poll() => res,
            };

            match polled {
                Ok(records) => {
                    if self.aggregate(records).await {
                        info!("producer deregistered; polling stopped");
                        return Ok(());
                    }
                }
                Err(err) => {
                    warn!(error = %err, label = err.as_label(), "poll failed; round skipped");
                }
            }

            if !pause(&ctx, self.cfg.poll_interval).await {
                return Err(TaskError::Canceled);
            }
        }
    }

    async fn poll(&mut self) -> Result<Vec<ProducerRecord>, SourceError> {
        match self.cfg.mode {
            PollMode::Roster => self.source.fetch_roster(&self.cfg.check_list).await,
            PollMode::Schedule => self.poll_scheduled().await,
        }
    }

    fn schedule_due(&self) -> bool {
        match self.schedule_read_at {
            None => true,
            Some(at) => at.elapsed() >= self.cfg.schedule_interval,
        }
    }

    async fn poll_scheduled(&mut self) -> Result<Vec<ProducerRecord>, SourceError> {
        if self.schedule_due() {
            self.schedule = self.source.fetch_schedule().await?;
            self.schedule_read_at = Some(Instant::now());
            debug!(producers = self.schedule.len(), "schedule refreshed");
        }

        let check_list = &self.cfg.check_list;
        let source = &self.source;
        let fetches = self
            .schedule
            .iter()
            .filter(|name| check_list.is_empty() || check_list.contains(*name))
            .map(|name| async move { (name, source.fetch_producer(name).await) });

        let mut records = Vec::new();
        for (name, res) in join_all(fetches).await {
            match res {
                Ok(Some(rec)) => records.push(rec),
                Ok(None) => debug!(producer = %name, "scheduled producer has no row"),
                Err(err) => warn!(producer = %name, error = %err, "producer fetch failed"),
            }
        }
        Ok(records)
    }

    /// Applies one round of records; returns `true` when polling must stop.
    async fn aggregate(&mut self, records: Vec<ProducerRecord>) -> bool {
        let at = Utc::now();
        let mut emitted = 0usize;

        for rec in &records {
            if let Some(ev) = self.engine.observe(rec, at) {
                self.dispatcher.publish(ev);
                emitted += 1;
            }
            if let Some(mgr) = self.remediation.as_mut() {
                if let Err(err) = mgr.evaluate(&rec.name, rec.missed_blocks).await {
                    error!(account = %rec.name, error = %err, label = err.as_label(), "remediation action failed");
                }
            }
        }

        debug!(producers = records.len(), emitted, tracked = self.engine.tracked(), "round done");
        self.remediation
            .as_ref()
            .is_some_and(RemediationManager::should_stop_polling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{producer_row, ChainClient, TablePage, TableQuery};
    use crate::consumers::{Consume, Inbox, StreamLogger};
    use crate::core::remediation::tests::{policy, RecordingActions};
    use crate::core::remediation::RemediationState;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Serves one scripted response per `producers` roster request (round), and
    /// per-producer rows from a mutable map.
    #[derive(Default)]
    struct FakeChain {
        rounds: Mutex<Vec<Result<Vec<(&'static str, u64)>, ()>>>,
        counters: Mutex<HashMap<String, u64>>,
        schedule: Vec<&'static str>,
        schedule_reads: Mutex<usize>,
    }

    impl FakeChain {
        fn with_rounds(mut rounds: Vec<Result<Vec<(&'static str, u64)>, ()>>) -> Arc<Self> {
            rounds.reverse();
            Arc::new(Self {
                rounds: Mutex::new(rounds),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn get_table_rows(&self, q: &TableQuery) -> Result<TablePage, SourceError> {
            if q.table == "schedulemetr" {
                *self.schedule_reads.lock().unwrap() += 1;
                let metric: Vec<_> = self
                    .schedule
                    .iter()
                    .map(|n| serde_json::json!({ "bp_name": n }))
                    .collect();
                return Ok(TablePage {
                    rows: vec![serde_json::json!({ "producers_metric": metric })],
                    ..Default::default()
                });
            }
            if let Some(name) = &q.upper_bound {
                let missed = self.counters.lock().unwrap().get(name).copied();
                return match missed {
                    Some(m) => Ok(TablePage {
                        rows: vec![producer_row(name, m, true)],
                        ..Default::default()
                    }),
                    None => Err(SourceError::Logical {
                        message: format!("no row for {name}"),
                    }),
                };
            }
            match self.rounds.lock().unwrap().pop() {
                Some(Ok(rows)) => Ok(TablePage {
                    rows: rows.iter().map(|(n, m)| producer_row(n, *m, true)).collect(),
                    ..Default::default()
                }),
                Some(Err(())) => Err(SourceError::Logical {
                    message: "node overloaded".into(),
                }),
                None => Ok(TablePage::default()),
            }
        }
    }

    fn wire(client: Arc<FakeChain>, cfg: SchedulerConfig) -> (Scheduler, Inbox) {
        let consumers: Vec<Arc<dyn Consume>> = vec![Arc::new(StreamLogger::new())];
        let (dispatcher, mut inboxes) = Dispatcher::for_consumers(&consumers);
        let scheduler = Scheduler::new(ProducerSource::new(client), cfg, dispatcher);
        (scheduler, inboxes.remove(0))
    }

    fn cfg(mode: PollMode) -> SchedulerConfig {
        SchedulerConfig {
            mode,
            poll_interval: Duration::from_secs(10),
            schedule_interval: Duration::from_secs(60),
            check_list: BTreeSet::new(),
        }
    }

    fn deltas(inbox: &mut Inbox) -> Vec<(String, u64)> {
        inbox
            .drain(usize::MAX)
            .iter()
            .map(|ev| (ev.owner.clone(), ev.delta))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_rounds_emit_deltas() {
        let client = FakeChain::with_rounds(vec![
            Ok(vec![("alpha", 5), ("bravo", 0)]),
            Ok(vec![("alpha", 5), ("bravo", 2)]),
            Ok(vec![("alpha", 9), ("bravo", 2)]),
        ]);
        let (scheduler, mut inbox) = wire(client, cfg(PollMode::Roster));
        let ctx = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(ctx.clone()));

        tokio::time::sleep(Duration::from_secs(25)).await;
        ctx.cancel();
        assert!(matches!(handle.await.unwrap(), Err(TaskError::Canceled)));

        assert_eq!(
            deltas(&mut inbox),
            [
                ("alpha".to_string(), 5),
                ("bravo".to_string(), 2),
                ("alpha".to_string(), 4)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_skips_round() {
        let client = FakeChain::with_rounds(vec![
            Ok(vec![("alpha", 3)]),
            Err(()),
            Ok(vec![("alpha", 4)]),
        ]);
        let (scheduler, mut inbox) = wire(client, cfg(PollMode::Roster));
        let ctx = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(ctx.clone()));

        tokio::time::sleep(Duration::from_secs(25)).await;
        ctx.cancel();
        handle.await.unwrap().unwrap_err();

        assert_eq!(
            deltas(&mut inbox),
            [("alpha".to_string(), 3), ("alpha".to_string(), 1)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_list_filters_roster() {
        let client = FakeChain::with_rounds(vec![Ok(vec![("alpha", 3), ("bravo", 7)])]);
        let mut c = cfg(PollMode::Roster);
        c.check_list.insert("bravo".to_string());
        let (scheduler, mut inbox) = wire(client, c);
        let ctx = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(ctx.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        ctx.cancel();
        handle.await.unwrap().unwrap_err();

        assert_eq!(deltas(&mut inbox), [("bravo".to_string(), 7)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_mode_fetches_each_producer() {
        let client = Arc::new(FakeChain {
            schedule: vec!["alpha", "bravo", "ghost"],
            ..Default::default()
        });
        client.counters.lock().unwrap().extend([
            ("alpha".to_string(), 2),
            ("bravo".to_string(), 0),
        ]);
        let (scheduler, mut inbox) = wire(client.clone(), cfg(PollMode::Schedule));
        let ctx = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(ctx.clone()));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(deltas(&mut inbox), [("alpha".to_string(), 2)]);

        client.counters.lock().unwrap().insert("bravo".to_string(), 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(deltas(&mut inbox), [("bravo".to_string(), 1)]);

        // Rounds at t=0 and t=10 share one schedule read; t=60 refreshes it.
        assert_eq!(*client.schedule_reads.lock().unwrap(), 1);
        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(*client.schedule_reads.lock().unwrap(), 2);

        ctx.cancel();
        handle.await.unwrap().unwrap_err();
    }

    #[tokio::test(start_paused = true)]
    async fn test_deregistration_stops_scheduler() {
        let client = FakeChain::with_rounds(vec![
            Ok(vec![("alpha", 5), ("bravo", 1)]),
            Ok(vec![("alpha", 15), ("bravo", 2)]),
            Ok(vec![("alpha", 25), ("bravo", 3)]),
            Ok(vec![("alpha", 30), ("bravo", 4)]),
        ]);
        let (scheduler, mut inbox) = wire(client, cfg(PollMode::Roster));
        let actions = Arc::new(RecordingActions::default());
        let scheduler = scheduler.with_remediation(RemediationManager::new(
            policy(10, 20),
            RemediationState::default(),
            actions.clone(),
        ));

        let res = scheduler.run(CancellationToken::new()).await;
        assert!(res.is_ok());
        assert_eq!(
            *actions.calls.lock().unwrap(),
            ["regproducer alpha EOS6backup", "unregprod alpha"]
        );
        // The deregistering round still completes for every producer.
        let got = deltas(&mut inbox);
        assert_eq!(got.len(), 6);
        assert_eq!(got.last(), Some(&("bravo".to_string(), 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_sleeping() {
        let client = FakeChain::with_rounds(vec![Ok(vec![("alpha", 1)])]);
        let (scheduler, _inbox) = wire(client, cfg(PollMode::Roster));
        let ctx = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(ctx.clone()));

        tokio::time::sleep(Duration::from_secs(3)).await;
        ctx.cancel();
        assert!(matches!(handle.await.unwrap(), Err(TaskError::Canceled)));
    }
}

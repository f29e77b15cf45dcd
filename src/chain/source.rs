//! # Producer roster source.
//!
//! [`ProducerSource`] turns raw table pages into [`ProducerRecord`]s:
//! - [`fetch_roster`](ProducerSource::fetch_roster) pages through the `producers` table,
//!   following `next_key`, and stops after `max_pages` even when the chain still reports
//!   `more`;
//! - [`fetch_producer`](ProducerSource::fetch_producer) reads a single producer row;
//! - [`fetch_schedule`](ProducerSource::fetch_schedule) lists the producers in the
//!   current schedule.
//!
//! ## Pagination
//! ```text
//! page 1 (lower = none) ──► more? ──► page 2 (lower = next_key) ──► ... ──► page max_pages
//!                             │                                              │
//!                             └─ no: done                  still more: warn, keep what we have
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::chain::client::{ChainClient, TableQuery};
use crate::error::SourceError;

/// One row of the `producers` table, as much of it as the monitor needs.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProducerRecord {
    /// Producer account.
    #[serde(rename = "owner")]
    pub name: String,
    /// Missed blocks in the current rotation.
    #[serde(rename = "missed_blocks_per_rotation")]
    pub missed_blocks: u64,
    /// Whether the producer is registered and active.
    #[serde(rename = "is_active", default, deserialize_with = "flag")]
    pub active: bool,
}

impl ProducerRecord {
    pub fn new(name: impl Into<String>, missed_blocks: u64, active: bool) -> Self {
        Self {
            name: name.into(),
            missed_blocks,
            active,
        }
    }
}

/// Accepts `true`/`false` as well as the `1`/`0` that nodeos emits for `is_active`.
fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u64),
    }
    Ok(match Flag::deserialize(d)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
    })
}

#[derive(Deserialize)]
struct ScheduleRow {
    #[serde(default)]
    producers_metric: Vec<ScheduleEntry>,
}

#[derive(Deserialize)]
struct ScheduleEntry {
    bp_name: String,
}

/// Reads producer records through any [`ChainClient`].
#[derive(Clone)]
pub struct ProducerSource {
    client: Arc<dyn ChainClient>,
    page_limit: u32,
    max_pages: usize,
}

impl ProducerSource {
    /// Default rows per page.
    pub const DEFAULT_PAGE_LIMIT: u32 = 1000;
    /// Default cap on pages per roster fetch.
    pub const DEFAULT_MAX_PAGES: usize = 10;

    /// Creates a source with default paging.
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self {
            client,
            page_limit: Self::DEFAULT_PAGE_LIMIT,
            max_pages: Self::DEFAULT_MAX_PAGES,
        }
    }

    /// Sets rows requested per page (min 1).
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    /// Sets the page cap (min 1).
    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages.max(1);
        self
    }

    /// Name of the underlying chain transport.
    pub fn transport(&self) -> &'static str {
        self.client.name()
    }

    /// Fetches every active producer, optionally restricted to `filter` (empty = all).
    ///
    /// Hitting the page cap is not an error: the rows fetched so far are returned and a
    /// [`SourceError::PaginationLimitExceeded`] warning is logged.
    pub async fn fetch_roster(
        &self,
        filter: &BTreeSet<String>,
    ) -> Result<Vec<ProducerRecord>, SourceError> {
        let mut records = Vec::new();
        let mut lower: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut query = TableQuery::producers().with_limit(self.page_limit);
            if let Some(bound) = lower.take() {
                query = query.with_lower(bound);
            }

            let page = self.client.get_table_rows(&query).await?;
            pages += 1;

            for row in page.rows {
                let rec: ProducerRecord = serde_json::from_value(row)?;
                if rec.active && (filter.is_empty() || filter.contains(&rec.name)) {
                    records.push(rec);
                }
            }

            if !page.more {
                break;
            }
            if pages >= self.max_pages {
                let err = SourceError::PaginationLimitExceeded { pages };
                warn!(error = %err, kept = records.len(), "roster truncated");
                break;
            }
            if page.next_key.is_empty() {
                warn!(pages, "chain reported more rows without next_key; stopping");
                break;
            }
            lower = Some(page.next_key);
        }

        debug!(pages, producers = records.len(), "roster fetched");
        Ok(records)
    }

    /// Fetches one producer's row; `None` when the account has no row.
    pub async fn fetch_producer(&self, name: &str) -> Result<Option<ProducerRecord>, SourceError> {
        let query = TableQuery::producers()
            .with_lower(name)
            .with_upper(name)
            .with_limit(1);
        let page = self.client.get_table_rows(&query).await?;

        match page.rows.into_iter().next() {
            Some(row) => {
                let rec: ProducerRecord = serde_json::from_value(row)?;
                Ok((rec.name == name).then_some(rec))
            }
            None => Ok(None),
        }
    }

    /// Lists producer names in the current schedule (`schedulemetr` table).
    pub async fn fetch_schedule(&self) -> Result<Vec<String>, SourceError> {
        let page = self
            .client
            .get_table_rows(&TableQuery::schedule_metrics())
            .await?;

        let Some(row) = page.rows.into_iter().next() else {
            return Ok(Vec::new());
        };
        let row: ScheduleRow = serde_json::from_value(row)?;
        Ok(row.producers_metric.into_iter().map(|e| e.bp_name).collect())
    }
}

/// Builds a `producers` row the way nodeos returns it (used by tests across the crate).
#[cfg(test)]
pub(crate) fn producer_row(name: &str, missed: u64, active: bool) -> serde_json::Value {
    serde_json::json!({
        "owner": name,
        "total_votes": "1.0",
        "producer_key": "EOS5...",
        "is_active": u8::from(active),
        "url": "",
        "missed_blocks_per_rotation": missed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::client::TablePage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns a fixed page for every request and records the queries.
    struct EndlessPages {
        seen: Mutex<Vec<TableQuery>>,
    }

    #[async_trait]
    impl ChainClient for EndlessPages {
        async fn get_table_rows(&self, q: &TableQuery) -> Result<TablePage, SourceError> {
            let mut seen = self.seen.lock().unwrap();
            seen.push(q.clone());
            let n = seen.len();
            Ok(TablePage {
                rows: vec![producer_row(&format!("bp{n}"), n as u64, true)],
                more: true,
                next_key: format!("key{n}"),
            })
        }
    }

    /// Serves pages from a script, one per request.
    struct Scripted {
        pages: Mutex<Vec<Result<TablePage, SourceError>>>,
    }

    impl Scripted {
        fn new(mut pages: Vec<Result<TablePage, SourceError>>) -> Arc<Self> {
            pages.reverse();
            Arc::new(Self {
                pages: Mutex::new(pages),
            })
        }
    }

    #[async_trait]
    impl ChainClient for Scripted {
        async fn get_table_rows(&self, _q: &TableQuery) -> Result<TablePage, SourceError> {
            self.pages
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(TablePage::default()))
        }
    }

    #[tokio::test]
    async fn test_pagination_stops_at_cap() {
        let client = Arc::new(EndlessPages {
            seen: Mutex::new(Vec::new()),
        });
        let source = ProducerSource::new(client.clone()).with_max_pages(10);

        let roster = source.fetch_roster(&BTreeSet::new()).await.unwrap();
        assert_eq!(roster.len(), 10);

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 10);
        assert_eq!(seen[0].lower_bound, None);
        assert_eq!(seen[1].lower_bound.as_deref(), Some("key1"));
        assert_eq!(seen[9].lower_bound.as_deref(), Some("key9"));
    }

    #[tokio::test]
    async fn test_roster_keeps_active_and_filtered() {
        let client = Scripted::new(vec![
            Ok(TablePage {
                rows: vec![
                    producer_row("alpha", 1, true),
                    producer_row("bravo", 2, false),
                ],
                more: true,
                next_key: "charlie".into(),
            }),
            Ok(TablePage {
                rows: vec![producer_row("charlie", 3, true), producer_row("delta", 0, true)],
                more: false,
                next_key: String::new(),
            }),
        ]);
        let source = ProducerSource::new(client);

        let all = source.fetch_roster(&BTreeSet::new()).await.unwrap();
        let names: Vec<_> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["alpha", "charlie", "delta"]);
    }

    #[tokio::test]
    async fn test_roster_filter() {
        let client = Scripted::new(vec![Ok(TablePage {
            rows: vec![producer_row("alpha", 1, true), producer_row("charlie", 3, true)],
            more: false,
            next_key: String::new(),
        })]);
        let source = ProducerSource::new(client);
        let filter: BTreeSet<String> = ["charlie".to_string()].into();

        let roster = source.fetch_roster(&filter).await.unwrap();
        assert_eq!(roster, vec![ProducerRecord::new("charlie", 3, true)]);
    }

    #[tokio::test]
    async fn test_roster_error_surfaces() {
        let client = Scripted::new(vec![Err(SourceError::Logical {
            message: "boom".into(),
        })]);
        let source = ProducerSource::new(client);
        let err = source.fetch_roster(&BTreeSet::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "source_logical");
    }

    #[tokio::test]
    async fn test_fetch_producer() {
        let client = Scripted::new(vec![
            Ok(TablePage {
                rows: vec![producer_row("alpha", 4, true)],
                ..Default::default()
            }),
            Ok(TablePage {
                rows: vec![producer_row("bravo", 4, true)],
                ..Default::default()
            }),
            Ok(TablePage::default()),
        ]);
        let source = ProducerSource::new(client);

        let rec = source.fetch_producer("alpha").await.unwrap();
        assert_eq!(rec, Some(ProducerRecord::new("alpha", 4, true)));
        assert_eq!(source.fetch_producer("alpha").await.unwrap(), None);
        assert_eq!(source.fetch_producer("alpha").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fetch_schedule() {
        let client = Scripted::new(vec![Ok(TablePage {
            rows: vec![serde_json::json!({
                "id": 1,
                "producers_metric": [
                    { "bp_name": "alpha", "missed_blocks_per_cycle": 0 },
                    { "bp_name": "bravo", "missed_blocks_per_cycle": 12 }
                ]
            })],
            ..Default::default()
        })]);
        let source = ProducerSource::new(client);
        assert_eq!(source.fetch_schedule().await.unwrap(), ["alpha", "bravo"]);
    }

    #[tokio::test]
    async fn test_transport_name() {
        let http = crate::chain::HttpChainClient::new("http://127.0.0.1:8888", std::time::Duration::from_secs(1)).unwrap();
        assert_eq!(ProducerSource::new(Arc::new(http)).transport(), "http");

        let cleos = crate::chain::CleosChainClient::new("cleos", "http://127.0.0.1:8888");
        assert_eq!(ProducerSource::new(Arc::new(cleos)).transport(), "cleos");
    }

    #[test]
    fn test_is_active_accepts_bool() {
        let rec: ProducerRecord = serde_json::from_value(serde_json::json!({
            "owner": "alpha",
            "missed_blocks_per_rotation": 3,
            "is_active": true
        }))
        .unwrap();
        assert!(rec.active);
    }
}

//! # Table query contract shared by every chain transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SourceError;

/// Contract for reading one page of a contract table.
///
/// Implementations perform exactly one request per call; pagination is the
/// caller's job (see [`ProducerSource`](crate::chain::ProducerSource)).
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Fetches one page of rows matching `query`.
    async fn get_table_rows(&self, query: &TableQuery) -> Result<TablePage, SourceError>;

    /// Human-readable transport name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Request body of `get_table_rows`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableQuery {
    pub code: String,
    pub scope: String,
    pub table: String,
    pub key_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<String>,
    pub limit: u32,
    pub json: bool,
}

impl TableQuery {
    /// Query against a table of the `eosio` system contract.
    pub fn system(table: &str) -> Self {
        Self {
            code: "eosio".to_string(),
            scope: "eosio".to_string(),
            table: table.to_string(),
            key_type: "i64".to_string(),
            lower_bound: None,
            upper_bound: None,
            limit: 10,
            json: true,
        }
    }

    /// The `producers` table.
    pub fn producers() -> Self {
        Self::system("producers")
    }

    /// The `schedulemetr` table (current schedule with per-producer metrics).
    pub fn schedule_metrics() -> Self {
        Self::system("schedulemetr")
    }

    #[inline]
    pub fn with_lower(mut self, bound: impl Into<String>) -> Self {
        self.lower_bound = Some(bound.into());
        self
    }

    #[inline]
    pub fn with_upper(mut self, bound: impl Into<String>) -> Self {
        self.upper_bound = Some(bound.into());
        self
    }

    #[inline]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// One page of table rows.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TablePage {
    #[serde(default)]
    pub rows: Vec<Value>,
    /// Whether rows remain past this page.
    #[serde(default)]
    pub more: bool,
    /// Lower bound for the next page when `more` is set.
    #[serde(default)]
    pub next_key: String,
}

impl TablePage {
    /// Parses a transport response body.
    ///
    /// A body carrying an `error` member becomes [`SourceError::Logical`]; anything that is
    /// neither an error nor a page becomes [`SourceError::Parse`].
    pub fn parse(body: &[u8]) -> Result<Self, SourceError> {
        let value: Value = serde_json::from_slice(body)?;
        if let Some(err) = value.get("error") {
            return Err(SourceError::Logical {
                message: err.to_string(),
            });
        }
        Ok(serde_json::from_value(value)?)
    }
}

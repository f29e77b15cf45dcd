//! # HTTP JSON-RPC transport.

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::chain::client::{ChainClient, TablePage, TableQuery};
use crate::error::SourceError;

/// Reads tables through `POST {endpoint}/v1/chain/get_table_rows`.
///
/// Non-2xx responses are not treated as transport errors: nodeos reports table errors
/// as a JSON body with status 500, which [`TablePage::parse`] turns into
/// [`SourceError::Logical`].
#[derive(Clone, Debug)]
pub struct HttpChainClient {
    client: reqwest::Client,
    url: String,
}

impl HttpChainClient {
    /// Creates a client for the given API base URL.
    ///
    /// Every request is bounded by `timeout`; a node that accepts the connection and
    /// never answers yields [`SourceError::Http`] instead of stalling the round.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Creates a client reusing an existing `reqwest` connection pool.
    ///
    /// The caller's client is responsible for its own request timeout.
    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Self {
        let url = format!("{}/v1/chain/get_table_rows", endpoint.trim_end_matches('/'));
        Self { client, url }
    }

    /// Full request URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn get_table_rows(&self, query: &TableQuery) -> Result<TablePage, SourceError> {
        let resp = self.client.post(&self.url).json(query).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        trace!(table = %query.table, %status, bytes = body.len(), "get_table_rows");
        TablePage::parse(&body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

//! # Chain access: table queries, producer roster, management commands.
//!
//! ```text
//!   ProducerSource ──► Arc<dyn ChainClient> ──┬──► HttpChainClient  (POST /v1/chain/get_table_rows)
//!   (pagination,                              └──► CleosChainClient (cleos get table ...)
//!    filtering)
//!
//!   RemediationManager ──► Arc<dyn ManagementActions> ──► CleosManagement (cleos system ...)
//! ```
//!
//! Both transports return the same JSON shape, `{ rows, more, next_key }` or
//! `{ error }`, and are interchangeable behind [`ChainClient`].

mod cleos;
mod client;
mod http;
mod source;

pub use cleos::{CleosChainClient, CleosManagement};
pub use client::{ChainClient, TablePage, TableQuery};
pub use http::HttpChainClient;
pub use source::{ProducerRecord, ProducerSource};

#[cfg(test)]
pub(crate) use source::producer_row;

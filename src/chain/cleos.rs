//! # `cleos` subprocess transport.
//!
//! Both the table reader and the management actions shell out to the `cleos`
//! command line client. Every invocation has a deadline; children are spawned with
//! `kill_on_drop`, so a cancelled or expired call does not leave stray processes behind.

use std::io;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::chain::client::{ChainClient, TablePage, TableQuery};
use crate::core::{ManagementActions, RegisterProducer};
use crate::error::{ActionError, SourceError};

/// Default deadline for one `cleos` invocation.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs `cleos` with the given arguments and collects its output.
///
/// Expiry of `timeout` kills the child and returns [`io::ErrorKind::TimedOut`].
async fn run(binary: &str, args: &[String], timeout: Duration) -> io::Result<Output> {
    let output = Command::new(binary).args(args).kill_on_drop(true).output();
    match tokio::time::timeout(timeout, output).await {
        Ok(res) => res,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{binary} did not exit within {timeout:?}"),
        )),
    }
}

fn stderr_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).trim().to_string()
}

/// Reads tables through `cleos get table`.
#[derive(Clone, Debug)]
pub struct CleosChainClient {
    binary: String,
    api: String,
    timeout: Duration,
}

impl CleosChainClient {
    /// Creates a client invoking `binary` against API `api`.
    pub fn new(binary: impl Into<String>, api: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            api: api.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Sets the per-invocation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command line for one table query (without the binary).
    pub fn table_args(&self, q: &TableQuery) -> Vec<String> {
        let mut args = vec![
            "-u".to_string(),
            self.api.clone(),
            "get".to_string(),
            "table".to_string(),
            q.code.clone(),
            q.scope.clone(),
            q.table.clone(),
            "--key-type".to_string(),
            q.key_type.clone(),
        ];
        if let Some(lower) = &q.lower_bound {
            args.push("--lower".to_string());
            args.push(lower.clone());
        }
        if let Some(upper) = &q.upper_bound {
            args.push("--upper".to_string());
            args.push(upper.clone());
        }
        args.push("--limit".to_string());
        args.push(q.limit.to_string());
        args
    }
}

#[async_trait]
impl ChainClient for CleosChainClient {
    async fn get_table_rows(&self, query: &TableQuery) -> Result<TablePage, SourceError> {
        let out = run(&self.binary, &self.table_args(query), self.timeout)
            .await
            .map_err(|e| SourceError::Command {
                message: e.to_string(),
            })?;
        if !out.status.success() {
            return Err(SourceError::Command {
                message: stderr_of(&out),
            });
        }
        if !out.stderr.is_empty() {
            debug!(stderr = %stderr_of(&out), "cleos get table");
        }
        TablePage::parse(&out.stdout)
    }

    fn name(&self) -> &'static str {
        "cleos"
    }
}

/// Executes remediation actions through `cleos system`.
#[derive(Clone, Debug)]
pub struct CleosManagement {
    binary: String,
    api: String,
    timeout: Duration,
}

impl CleosManagement {
    /// Creates a manager invoking `binary` against API `api`.
    pub fn new(binary: impl Into<String>, api: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            api: api.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Sets the per-invocation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn regproducer_args(&self, req: &RegisterProducer) -> Vec<String> {
        vec![
            "-u".to_string(),
            self.api.clone(),
            "system".to_string(),
            "regproducer".to_string(),
            req.account.clone(),
            req.key.clone(),
            req.url.clone(),
            req.location.to_string(),
            "-j".to_string(),
            "-p".to_string(),
            req.permission.clone(),
        ]
    }

    pub fn unregprod_args(&self, account: &str, permission: &str) -> Vec<String> {
        vec![
            "-u".to_string(),
            self.api.clone(),
            "system".to_string(),
            "unregprod".to_string(),
            account.to_string(),
            "-j".to_string(),
            "-p".to_string(),
            permission.to_string(),
        ]
    }

    async fn execute(&self, action: &'static str, args: Vec<String>) -> Result<(), ActionError> {
        let out = run(&self.binary, &args, self.timeout)
            .await
            .map_err(|source| match source.kind() {
                io::ErrorKind::TimedOut => ActionError::TimedOut {
                    action,
                    after: self.timeout,
                },
                _ => ActionError::Spawn { action, source },
            })?;
        if !out.status.success() {
            return Err(ActionError::Rejected {
                action,
                message: stderr_of(&out),
            });
        }
        info!(action, "management action pushed");
        Ok(())
    }
}

#[async_trait]
impl ManagementActions for CleosManagement {
    async fn register_producer(&self, req: &RegisterProducer) -> Result<(), ActionError> {
        self.execute("regproducer", self.regproducer_args(req)).await
    }

    async fn unregister_producer(&self, account: &str, permission: &str) -> Result<(), ActionError> {
        self.execute("unregprod", self.unregprod_args(account, permission))
            .await
    }
}

//! Error types used by the bpwatch runtime, its data sources and its sinks.
//!
//! - [`RuntimeError`] errors raised by the supervisor itself.
//! - [`TaskError`] how a supervised task (scheduler, consumer) ended.
//! - [`SourceError`] failures reaching or reading the chain.
//! - [`ActionError`] failures of remediation commands.
//! - [`SinkError`] failures posting notifications.
//! - [`ConfigError`] failures loading or validating settings.
//!
//! Every enum provides `as_label` (stable snake_case, for log fields).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the supervisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some tasks remained stuck and were aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of tasks that did not shut down in time.
        stuck: Vec<String>,
    },

    /// A supervised task ended with a fatal error and brought the runtime down.
    #[error("task {task} failed: {error}")]
    TaskFailed {
        /// Name of the failed task.
        task: String,
        /// The task's error.
        error: TaskError,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use bpwatch::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::TaskFailed { .. } => "runtime_task_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck tasks={stuck:?}")
            }
            RuntimeError::TaskFailed { task, error } => {
                format!("task={task} {}", error.as_message())
            }
        }
    }
}

/// # How a supervised task ended.
///
/// Tasks return `Ok(())` when they finish on their own (the scheduler does this after
/// deregistration) and `Err(TaskError::Canceled)` when they observed the runtime token.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Non-recoverable error; the supervisor shuts everything down.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Task was cancelled due to runtime shutdown.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use bpwatch::TaskError;
    ///
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fatal { error } => format!("fatal: {error}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }

    /// True when the task stopped because the runtime token was cancelled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// # Failures reaching or reading the chain.
///
/// All variants are transient from the scheduler's point of view: the round is
/// skipped and the next interval polls again.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SourceError {
    /// HTTP transport failure.
    #[error("chain request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The `cleos` subprocess could not be spawned, missed its deadline or exited
    /// unsuccessfully.
    #[error("cleos failed: {message}")]
    Command {
        /// stderr output or spawn error.
        message: String,
    },

    /// The response body was not the expected JSON shape.
    #[error("malformed chain response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The chain answered with a well-formed `{ "error": ... }` payload.
    #[error("chain returned error: {message}")]
    Logical {
        /// Serialized error payload.
        message: String,
    },

    /// The roster fetch stopped at the page cap while the chain still reported more rows.
    #[error("pagination stopped after {pages} pages with more rows pending")]
    PaginationLimitExceeded {
        /// Number of pages fetched.
        pages: usize,
    },
}

impl SourceError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SourceError::Http(_) => "source_http",
            SourceError::Command { .. } => "source_command",
            SourceError::Parse(_) => "source_parse",
            SourceError::Logical { .. } => "source_logical",
            SourceError::PaginationLimitExceeded { .. } => "source_pagination_limit",
        }
    }
}

/// # Failures of remediation commands.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ActionError {
    /// The management command could not be started.
    #[error("failed to spawn {action}: {source}")]
    Spawn {
        /// Action name (`regproducer`, `unregprod`).
        action: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The management command did not exit before its deadline and was killed.
    #[error("{action} timed out after {after:?}")]
    TimedOut {
        /// Action name (`regproducer`, `unregprod`).
        action: &'static str,
        /// The deadline that expired.
        after: Duration,
    },

    /// The management command ran but reported failure.
    #[error("{action} rejected: {message}")]
    Rejected {
        /// Action name (`regproducer`, `unregprod`).
        action: &'static str,
        /// stderr output.
        message: String,
    },
}

impl ActionError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ActionError::Spawn { .. } => "action_spawn",
            ActionError::TimedOut { .. } => "action_timeout",
            ActionError::Rejected { .. } => "action_rejected",
        }
    }
}

/// # Failures posting notifications.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SinkError {
    /// HTTP transport failure.
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API accepted the request but refused it.
    #[error("notification rejected: {description}")]
    Rejected {
        /// Description returned by the remote API.
        description: String,
    },
}

impl SinkError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SinkError::Http(_) => "sink_http",
            SinkError::Rejected { .. } => "sink_rejected",
        }
    }
}

/// # Failures loading settings.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`Settings`](crate::Settings).
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value the runtime cannot work with.
    #[error("invalid config: {field} {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "config_io",
            ConfigError::Parse(_) => "config_parse",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}

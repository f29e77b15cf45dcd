//! # Process configuration.
//!
//! [`Settings`] is loaded from a JSON file by the binary and handed to the core as a
//! plain structure. Every field has a default, so a minimal file only names what differs:
//!
//! ```json
//! {
//!   "api_endpoint": "http://127.0.0.1:8888",
//!   "check_list": ["producer1a", "producer1b"],
//!   "telegram": { "bot_token": "123:abc", "channel_id": "-1001234" }
//! }
//! ```
//!
//! ## Sentinel values
//! - `check_list = []` → watch every active producer
//! - `telegram`, `http_post`, `managed_account` absent → that feature is off
//!
//! Prefer the accessor methods (`poll_interval()`, `grace()`, ...) over reading the raw
//! `*_secs` fields so unit conversions stay in one place.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Which chain transport the producer source talks through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// `POST /v1/chain/get_table_rows` over HTTP.
    #[default]
    Http,
    /// The `cleos` command line client.
    Cleos,
}

/// How the scheduler discovers which producers to check each round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    /// Page through the whole `producers` table each round.
    #[default]
    Roster,
    /// Read the `schedulemetr` table and query each scheduled producer concurrently.
    Schedule,
}

/// Top-level settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Chain API base URL (also passed to `cleos -u`).
    pub api_endpoint: String,
    /// Chain transport.
    pub transport: Transport,
    /// Path to the `cleos` binary.
    pub cleos_path: String,
    /// Producer discovery mode.
    pub mode: PollMode,
    /// Seconds between poll rounds.
    pub poll_interval_secs: u64,
    /// Seconds between schedule refreshes (schedule mode only).
    pub schedule_interval_secs: u64,
    /// Producers to watch; empty watches all.
    pub check_list: BTreeSet<String>,
    /// Rows requested per page.
    pub page_limit: u32,
    /// Hard cap on pages fetched per roster poll.
    pub max_pages: usize,
    /// Seconds to wait for tasks to stop on shutdown.
    pub grace_secs: u64,
    /// Deadline in seconds for one chain request or `cleos` invocation.
    pub request_timeout_secs: u64,
    /// Enables the stream log consumer.
    pub stream_log: bool,
    /// Telegram chat poster.
    pub telegram: Option<TelegramSettings>,
    /// Generic HTTP poster.
    pub http_post: Option<HttpPostSettings>,
    /// Remediation for one managed producer account.
    pub managed_account: Option<ManagedAccount>,
}

impl Settings {
    /// Reads and validates settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parses and validates settings from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api_endpoint",
                reason: "must not be empty",
            });
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_secs",
                reason: "must be positive",
            });
        }
        if self.mode == PollMode::Schedule && self.schedule_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "schedule_interval_secs",
                reason: "must be positive",
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be positive",
            });
        }
        if self.page_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "page_limit",
                reason: "must be positive",
            });
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid {
                field: "max_pages",
                reason: "must be positive",
            });
        }
        if let Some(tg) = &self.telegram {
            if tg.batch_size == 0 {
                return Err(ConfigError::Invalid {
                    field: "telegram.batch_size",
                    reason: "must be positive",
                });
            }
            if tg.interval_secs == 0 {
                return Err(ConfigError::Invalid {
                    field: "telegram.interval_secs",
                    reason: "must be positive",
                });
            }
        }
        if let Some(m) = &self.managed_account {
            if m.account.is_empty() {
                return Err(ConfigError::Invalid {
                    field: "managed_account.account",
                    reason: "must not be empty",
                });
            }
        }
        Ok(())
    }

    /// Interval between poll rounds.
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Interval between schedule refreshes.
    #[inline]
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs)
    }

    /// Shutdown grace period.
    #[inline]
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    /// Deadline for one chain request or `cleos` invocation.
    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Settings {
    /// Defaults:
    ///
    /// - `api_endpoint = http://127.0.0.1:8888`, HTTP transport, roster mode
    /// - `poll_interval = 126s` (one full rotation of 21 producers at 6s each)
    /// - `schedule_interval = 600s`
    /// - `page_limit = 1000`, `max_pages = 10`
    /// - `grace = 10s`, `request_timeout = 30s`
    /// - stream log on, every notifier and remediation off
    fn default() -> Self {
        Self {
            api_endpoint: "http://127.0.0.1:8888".to_string(),
            transport: Transport::default(),
            cleos_path: "cleos".to_string(),
            mode: PollMode::default(),
            poll_interval_secs: 126,
            schedule_interval_secs: 600,
            check_list: BTreeSet::new(),
            page_limit: 1000,
            max_pages: 10,
            grace_secs: 10,
            request_timeout_secs: 30,
            stream_log: true,
            telegram: None,
            http_post: None,
            managed_account: None,
        }
    }
}

/// Batched Telegram poster.
#[derive(Clone, Debug, Deserialize)]
pub struct TelegramSettings {
    /// Bot token issued by BotFather.
    pub bot_token: String,
    /// Target chat or channel id.
    pub channel_id: String,
    /// Maximum events per message.
    #[serde(default = "TelegramSettings::default_batch_size")]
    pub batch_size: usize,
    /// Seconds between drain cycles.
    #[serde(default = "TelegramSettings::default_interval_secs")]
    pub interval_secs: u64,
    /// Post a "Started." line once on startup.
    #[serde(default = "TelegramSettings::default_announce_start")]
    pub announce_start: bool,
    /// Bot API base URL.
    #[serde(default = "TelegramSettings::default_api_base")]
    pub api_base: String,
}

impl TelegramSettings {
    fn default_batch_size() -> usize {
        21
    }

    fn default_interval_secs() -> u64 {
        1
    }

    fn default_announce_start() -> bool {
        true
    }

    fn default_api_base() -> String {
        "https://api.telegram.org".to_string()
    }

    /// Interval between drain cycles.
    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Generic per-event HTTP poster.
#[derive(Clone, Debug, Deserialize)]
pub struct HttpPostSettings {
    /// Endpoint receiving one JSON event per request.
    pub url: String,
    /// Milliseconds to pause between posts.
    #[serde(default = "HttpPostSettings::default_interval_ms")]
    pub interval_ms: u64,
}

impl HttpPostSettings {
    fn default_interval_ms() -> u64 {
        10
    }

    /// Pause between posts.
    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// The one producer account remediation acts on.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ManagedAccount {
    /// Producer account name.
    pub account: String,
    /// Re-register with a backup key.
    pub failover: FailoverSettings,
    /// Deregister the producer.
    pub unregister: UnregisterSettings,
}

/// Failover action settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FailoverSettings {
    /// Whether the action may fire.
    pub enabled: bool,
    /// Fires when the missed count goes strictly above this.
    pub threshold: u64,
    /// Backup producer public key.
    pub key: String,
    /// Producer URL.
    pub url: String,
    /// Producer location code.
    pub location: u16,
    /// Signing permission, e.g. `producer@active`.
    pub permission: String,
}

impl Default for FailoverSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 240,
            key: String::new(),
            url: String::new(),
            location: 0,
            permission: String::new(),
        }
    }
}

/// Deregistration action settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct UnregisterSettings {
    /// Whether the action may fire.
    pub enabled: bool,
    /// Fires when the missed count goes strictly above this.
    pub threshold: u64,
    /// Signing permission, e.g. `producer@active`.
    pub permission: String,
}

impl Default for UnregisterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 240,
            permission: String::new(),
        }
    }
}

//! Root configuration model.
//!
//! Every field has a default so a missing or partial `config.toml` still
//! yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Where session lists for kinds with a backend store are persisted.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStoreKind {
    /// Backend Session API where available, local files for the other kinds.
    #[default]
    Remote,
    /// Local JSON files for every kind.
    Local,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HollywoolConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Cadence for refreshing individually tracked jobs.
    pub job_poll_interval_ms: u64,
    /// Cadence for the list-wide "active jobs" refresh.
    pub list_poll_interval_ms: u64,
    /// How long a completed job stays in the live map.
    pub completed_grace_secs: u64,
    /// How long a failed or cancelled job stays in the live map.
    pub failed_grace_secs: u64,
    pub done_feed_limit: usize,
    pub session_store: SessionStoreKind,
    /// Overrides the platform data directory for local stores and logs.
    pub data_dir: Option<PathBuf>,
    pub log_filter: Option<String>,
    pub log_to_file: bool,
}

impl Default for HollywoolConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
            job_poll_interval_ms: 1_000,
            list_poll_interval_ms: 2_000,
            completed_grace_secs: 3,
            failed_grace_secs: 30,
            done_feed_limit: 5,
            session_store: SessionStoreKind::default(),
            data_dir: None,
            log_filter: None,
            log_to_file: false,
        }
    }
}

impl HollywoolConfig {
    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_millis(self.job_poll_interval_ms.max(1))
    }

    pub fn list_poll_interval(&self) -> Duration {
        Duration::from_millis(self.list_poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            job_interval: self.job_poll_interval(),
            list_interval: self.list_poll_interval(),
            completed_grace: Duration::from_secs(self.completed_grace_secs),
            failed_grace: Duration::from_secs(self.failed_grace_secs),
        }
    }
}

/// Timing knobs for a single job poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub job_interval: Duration,
    pub list_interval: Duration,
    pub completed_grace: Duration,
    pub failed_grace: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        HollywoolConfig::default().poller_settings()
    }
}

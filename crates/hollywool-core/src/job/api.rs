//! Job API port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::model::Job;
use super::request::{CreatedJob, JobRequest};
use super::status::JobKind;
use crate::error::{HollywoolError, Result};

/// Query parameters accepted by the list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

impl JobFilter {
    pub fn active() -> Self {
        Self {
            session_id: None,
            active_only: true,
        }
    }

    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            active_only: false,
        }
    }

    /// Applies the filter client-side, for backends that ignore it.
    pub fn matches(&self, job: &Job) -> bool {
        if self.active_only && job.is_terminal() {
            return false;
        }
        match &self.session_id {
            Some(session_id) => job.session_id() == Some(session_id.as_str()),
            None => true,
        }
    }
}

/// Remote job endpoints for a single [`JobKind`].
#[async_trait]
pub trait JobApi: Send + Sync {
    fn kind(&self) -> JobKind;

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    async fn get_job(&self, id: &str) -> Result<Job>;

    async fn create_job(&self, request: &JobRequest) -> Result<CreatedJob>;

    /// Cancels (or deletes) a job. Only some kinds support it.
    async fn cancel_job(&self, id: &str) -> Result<()> {
        Err(HollywoolError::unsupported(format!(
            "cancelling {} job '{}'",
            self.kind(),
            id
        )))
    }
}

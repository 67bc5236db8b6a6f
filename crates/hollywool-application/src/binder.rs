//! Binds completed jobs into their owning sessions.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use hollywool_core::error::Result;
use hollywool_core::job::{Job, JobStatus};
use hollywool_core::session::{SessionKind, TitleGenerator, fallback_title};

use crate::job::JobUpdate;
use crate::scheduler::ScheduledTask;
use crate::session::SessionManager;

/// Why a completed job could not be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanReason {
    /// The job carries no `session_id`.
    NoSession,
    /// The job's kind has no sessions (downloads), or no manager is registered.
    NoSessionKind,
    /// The session was deleted before the job completed.
    SessionDeleted,
}

/// Result of [`SessionJobBinder::bind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    Bound {
        session_id: String,
        result_id: String,
        /// Set when this was the session's first result and a title was applied.
        renamed_to: Option<String>,
    },
    AlreadyBound {
        session_id: String,
        result_id: String,
    },
    Orphaned(OrphanReason),
    NotCompleted,
}

/// The only writer crossing from jobs to sessions.
///
/// Binding is idempotent: the same completed job observed any number of times
/// appends its result id once and titles the session at most once.
pub struct SessionJobBinder {
    managers: HashMap<SessionKind, Arc<SessionManager>>,
    titles: Arc<dyn TitleGenerator>,
}

impl SessionJobBinder {
    pub fn new(titles: Arc<dyn TitleGenerator>) -> Self {
        Self {
            managers: HashMap::new(),
            titles,
        }
    }

    /// Registers the manager for its kind, replacing any earlier one.
    pub fn with_manager(mut self, manager: Arc<SessionManager>) -> Self {
        self.managers.insert(manager.kind(), manager);
        self
    }

    pub fn manager(&self, kind: SessionKind) -> Option<&Arc<SessionManager>> {
        self.managers.get(&kind)
    }

    pub async fn bind(&self, job: &Job) -> Result<BindOutcome> {
        if *job.status() != JobStatus::Completed {
            return Ok(BindOutcome::NotCompleted);
        }
        let Some(session_id) = job.session_id() else {
            return Ok(BindOutcome::Orphaned(OrphanReason::NoSession));
        };
        let (Some(manager), Some(result_id)) = (
            job.kind().session_kind().and_then(|kind| self.managers.get(&kind)),
            job.result_id(),
        ) else {
            return Ok(BindOutcome::Orphaned(OrphanReason::NoSessionKind));
        };

        let outcome = match manager.attach_result(session_id, &result_id, job.preview()).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_not_found() => {
                tracing::info!(
                    "[SessionJobBinder] Job {} completed for deleted session {}, ignoring",
                    job.id(),
                    session_id
                );
                return Ok(BindOutcome::Orphaned(OrphanReason::SessionDeleted));
            }
            Err(e) => return Err(e),
        };

        if !outcome.appended {
            return Ok(BindOutcome::AlreadyBound {
                session_id: session_id.to_string(),
                result_id,
            });
        }

        let mut renamed_to = None;
        if let (true, Some(prompt)) = (outcome.first_result, job.prompt()) {
            let title = self.title_for(prompt).await;
            match manager.auto_rename_session(session_id, &title).await {
                Ok(true) => renamed_to = Some(title),
                Ok(false) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "[SessionJobBinder] Bound {} result {} to session {}",
            job.kind(),
            result_id,
            session_id
        );
        Ok(BindOutcome::Bound {
            session_id: session_id.to_string(),
            result_id,
            renamed_to,
        })
    }

    /// Generated title for `prompt`, or the deterministic fallback when the
    /// generator fails or returns nothing usable.
    async fn title_for(&self, prompt: &str) -> String {
        match self.titles.generate_title(prompt).await {
            Ok(title) if !title.trim().is_empty() => title.trim().to_string(),
            Ok(_) => fallback_title(prompt),
            Err(e) => {
                tracing::warn!("[SessionJobBinder] Title generation failed, using fallback: {}", e);
                fallback_title(prompt)
            }
        }
    }

    /// Binds every completion seen on `updates` until the channel closes or
    /// the returned task is dropped.
    pub fn run(self: &Arc<Self>, name: impl Into<String>, mut updates: broadcast::Receiver<JobUpdate>) -> ScheduledTask {
        let binder = Arc::clone(self);
        ScheduledTask::spawn(name, async move {
            loop {
                match updates.recv().await {
                    Ok(update) if update.is_completion() => {
                        if let Err(e) = binder.bind(&update.job).await {
                            tracing::warn!("[SessionJobBinder] Failed to bind job {}: {}", update.job.id(), e);
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("[SessionJobBinder] Missed {} job updates", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "binder_test.rs"]
mod tests;

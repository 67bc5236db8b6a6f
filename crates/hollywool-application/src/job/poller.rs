//! Live job map for one job kind, refreshed by polling.
//!
//! Two kinds of [`ScheduledTask`] feed the map: one per tracked job
//! (`get_job`, stops once the job is terminal) and one list-wide task
//! (`list_jobs(active_only)`) that discovers jobs started elsewhere and evicts
//! terminal jobs whose grace period is over.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{RwLock, broadcast};

use hollywool_core::clock::Clock;
use hollywool_core::config::PollerSettings;
use hollywool_core::error::Result;
use hollywool_core::job::{
    FetchStamp, Job, JobApi, JobFilter, JobKind, JobRequest, JobStatus, StampSource, Stamped, merge,
};

use crate::scheduler::{ScheduledTask, TaskControl};

const UPDATE_CHANNEL_CAPACITY: usize = 256;
const GONE_ERROR: &str = "Job no longer exists on the backend";

/// A change applied to the live map.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub job: Job,
    /// `None` when the job was not in the live map before.
    pub previous_status: Option<JobStatus>,
}

impl JobUpdate {
    /// True for the update that moved the job into `completed`.
    pub fn is_completion(&self) -> bool {
        *self.job.status() == JobStatus::Completed && self.previous_status != Some(JobStatus::Completed)
    }
}

#[derive(Debug, Clone)]
struct LiveEntry {
    job: Job,
    stamp: FetchStamp,
    /// Local observation time of the terminal status.
    terminal_since: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct LiveState {
    entries: HashMap<String, LiveEntry>,
    tracked: HashSet<String>,
    /// Explicitly dropped ids; list refreshes do not rediscover them. Pruned
    /// once the backend stops listing them.
    dismissed: HashSet<String>,
}

struct PollerInner {
    api: Arc<dyn JobApi>,
    clock: Arc<dyn Clock>,
    settings: PollerSettings,
    stamps: StampSource,
    state: RwLock<LiveState>,
    updates: broadcast::Sender<JobUpdate>,
    job_tasks: StdMutex<HashMap<String, ScheduledTask>>,
}

/// Owns the live job map of one [`JobKind`].
pub struct JobPoller {
    inner: Arc<PollerInner>,
    list_task: StdMutex<Option<ScheduledTask>>,
}

impl JobPoller {
    pub fn new(api: Arc<dyn JobApi>, clock: Arc<dyn Clock>, settings: PollerSettings) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(PollerInner {
                api,
                clock,
                settings,
                stamps: StampSource::new(),
                state: RwLock::new(LiveState::default()),
                updates,
                job_tasks: StdMutex::new(HashMap::new()),
            }),
            list_task: StdMutex::new(None),
        }
    }

    pub fn kind(&self) -> JobKind {
        self.inner.api.kind()
    }

    /// Receives every change applied to the live map.
    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.inner.updates.subscribe()
    }

    /// Starts the list-wide refresh. Idempotent.
    pub fn start(&self) {
        let mut guard = self.list_task.lock().unwrap_or_else(|e| e.into_inner());
        if guard.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let name = format!("{}-job-list", self.kind());
        *guard = Some(ScheduledTask::every(name, self.inner.settings.list_interval, move || {
            let inner = Arc::clone(&inner);
            async move {
                if let Err(e) = PollerInner::refresh_list(&inner).await {
                    tracing::warn!("[JobPoller] {} list refresh failed: {}", inner.api.kind(), e);
                }
                PollerInner::evict_expired(&inner).await;
                TaskControl::Continue
            }
        }));
        tracing::info!("[JobPoller] Started {} poller", self.kind());
    }

    /// Adds a job to the live set and starts refreshing it.
    pub async fn start_tracking(&self, job_id: &str) {
        PollerInner::track(&self.inner, job_id).await;
    }

    /// Removes a job from the live map and stops refreshing it. In-flight
    /// responses for it are dropped.
    pub async fn stop_tracking(&self, job_id: &str) {
        {
            let mut state = self.inner.state.write().await;
            state.tracked.remove(job_id);
            state.entries.remove(job_id);
            state.dismissed.insert(job_id.to_string());
        }
        self.inner.cancel_job_task(job_id);
    }

    /// Creates a job, shows an optimistic `queued` placeholder for it, and
    /// starts tracking it.
    pub async fn submit(&self, request: &JobRequest) -> Result<Job> {
        let stamp = self.inner.stamps.issue();
        let created = self.inner.api.create_job(request).await?;
        let placeholder = request.placeholder(&created.job_id, self.inner.clock.now());
        {
            let mut state = self.inner.state.write().await;
            state.tracked.insert(created.job_id.clone());
            self.inner.apply_locked(&mut state, placeholder.clone(), stamp);
        }
        PollerInner::spawn_job_task(&self.inner, &created.job_id);
        tracing::info!("[JobPoller] Submitted {} job {}", self.kind(), created.job_id);
        Ok(placeholder)
    }

    /// Cancels a job on the backend; the next refresh picks up the result.
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        self.inner.api.cancel_job(job_id).await
    }

    /// Fetches one tracked job now. Returns the control the periodic task
    /// would act on.
    pub async fn poll_job_once(&self, job_id: &str) -> TaskControl {
        PollerInner::refresh_job(&self.inner, job_id).await
    }

    /// Runs one list-wide refresh now.
    pub async fn poll_list_once(&self) -> Result<()> {
        PollerInner::refresh_list(&self.inner).await
    }

    /// Evicts terminal jobs whose grace period is over. Returns their ids.
    pub async fn evict_expired(&self) -> Vec<String> {
        PollerInner::evict_expired(&self.inner).await
    }

    pub async fn job(&self, job_id: &str) -> Option<Job> {
        self.inner.state.read().await.entries.get(job_id).map(|e| e.job.clone())
    }

    /// Live jobs, newest first.
    pub async fn snapshot(&self) -> Vec<Job> {
        let state = self.inner.state.read().await;
        let mut jobs: Vec<Job> = state.entries.values().map(|e| e.job.clone()).collect();
        jobs.sort_by(|a, b| b.core().created_at.cmp(&a.core().created_at));
        jobs
    }

    pub async fn is_tracked(&self, job_id: &str) -> bool {
        self.inner.state.read().await.tracked.contains(job_id)
    }

    /// Number of per-job tasks still running.
    pub fn active_task_count(&self) -> usize {
        let tasks = self.inner.job_tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.values().filter(|task| !task.is_finished()).count()
    }

    /// Cancels every task this poller started.
    pub fn shutdown(&self) {
        if let Some(mut task) = self.list_task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            task.cancel();
        }
        let tasks: Vec<ScheduledTask> = {
            let mut tasks = self.inner.job_tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain().map(|(_, task)| task).collect()
        };
        let count = tasks.len();
        drop(tasks);
        tracing::debug!("[JobPoller] {} poller shut down ({} job tasks)", self.kind(), count);
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl PollerInner {
    async fn track(inner: &Arc<Self>, job_id: &str) {
        {
            let mut state = inner.state.write().await;
            state.dismissed.remove(job_id);
            if !state.tracked.insert(job_id.to_string()) {
                return;
            }
        }
        Self::spawn_job_task(inner, job_id);
    }

    fn spawn_job_task(inner: &Arc<Self>, job_id: &str) {
        let mut tasks = inner.job_tasks.lock().unwrap_or_else(|e| e.into_inner());
        if tasks.get(job_id).is_some_and(|task| !task.is_finished()) {
            return;
        }
        let task_inner = Arc::clone(inner);
        let id = job_id.to_string();
        let task = ScheduledTask::every(
            format!("{}-job-{}", inner.api.kind(), job_id),
            inner.settings.job_interval,
            move || {
                let inner = Arc::clone(&task_inner);
                let id = id.clone();
                async move { Self::refresh_job(&inner, &id).await }
            },
        );
        tasks.insert(job_id.to_string(), task);
    }

    fn cancel_job_task(&self, job_id: &str) {
        let task = self
            .job_tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(job_id);
        drop(task);
    }

    async fn refresh_job(inner: &Arc<Self>, job_id: &str) -> TaskControl {
        let stamp = inner.stamps.issue();
        let fetched = inner.api.get_job(job_id).await;

        let mut state = inner.state.write().await;
        if !state.tracked.contains(job_id) {
            return TaskControl::Stop;
        }
        match fetched {
            Ok(job) => {
                inner.apply_locked(&mut state, job, stamp);
            }
            Err(e) if e.is_not_found() => {
                // Deleted server-side, e.g. a cancelled bulk job. It fails
                // locally so it leaves through the failed grace period.
                tracing::info!("[JobPoller] {} job {} no longer exists on the backend", inner.api.kind(), job_id);
                let Some(mut job) = state.entries.get(job_id).map(|entry| entry.job.clone()) else {
                    state.tracked.remove(job_id);
                    drop(state);
                    inner.cancel_job_task(job_id);
                    return TaskControl::Stop;
                };
                if !job.is_terminal() {
                    let core = job.core_mut();
                    core.status = JobStatus::Failed;
                    core.error = Some(GONE_ERROR.to_string());
                    inner.apply_locked(&mut state, job, stamp);
                }
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    "[JobPoller] Failed to refresh {} job {}, keeping last snapshot: {}",
                    inner.api.kind(),
                    job_id,
                    e
                );
            }
            Err(e) => {
                tracing::warn!("[JobPoller] Unexpected error refreshing {} job {}: {}", inner.api.kind(), job_id, e);
            }
        }
        match state.entries.get(job_id) {
            Some(entry) if entry.job.is_terminal() => TaskControl::Stop,
            _ => TaskControl::Continue,
        }
    }

    async fn refresh_list(inner: &Arc<Self>) -> Result<()> {
        let stamp = inner.stamps.issue();
        let remote = inner.api.list_jobs(&JobFilter::active()).await?;

        let discovered = {
            let mut state = inner.state.write().await;
            // A dismissed id only needs remembering while the backend still lists it.
            {
                let listed: HashSet<&str> = remote.iter().map(Job::id).collect();
                state.dismissed.retain(|id| listed.contains(id.as_str()));
            }

            let local: Vec<Stamped<Job>> = state
                .entries
                .values()
                .filter(|entry| !entry.job.is_terminal())
                .map(|entry| Stamped::new(entry.job.clone(), entry.stamp))
                .collect();
            let remote: Vec<Stamped<Job>> = remote
                .into_iter()
                .filter(|job| !state.dismissed.contains(job.id()))
                .map(|job| Stamped::new(job, stamp))
                .collect();

            let merged = merge(local, remote, |job: &Job| job.id().to_string(), Job::is_terminal);

            let mut discovered = Vec::new();
            for entry in merged {
                let id = entry.value.id().to_string();
                if state.tracked.insert(id.clone()) {
                    discovered.push(id);
                }
                inner.apply_locked(&mut state, entry.value, entry.stamp);
            }
            discovered
        };

        for id in &discovered {
            tracing::debug!("[JobPoller] Discovered {} job {}", inner.api.kind(), id);
            Self::spawn_job_task(inner, id);
        }
        Ok(())
    }

    /// Applies one snapshot under the caller's write lock.
    ///
    /// Drops responses older than what is already applied, and never changes
    /// a job that is already terminal. Returns whether the map changed.
    fn apply_locked(&self, state: &mut LiveState, job: Job, stamp: FetchStamp) -> bool {
        let now = self.clock.now();
        let mut job = job.normalized(now);
        let id = job.id().to_string();

        let previous = state.entries.get(&id);
        if let Some(previous) = previous {
            if stamp < previous.stamp {
                tracing::debug!("[JobPoller] Dropping stale response for job {}", id);
                return false;
            }
            if previous.job.is_terminal() {
                return false;
            }
            if !job.is_terminal() {
                let floor = previous.job.progress();
                let core = job.core_mut();
                core.progress = core.progress.max(floor);
            }
            if previous.job == job {
                return false;
            }
        }

        let previous_status = previous.map(|p| p.job.status().clone());
        let terminal_since = job.is_terminal().then_some(now);
        state.entries.insert(
            id,
            LiveEntry {
                job: job.clone(),
                stamp,
                terminal_since,
            },
        );
        // No receivers is fine.
        let _ = self.updates.send(JobUpdate { job, previous_status });
        true
    }

    async fn evict_expired(inner: &Arc<Self>) -> Vec<String> {
        let now = inner.clock.now();
        let evicted: Vec<String> = {
            let mut state = inner.state.write().await;
            let expired: Vec<String> = state
                .entries
                .iter()
                .filter(|(_, entry)| inner.is_expired(entry, now))
                .map(|(id, _)| id.clone())
                .collect();
            for id in &expired {
                state.entries.remove(id);
                state.tracked.remove(id);
            }
            expired
        };
        for id in &evicted {
            inner.cancel_job_task(id);
            tracing::debug!("[JobPoller] Evicted {} job {}", inner.api.kind(), id);
        }
        inner
            .job_tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, task| !task.is_finished());
        evicted
    }

    fn is_expired(&self, entry: &LiveEntry, now: DateTime<Utc>) -> bool {
        let Some(since) = entry.terminal_since else {
            return false;
        };
        let grace = match entry.job.status() {
            JobStatus::Completed => self.settings.completed_grace,
            _ => self.settings.failed_grace,
        };
        chrono::Duration::from_std(grace)
            .ok()
            .and_then(|grace| since.checked_add_signed(grace))
            .is_some_and(|deadline| now >= deadline)
    }
}

#[cfg(test)]
#[path = "poller_test.rs"]
mod tests;

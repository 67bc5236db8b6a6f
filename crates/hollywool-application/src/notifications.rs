//! Cross-kind activity feed.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;

use hollywool_core::clock::Clock;
use hollywool_core::job::{Job, JobApi, JobFilter, JobKind, JobStatus, display_progress};

pub const DEFAULT_DONE_LIMIT: usize = 5;

/// One job as shown in the activity feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub kind: JobKind,
    pub id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub status: JobStatus,
    pub progress: f64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_ago: String,
}

impl Activity {
    pub fn from_job(job: &Job, now: DateTime<Utc>) -> Self {
        let core = job.core();
        Self {
            kind: job.kind(),
            id: core.id.clone(),
            title: job.title().to_string(),
            thumbnail: job.preview(),
            status: core.status.clone(),
            progress: display_progress(job),
            error: core.error.clone(),
            created_at: core.created_at,
            completed_at: core.completed_at,
            time_ago: time_ago(core.completed_at.unwrap_or(core.created_at), now),
        }
    }

    fn finished_at(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityFeed {
    /// Non-terminal jobs, newest first.
    pub active: Vec<Activity>,
    /// Terminal jobs, most recently finished first.
    pub done: Vec<Activity>,
}

impl ActivityFeed {
    /// Splits `jobs` into the active and done buckets.
    pub fn from_jobs(jobs: impl IntoIterator<Item = Job>, done_limit: usize, now: DateTime<Utc>) -> Self {
        let (done, active): (Vec<Job>, Vec<Job>) = jobs.into_iter().partition(Job::is_terminal);

        let mut active: Vec<Activity> = active.iter().map(|job| Activity::from_job(job, now)).collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut done: Vec<Activity> = done.iter().map(|job| Activity::from_job(job, now)).collect();
        done.sort_by_key(|activity| std::cmp::Reverse(activity.finished_at()));
        done.truncate(done_limit);

        Self { active, done }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.done.is_empty()
    }
}

/// Fetches every configured kind's jobs and merges them into one feed.
pub struct NotificationAggregator {
    sources: Vec<Arc<dyn JobApi>>,
    clock: Arc<dyn Clock>,
    done_limit: usize,
}

impl NotificationAggregator {
    pub fn new(sources: Vec<Arc<dyn JobApi>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sources,
            clock,
            done_limit: DEFAULT_DONE_LIMIT,
        }
    }

    pub fn with_done_limit(mut self, done_limit: usize) -> Self {
        self.done_limit = done_limit;
        self
    }

    pub fn kinds(&self) -> Vec<JobKind> {
        self.sources.iter().map(|source| source.kind()).collect()
    }

    /// Fetches all kinds concurrently. A kind that fails contributes nothing.
    pub async fn refresh(&self) -> ActivityFeed {
        let filter = JobFilter::default();
        let fetches = self.sources.iter().map(|source| {
            let filter = &filter;
            async move { (source.kind(), source.list_jobs(filter).await) }
        });

        let mut jobs = Vec::new();
        for (kind, fetched) in join_all(fetches).await {
            match fetched {
                Ok(fetched) => jobs.extend(fetched),
                Err(e) => {
                    tracing::warn!("[NotificationAggregator] Failed to fetch {} jobs: {}", kind, e);
                }
            }
        }
        ActivityFeed::from_jobs(jobs, self.done_limit, self.clock.now())
    }
}

/// Relative age of `then`, e.g. `just now`, `42s ago`, `3h ago`.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    match seconds {
        0..=9 => "just now".to_string(),
        10..=59 => format!("{seconds}s ago"),
        60..=3_599 => format!("{}m ago", seconds / 60),
        3_600..=86_399 => format!("{}h ago", seconds / 3_600),
        _ => format!("{}d ago", seconds / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use hollywool_core::clock::ManualClock;
    use hollywool_core::error::{HollywoolError, Result};
    use hollywool_core::job::{BulkItem, BulkJob, CivitaiDownloadJob, CreatedJob, JobCore, JobRequest};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap()
    }

    fn download(id: &str, status: JobStatus, completed_secs_ago: Option<i64>) -> Job {
        let mut core = JobCore::queued(id, None, now() - Duration::hours(1));
        core.status = status;
        core.completed_at = completed_secs_ago.map(|s| now() - Duration::seconds(s));
        Job::CivitaiDownload(CivitaiDownloadJob {
            core,
            civitai_model_id: 1,
            version_id: 2,
            model_name: format!("Model {id}"),
            model_type: "Checkpoint".to_string(),
            filename: format!("{id}.safetensors"),
            download_url: "https://civitai.com/api/download/models/2".to_string(),
            base_model: Some("SDXL 1.0".to_string()),
            file_size_kb: Some(6_500_000.0),
            downloaded_bytes: 0,
            total_bytes: 0,
            speed_bytes_per_sec: 0.0,
            local_path: None,
        })
    }

    fn bulk(id: &str, completed: u32, failed: u32, total: u32) -> Job {
        let mut core = JobCore::queued(id, None, now() - Duration::minutes(5));
        core.status = JobStatus::Generating;
        Job::Bulk(BulkJob {
            core,
            total,
            completed,
            failed,
            items: vec![BulkItem {
                index: 0,
                prompt: "a lantern in fog".to_string(),
                status: JobStatus::Completed,
                image_url: Some("/outputs/bulk/0.png".to_string()),
                asset_id: None,
                seed: None,
                error: None,
            }],
            base_prompt: None,
            fal_model: "flux-dev".to_string(),
            width: 512,
            height: 512,
            steps: None,
        })
    }

    struct StaticApi {
        kind: JobKind,
        jobs: Result<Vec<Job>>,
    }

    #[async_trait::async_trait]
    impl JobApi for StaticApi {
        fn kind(&self) -> JobKind {
            self.kind
        }
        async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
            let jobs = self.jobs.clone()?;
            Ok(jobs.into_iter().filter(|job| filter.matches(job)).collect())
        }
        async fn get_job(&self, id: &str) -> Result<Job> {
            Err(HollywoolError::not_found("Job", id))
        }
        async fn create_job(&self, _request: &JobRequest) -> Result<CreatedJob> {
            Err(HollywoolError::unsupported("static"))
        }
    }

    #[test]
    fn test_time_ago_buckets() {
        assert_eq!(time_ago(now() - Duration::seconds(9), now()), "just now");
        assert_eq!(time_ago(now() - Duration::seconds(10), now()), "10s ago");
        assert_eq!(time_ago(now() - Duration::seconds(125), now()), "2m ago");
        assert_eq!(time_ago(now() - Duration::hours(5), now()), "5h ago");
        assert_eq!(time_ago(now() - Duration::days(3), now()), "3d ago");
        assert_eq!(time_ago(now() + Duration::seconds(30), now()), "just now");
    }

    #[test]
    fn test_cancelled_download_lands_in_done() {
        let feed = ActivityFeed::from_jobs(vec![download("dl-1", JobStatus::Cancelled, Some(20))], 5, now());

        assert!(feed.active.is_empty());
        assert_eq!(feed.done.len(), 1);
        assert_eq!(feed.done[0].title, "Model dl-1");
        assert_eq!(feed.done[0].time_ago, "20s ago");
    }

    #[test]
    fn test_done_is_sorted_and_capped() {
        let jobs = (0..7).map(|i| download(&format!("dl-{i}"), JobStatus::Completed, Some(100 - i * 10)));

        let feed = ActivityFeed::from_jobs(jobs, 5, now());

        let ids: Vec<&str> = feed.done.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["dl-6", "dl-5", "dl-4", "dl-3", "dl-2"]);
    }

    #[test]
    fn test_bulk_activity_uses_aggregate_progress() {
        let feed = ActivityFeed::from_jobs(vec![bulk("b-1", 7, 1, 10)], 5, now());

        let activity = &feed.active[0];
        assert_eq!(activity.progress, 80.0);
        assert_eq!(activity.title, "a lantern in fog");
        assert_eq!(activity.thumbnail.as_deref(), Some("/outputs/bulk/0.png"));
    }

    #[tokio::test]
    async fn test_failing_kind_contributes_nothing() {
        let aggregator = NotificationAggregator::new(
            vec![
                Arc::new(StaticApi {
                    kind: JobKind::Bulk,
                    jobs: Ok(vec![bulk("b-1", 2, 0, 4)]),
                }),
                Arc::new(StaticApi {
                    kind: JobKind::Image,
                    jobs: Err(HollywoolError::transport("connection refused")),
                }),
                Arc::new(StaticApi {
                    kind: JobKind::CivitaiDownload,
                    jobs: Ok(vec![download("dl-1", JobStatus::Cancelled, Some(3))]),
                }),
            ],
            Arc::new(ManualClock::new(now())),
        );

        let feed = aggregator.refresh().await;

        assert_eq!(feed.active.len(), 1);
        assert_eq!(feed.active[0].kind, JobKind::Bulk);
        assert_eq!(feed.done.len(), 1);
        assert_eq!(feed.done[0].kind, JobKind::CivitaiDownload);
    }
}

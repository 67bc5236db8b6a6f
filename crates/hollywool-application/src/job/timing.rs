//! Stage timing memory shared across polls.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use hollywool_core::clock::Clock;
use hollywool_core::job::{DerivedJobView, Job, StageTimeline, derive_view};

/// Keeps one [`StageTimeline`] per job id so each new snapshot can be turned
/// into a [`DerivedJobView`] with live stage timing.
pub struct StageTimingCache {
    clock: Arc<dyn Clock>,
    timelines: RwLock<HashMap<String, StageTimeline>>,
}

impl StageTimingCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            timelines: RwLock::new(HashMap::new()),
        }
    }

    /// Derives the view for `job` and remembers its timeline.
    pub async fn observe(&self, job: &Job) -> DerivedJobView {
        let mut timelines = self.timelines.write().await;
        let (view, timeline) = derive_view(timelines.get(job.id()), job, self.clock.now());
        timelines.insert(job.id().to_string(), timeline);
        view
    }

    pub async fn timeline(&self, job_id: &str) -> Option<StageTimeline> {
        self.timelines.read().await.get(job_id).cloned()
    }

    pub async fn forget(&self, job_id: &str) {
        self.timelines.write().await.remove(job_id);
    }

    /// Drops timelines of jobs for which `keep` is false.
    pub async fn retain<F>(&self, keep: F)
    where
        F: Fn(&str) -> bool,
    {
        self.timelines.write().await.retain(|id, _| keep(id));
    }

    pub async fn len(&self) -> usize {
        self.timelines.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use hollywool_core::clock::ManualClock;
    use hollywool_core::job::{HfDownloadJob, JobCore, JobStatus, Stage};

    fn download(status: JobStatus, progress: f64) -> Job {
        let mut core = JobCore::queued("hf-1", None, Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap());
        core.status = status;
        core.progress = progress;
        Job::HuggingfaceDownload(HfDownloadJob {
            core,
            model_id: "flux-dev".to_string(),
            model_name: "FLUX.1 dev".to_string(),
            model_path: "black-forest-labs/FLUX.1-dev".to_string(),
            total_size_mb: 23_800.0,
            speed_mbps: 0.0,
        })
    }

    #[tokio::test]
    async fn test_timeline_survives_between_observations() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 5).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let cache = StageTimingCache::new(clock.clone());

        cache.observe(&download(JobStatus::Queued, 0.0)).await;
        clock.advance(Duration::seconds(2));
        let view = cache.observe(&download(JobStatus::Downloading, 12.0)).await;

        assert_eq!(view.display_progress, 12.0);
        let timeline = cache.timeline("hf-1").await.unwrap();
        assert_eq!(
            timeline.span(Stage::Downloading).unwrap().started_at,
            start + Duration::seconds(2)
        );
    }

    #[tokio::test]
    async fn test_retain_forgets_evicted_jobs() {
        let cache = StageTimingCache::new(Arc::new(ManualClock::new(Utc::now())));
        cache.observe(&download(JobStatus::Queued, 0.0)).await;
        assert_eq!(cache.len().await, 1);

        cache.retain(|id| id != "hf-1").await;

        assert_eq!(cache.len().await, 0);
    }
}

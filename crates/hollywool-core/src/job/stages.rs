//! Job stage state machine.
//!
//! Turns a raw job snapshot into an ordered list of stages with timing and a
//! single display progress. [`derive_view`] is pure: callers keep the returned
//! [`StageTimeline`] and hand it back on the next observation of the same job.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::model::{Job, clamp_progress};
use super::status::{JobKind, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Downloading,
    LoadingModel,
    Generating,
    Saving,
    Completed,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Downloading => "Downloading model",
            Self::LoadingModel => "Loading model",
            Self::Generating => "Generating",
            Self::Saving => "Saving",
            Self::Completed => "Completed",
        }
    }

    fn from_status(status: &JobStatus) -> Option<Self> {
        match status {
            JobStatus::Queued => Some(Self::Queued),
            JobStatus::Downloading => Some(Self::Downloading),
            JobStatus::LoadingModel => Some(Self::LoadingModel),
            JobStatus::Generating => Some(Self::Generating),
            JobStatus::Saving => Some(Self::Saving),
            JobStatus::Completed => Some(Self::Completed),
            _ => None,
        }
    }
}

const GENERATION_STAGES: &[Stage] = &[
    Stage::Queued,
    Stage::Downloading,
    Stage::LoadingModel,
    Stage::Generating,
    Stage::Saving,
    Stage::Completed,
];
// Upscale models ship with the backend, so there is no download step.
const UPSCALE_STAGES: &[Stage] = &[
    Stage::Queued,
    Stage::LoadingModel,
    Stage::Generating,
    Stage::Saving,
    Stage::Completed,
];
const BULK_STAGES: &[Stage] = &[Stage::Queued, Stage::Generating, Stage::Completed];
const DOWNLOAD_STAGES: &[Stage] = &[Stage::Queued, Stage::Downloading, Stage::Completed];

/// Canonical stage order for `kind`.
pub fn stage_sequence(kind: JobKind) -> &'static [Stage] {
    match kind {
        JobKind::Image | JobKind::Video | JobKind::ImageToVideo => GENERATION_STAGES,
        JobKind::Upscale => UPSCALE_STAGES,
        JobKind::Bulk => BULK_STAGES,
        JobKind::CivitaiDownload | JobKind::HuggingfaceDownload => DOWNLOAD_STAGES,
    }
}

/// Position of `status` in the kind's sequence. Anything not in the sequence
/// (unknown strings, `failed`, `cancelled`) is index 0.
pub fn stage_index(kind: JobKind, status: &JobStatus) -> usize {
    Stage::from_status(status)
        .and_then(|stage| position(kind, stage))
        .unwrap_or(0)
}

fn position(kind: JobKind, stage: Stage) -> Option<usize> {
    stage_sequence(kind).iter().position(|s| *s == stage)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageSpan {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Per-job timing memory carried between observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageTimeline {
    spans: BTreeMap<Stage, StageSpan>,
    /// Furthest non-terminal stage observed so far.
    reached: Option<Stage>,
}

impl StageTimeline {
    pub fn span(&self, stage: Stage) -> Option<&StageSpan> {
        self.spans.get(&stage)
    }

    pub fn reached(&self) -> Option<Stage> {
        self.reached
    }

    fn open(&mut self, stage: Stage, at: DateTime<Utc>) {
        self.spans.entry(stage).or_insert(StageSpan {
            started_at: at,
            ended_at: None,
        });
    }

    fn close_open(&mut self, at: DateTime<Utc>) {
        for span in self.spans.values_mut() {
            if span.ended_at.is_none() {
                span.ended_at = Some(at.max(span.started_at));
            }
        }
    }

    fn seed(job: &Job, kind: JobKind, stage: Option<Stage>) -> Self {
        let core = job.core();
        let mut timeline = Self::default();
        timeline.open(Stage::Queued, core.created_at);

        let Some(stage) = stage.filter(|s| *s != Stage::Queued && *s != Stage::Completed) else {
            if stage == Some(Stage::Queued) {
                timeline.reached = Some(Stage::Queued);
            }
            return timeline;
        };
        if position(kind, stage).is_none() {
            return timeline;
        }
        let started = core.started_at.unwrap_or(core.created_at);
        timeline.close_open(started);
        timeline.open(stage, started);
        timeline.reached = Some(stage);
        timeline
    }

    fn advance(&mut self, kind: JobKind, stage: Stage, now: DateTime<Utc>) {
        let Some(next) = position(kind, stage) else {
            return;
        };
        let current = self.reached.and_then(|s| position(kind, s));
        // Stages only move forward; a stale or unknown status never reopens one.
        if current.is_some_and(|current| next <= current) {
            return;
        }
        self.close_open(now);
        self.open(stage, now);
        self.reached = Some(stage);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageView {
    pub stage: Stage,
    pub label: &'static str,
    pub is_past: bool,
    pub is_current: bool,
    pub is_failed: bool,
    pub is_cancelled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// UI state derived from one snapshot. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedJobView {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub stages: Vec<StageView>,
    pub display_progress: f64,
    pub eta_seconds: Option<f64>,
}

impl DerivedJobView {
    pub fn current_stage(&self) -> Option<&StageView> {
        self.stages.iter().find(|stage| stage.is_current)
    }
}

/// Progress number to show for the job's current stage.
pub fn display_progress(job: &Job) -> f64 {
    if let Job::Bulk(bulk) = job {
        return bulk.aggregate_progress();
    }
    match job.status() {
        JobStatus::Downloading => job.download_progress(),
        JobStatus::LoadingModel => job.load_progress(),
        _ => clamp_progress(job.progress()),
    }
}

/// Derives the stage view for `job` and the timeline to remember for it.
///
/// `previous` is `None` on first observation, in which case timing is seeded
/// from the job's own `created_at`/`started_at` rather than `now`.
pub fn derive_view(
    previous: Option<&StageTimeline>,
    job: &Job,
    now: DateTime<Utc>,
) -> (DerivedJobView, StageTimeline) {
    let kind = job.kind();
    let status = job.status();
    let terminal = job.is_terminal();
    let stage = Stage::from_status(status);

    let mut timeline = match previous {
        Some(previous) => {
            let mut timeline = previous.clone();
            match stage {
                Some(Stage::Completed) | None => {}
                Some(stage) => timeline.advance(kind, stage, now),
            }
            timeline
        }
        None => StageTimeline::seed(job, kind, stage),
    };

    if terminal {
        let closed_at = job.core().completed_at.unwrap_or(now);
        timeline.close_open(closed_at);
        if *status == JobStatus::Completed {
            timeline.spans.entry(Stage::Completed).or_insert(StageSpan {
                started_at: closed_at,
                ended_at: Some(closed_at),
            });
        }
    }

    let failed = *status == JobStatus::Failed;
    let cancelled = *status == JobStatus::Cancelled && kind.is_download();
    let current_index = if failed || cancelled {
        timeline
            .reached
            .and_then(|stage| position(kind, stage))
            .unwrap_or(0)
    } else {
        stage_index(kind, status)
    };

    let stages = stage_sequence(kind)
        .iter()
        .enumerate()
        .map(|(index, stage)| {
            let span = timeline.span(*stage);
            StageView {
                stage: *stage,
                label: stage.label(),
                is_past: index < current_index,
                is_current: index == current_index && !terminal,
                is_failed: failed && index == current_index,
                is_cancelled: cancelled && index == current_index,
                started_at: span.map(|s| s.started_at),
                ended_at: span.and_then(|s| s.ended_at),
            }
        })
        .collect();

    let view = DerivedJobView {
        job_id: job.id().to_string(),
        kind,
        status: status.clone(),
        stages,
        display_progress: display_progress(job),
        eta_seconds: job.core().eta_seconds,
    };
    (view, timeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::model::JobCore;
    use crate::job::{BulkJob, ImageJob, ModelStageProgress};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
    }

    fn image_job(status: JobStatus) -> Job {
        let mut core = JobCore::queued("job-1", Some("s-1".to_string()), t0());
        core.status = status;
        Job::Image(ImageJob {
            core,
            model_stage: ModelStageProgress::default(),
            current_image: 0,
            total_images: 1,
            prompt: "a red fox".to_string(),
            model: "sdxl".to_string(),
            width: 1024,
            height: 1024,
            steps: 30,
            num_images: 1,
            batch_id: None,
            images: Vec::new(),
        })
    }

    fn with_core(mut job: Job, f: impl FnOnce(&mut JobCore)) -> Job {
        f(job.core_mut());
        job
    }

    #[test]
    fn test_stage_index_and_unknown_status() {
        assert_eq!(stage_index(JobKind::Image, &JobStatus::LoadingModel), 2);
        assert_eq!(stage_index(JobKind::Bulk, &JobStatus::Generating), 1);
        assert_eq!(stage_index(JobKind::CivitaiDownload, &JobStatus::Downloading), 1);
        assert_eq!(stage_index(JobKind::Upscale, &JobStatus::LoadingModel), 1);
        assert_eq!(stage_index(JobKind::Image, &JobStatus::from("upscaling")), 0);
        // Not a download stage.
        assert_eq!(stage_index(JobKind::HuggingfaceDownload, &JobStatus::Saving), 0);
    }

    #[test]
    fn test_past_and_current_flags() {
        let job = image_job(JobStatus::Generating);
        let (view, _) = derive_view(None, &job, t0());

        let flags: Vec<(bool, bool)> = view.stages.iter().map(|s| (s.is_past, s.is_current)).collect();
        assert_eq!(
            flags,
            vec![
                (true, false),
                (true, false),
                (true, false),
                (false, true),
                (false, false),
                (false, false)
            ]
        );
        assert_eq!(view.current_stage().map(|s| s.stage), Some(Stage::Generating));
    }

    #[test]
    fn test_display_progress_uses_stage_sub_channel() {
        let mut job = image_job(JobStatus::Downloading);
        if let Job::Image(image) = &mut job {
            image.model_stage.download_progress = 40.0;
            image.model_stage.load_progress = 75.0;
            image.core.progress = 5.0;
        }
        assert_eq!(display_progress(&job), 40.0);

        job.core_mut().status = JobStatus::LoadingModel;
        assert_eq!(display_progress(&job), 75.0);

        job.core_mut().status = JobStatus::Generating;
        assert_eq!(display_progress(&job), 5.0);
    }

    #[test]
    fn test_bulk_display_progress_from_counters() {
        let job = Job::Bulk(BulkJob {
            core: JobCore::queued("bulk-1", None, t0()),
            total: 10,
            completed: 7,
            failed: 1,
            items: Vec::new(),
            base_prompt: None,
            fal_model: "flux".to_string(),
            width: 512,
            height: 512,
            steps: None,
        });
        let (view, _) = derive_view(None, &job, t0());
        assert_eq!(view.display_progress, 80.0);
    }

    #[test]
    fn test_first_observation_seeds_from_job_timestamps() {
        let started = t0() + Duration::seconds(4);
        let job = with_core(image_job(JobStatus::Generating), |core| {
            core.started_at = Some(started);
        });
        let now = t0() + Duration::seconds(60);

        let (view, timeline) = derive_view(None, &job, now);

        let queued = timeline.span(Stage::Queued).unwrap();
        assert_eq!(queued.started_at, t0());
        assert_eq!(queued.ended_at, Some(started));
        assert_eq!(timeline.span(Stage::Generating).unwrap().started_at, started);
        assert_eq!(view.stages[3].started_at, Some(started));
    }

    #[test]
    fn test_transition_stamps_now() {
        let (_, timeline) = derive_view(None, &image_job(JobStatus::Queued), t0());
        let later = t0() + Duration::seconds(3);

        let (_, timeline) = derive_view(Some(&timeline), &image_job(JobStatus::Downloading), later);

        assert_eq!(timeline.span(Stage::Queued).unwrap().ended_at, Some(later));
        let downloading = timeline.span(Stage::Downloading).unwrap();
        assert_eq!(downloading.started_at, later);
        assert_eq!(downloading.ended_at, None);
    }

    #[test]
    fn test_stale_status_does_not_move_backwards() {
        let (_, timeline) = derive_view(None, &image_job(JobStatus::Generating), t0());
        let (_, timeline) = derive_view(Some(&timeline), &image_job(JobStatus::Downloading), t0());
        assert_eq!(timeline.reached(), Some(Stage::Generating));
        assert!(timeline.span(Stage::Downloading).is_none());
    }

    #[test]
    fn test_completion_closes_open_stage_with_completed_at() {
        let (_, timeline) = derive_view(None, &image_job(JobStatus::Saving), t0());
        let done_at = t0() + Duration::seconds(9);
        let job = with_core(image_job(JobStatus::Completed), |core| {
            core.completed_at = Some(done_at);
            core.progress = 100.0;
        });

        let (view, timeline) = derive_view(Some(&timeline), &job, t0() + Duration::seconds(12));

        assert_eq!(timeline.span(Stage::Saving).unwrap().ended_at, Some(done_at));
        assert!(view.stages.iter().all(|s| !s.is_current));
        assert!(view.stages[..5].iter().all(|s| s.is_past));
        assert!(!view.stages[5].is_past);
        assert_eq!(view.display_progress, 100.0);
    }

    #[test]
    fn test_failure_marks_the_stage_it_failed_in() {
        let (_, timeline) = derive_view(None, &image_job(JobStatus::LoadingModel), t0());
        let job = with_core(image_job(JobStatus::Failed), |core| {
            core.error = Some("CUDA out of memory".to_string());
        });

        let (view, _) = derive_view(Some(&timeline), &job, t0() + Duration::seconds(5));

        assert!(view.stages[0].is_past && view.stages[1].is_past);
        assert!(view.stages[2].is_failed);
        assert!(!view.stages[2].is_past);
        assert!(view.stages[3..].iter().all(|s| !s.is_past && !s.is_failed));
        assert!(view.stages.iter().all(|s| !s.is_current));
    }

    #[test]
    fn test_failure_on_first_observation_marks_first_stage() {
        let (view, _) = derive_view(None, &image_job(JobStatus::Failed), t0());
        assert!(view.stages[0].is_failed);
        assert!(view.stages.iter().all(|s| !s.is_past));
    }
}

//! Job domain model.
//!
//! Each backend job family has its own payload struct; [`Job`] is the tagged
//! union over them. All lifecycle logic switches on [`JobKind`], never on which
//! optional fields happen to be present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::{JobKind, JobStatus};
use crate::timestamp;

/// Fields every job family reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCore {
    pub id: String,
    /// `None` for orphaned jobs and for downloads.
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    /// 0-100
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub eta_seconds: Option<f64>,
    /// Set only when `status` is `failed`.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobCore {
    pub fn queued(id: impl Into<String>, session_id: Option<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            session_id,
            status: JobStatus::Queued,
            progress: 0.0,
            eta_seconds: None,
            error: None,
            created_at,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Sub-channel progress for jobs that may fetch and load a model first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelStageProgress {
    /// 0-100, meaningful while `downloading`.
    #[serde(default)]
    pub download_progress: f64,
    #[serde(default)]
    pub download_total_mb: Option<f64>,
    #[serde(default)]
    pub download_speed_mbps: Option<f64>,
    /// 0-100, meaningful while `loading_model`.
    #[serde(default)]
    pub load_progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    pub id: String,
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub seed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageJob {
    #[serde(flatten)]
    pub core: JobCore,
    #[serde(flatten)]
    pub model_stage: ModelStageProgress,
    #[serde(default)]
    pub current_image: u32,
    #[serde(default)]
    pub total_images: u32,
    pub prompt: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub num_images: u32,
    /// Groups the images of one generation; this is what image sessions record.
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResult {
    pub id: String,
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub seed: i64,
    pub duration: f64,
    pub fps: u32,
    pub num_frames: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub has_audio: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJob {
    #[serde(flatten)]
    pub core: JobCore,
    #[serde(flatten)]
    pub model_stage: ModelStageProgress,
    #[serde(default)]
    pub current_frame: u32,
    #[serde(default)]
    pub total_frames: u32,
    pub prompt: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub num_frames: u32,
    pub fps: u32,
    #[serde(default)]
    pub video: Option<VideoResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct I2vJob {
    #[serde(flatten)]
    pub core: JobCore,
    #[serde(flatten)]
    pub model_stage: ModelStageProgress,
    #[serde(default)]
    pub current_frame: u32,
    #[serde(default)]
    pub total_frames: u32,
    pub prompt: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub num_frames: u32,
    pub fps: u32,
    #[serde(default)]
    pub source_image_urls: Vec<String>,
    #[serde(default)]
    pub video: Option<VideoResult>,
}

/// Real-ESRGAN upscale of a previously generated video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpscaleJob {
    #[serde(flatten)]
    pub core: JobCore,
    #[serde(default)]
    pub current_frame: u32,
    #[serde(default)]
    pub total_frames: u32,
    pub source_video_id: String,
    #[serde(default)]
    pub source_width: u32,
    #[serde(default)]
    pub source_height: u32,
    #[serde(default)]
    pub source_fps: u32,
    #[serde(default)]
    pub source_duration: f64,
    pub model: String,
    #[serde(default)]
    pub scale_factor: u32,
    #[serde(default)]
    pub target_width: u32,
    #[serde(default)]
    pub target_height: u32,
    #[serde(default)]
    pub video: Option<VideoResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItem {
    pub index: u32,
    pub prompt: String,
    /// Per-item status (`pending`, `generating`, `completed`, `failed`).
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkJob {
    #[serde(flatten)]
    pub core: JobCore,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub items: Vec<BulkItem>,
    #[serde(default)]
    pub base_prompt: Option<String>,
    #[serde(default)]
    pub fal_model: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub steps: Option<u32>,
}

impl BulkJob {
    /// Progress derived from the aggregate counters: `(completed + failed) / total`.
    pub fn aggregate_progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let done = f64::from(self.completed.saturating_add(self.failed));
        clamp_progress(done / f64::from(self.total) * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CivitaiDownloadJob {
    #[serde(flatten)]
    pub core: JobCore,
    pub civitai_model_id: i64,
    pub version_id: i64,
    pub model_name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    pub filename: String,
    pub download_url: String,
    #[serde(default)]
    pub base_model: Option<String>,
    #[serde(default)]
    pub file_size_kb: Option<f64>,
    #[serde(default)]
    pub downloaded_bytes: u64,
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub speed_bytes_per_sec: f64,
    #[serde(default)]
    pub local_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HfDownloadJob {
    #[serde(flatten)]
    pub core: JobCore,
    pub model_id: String,
    pub model_name: String,
    /// HuggingFace repo path
    pub model_path: String,
    #[serde(default)]
    pub total_size_mb: f64,
    #[serde(default)]
    pub speed_mbps: f64,
}

/// A backend job of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    Image(ImageJob),
    Video(VideoJob),
    #[serde(rename = "i2v")]
    ImageToVideo(I2vJob),
    Upscale(UpscaleJob),
    Bulk(BulkJob),
    CivitaiDownload(CivitaiDownloadJob),
    HuggingfaceDownload(HfDownloadJob),
}

impl Job {
    /// Deserializes a backend payload (which carries no discriminant) as `kind`.
    pub fn from_value(kind: JobKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            JobKind::Image => Self::Image(serde_json::from_value(value)?),
            JobKind::Video => Self::Video(serde_json::from_value(value)?),
            JobKind::ImageToVideo => Self::ImageToVideo(serde_json::from_value(value)?),
            JobKind::Upscale => Self::Upscale(serde_json::from_value(value)?),
            JobKind::Bulk => Self::Bulk(serde_json::from_value(value)?),
            JobKind::CivitaiDownload => Self::CivitaiDownload(serde_json::from_value(value)?),
            JobKind::HuggingfaceDownload => Self::HuggingfaceDownload(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Self::Image(_) => JobKind::Image,
            Self::Video(_) => JobKind::Video,
            Self::ImageToVideo(_) => JobKind::ImageToVideo,
            Self::Upscale(_) => JobKind::Upscale,
            Self::Bulk(_) => JobKind::Bulk,
            Self::CivitaiDownload(_) => JobKind::CivitaiDownload,
            Self::HuggingfaceDownload(_) => JobKind::HuggingfaceDownload,
        }
    }

    pub fn core(&self) -> &JobCore {
        match self {
            Self::Image(job) => &job.core,
            Self::Video(job) => &job.core,
            Self::ImageToVideo(job) => &job.core,
            Self::Upscale(job) => &job.core,
            Self::Bulk(job) => &job.core,
            Self::CivitaiDownload(job) => &job.core,
            Self::HuggingfaceDownload(job) => &job.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut JobCore {
        match self {
            Self::Image(job) => &mut job.core,
            Self::Video(job) => &mut job.core,
            Self::ImageToVideo(job) => &mut job.core,
            Self::Upscale(job) => &mut job.core,
            Self::Bulk(job) => &mut job.core,
            Self::CivitaiDownload(job) => &mut job.core,
            Self::HuggingfaceDownload(job) => &mut job.core,
        }
    }

    pub fn id(&self) -> &str {
        &self.core().id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.core().session_id.as_deref()
    }

    pub fn status(&self) -> &JobStatus {
        &self.core().status
    }

    pub fn progress(&self) -> f64 {
        clamp_progress(self.core().progress)
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal(self.status())
    }

    /// Progress reported on the download sub-channel.
    ///
    /// Download jobs report it through `progress`; generation jobs through
    /// `download_progress`. Bulk and upscale jobs never download.
    pub fn download_progress(&self) -> f64 {
        let raw = match self {
            Self::Image(job) => job.model_stage.download_progress,
            Self::Video(job) => job.model_stage.download_progress,
            Self::ImageToVideo(job) => job.model_stage.download_progress,
            Self::Bulk(_) | Self::Upscale(_) => 0.0,
            Self::CivitaiDownload(job) => job.core.progress,
            Self::HuggingfaceDownload(job) => job.core.progress,
        };
        clamp_progress(raw)
    }

    /// Progress reported on the model-load sub-channel.
    pub fn load_progress(&self) -> f64 {
        let raw = match self {
            Self::Image(job) => job.model_stage.load_progress,
            Self::Video(job) => job.model_stage.load_progress,
            Self::ImageToVideo(job) => job.model_stage.load_progress,
            _ => 0.0,
        };
        clamp_progress(raw)
    }

    /// The user prompt behind the job, if the kind has one.
    pub fn prompt(&self) -> Option<&str> {
        match self {
            Self::Image(job) => Some(&job.prompt),
            Self::Video(job) => Some(&job.prompt),
            Self::ImageToVideo(job) => Some(&job.prompt),
            Self::Bulk(job) => job
                .base_prompt
                .as_deref()
                .or_else(|| job.items.first().map(|item| item.prompt.as_str())),
            Self::Upscale(_) | Self::CivitaiDownload(_) | Self::HuggingfaceDownload(_) => None,
        }
    }

    /// Short human label for feeds: the prompt, the model name for downloads,
    /// or the upscale model.
    pub fn title(&self) -> &str {
        match self {
            Self::Upscale(job) => &job.model,
            Self::CivitaiDownload(job) => &job.model_name,
            Self::HuggingfaceDownload(job) => &job.model_name,
            _ => self.prompt().unwrap_or_else(|| self.id()),
        }
    }

    /// Identifier recorded in the owning session once the job completes.
    pub fn result_id(&self) -> Option<String> {
        match self {
            Self::Image(job) => Some(job.batch_id.clone().unwrap_or_else(|| job.core.id.clone())),
            Self::Video(job) => Some(
                job.video
                    .as_ref()
                    .map(|video| video.id.clone())
                    .unwrap_or_else(|| job.core.id.clone()),
            ),
            Self::ImageToVideo(job) => Some(
                job.video
                    .as_ref()
                    .map(|video| video.id.clone())
                    .unwrap_or_else(|| job.core.id.clone()),
            ),
            Self::Upscale(job) => Some(
                job.video
                    .as_ref()
                    .map(|video| video.id.clone())
                    .unwrap_or_else(|| job.core.id.clone()),
            ),
            Self::Bulk(job) => Some(job.core.id.clone()),
            Self::CivitaiDownload(_) | Self::HuggingfaceDownload(_) => None,
        }
    }

    /// Primary preview media for thumbnails.
    pub fn preview(&self) -> Option<String> {
        match self {
            Self::Image(job) => job.images.first().map(|image| image.url.clone()),
            Self::Video(job) => job.video.as_ref().map(|video| video.url.clone()),
            Self::ImageToVideo(job) => job
                .video
                .as_ref()
                .map(|video| video.url.clone())
                .or_else(|| job.source_image_urls.first().cloned()),
            Self::Upscale(job) => job.video.as_ref().map(|video| video.url.clone()),
            Self::Bulk(job) => job.items.iter().find_map(|item| item.image_url.clone()),
            Self::CivitaiDownload(_) | Self::HuggingfaceDownload(_) => None,
        }
    }

    /// Enforces the snapshot invariants: progress within 0-100 and
    /// `completed_at` present on terminal jobs.
    pub fn normalized(mut self, observed_at: DateTime<Utc>) -> Self {
        let terminal = self.is_terminal();
        let core = self.core_mut();
        core.progress = clamp_progress(core.progress);
        if terminal && core.completed_at.is_none() {
            core.completed_at = Some(observed_at);
        }
        self
    }
}

/// Clamps to `[0, 100]`; NaN becomes 0.
pub fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image_payload() -> serde_json::Value {
        json!({
            "id": "job-1",
            "session_id": "s-1",
            "status": "downloading",
            "progress": 0.0,
            "current_image": 0,
            "total_images": 4,
            "eta_seconds": 42.0,
            "error": null,
            "download_progress": 37.5,
            "download_total_mb": 6900.0,
            "download_speed_mbps": 88.0,
            "prompt": "a lighthouse at dusk, oil painting",
            "model": "flux-schnell",
            "width": 1024,
            "height": 1024,
            "steps": 4,
            "num_images": 4,
            "batch_id": "batch-9",
            "images": [],
            "created_at": "2025-03-01T10:00:00.000000",
            "started_at": "2025-03-01T10:00:02.000000",
            "completed_at": null
        })
    }

    #[test]
    fn test_image_job_from_backend_payload() {
        let job = Job::from_value(JobKind::Image, image_payload()).unwrap();

        assert_eq!(job.kind(), JobKind::Image);
        assert_eq!(job.id(), "job-1");
        assert_eq!(job.session_id(), Some("s-1"));
        assert_eq!(job.status(), &JobStatus::Downloading);
        assert_eq!(job.download_progress(), 37.5);
        assert_eq!(job.core().eta_seconds, Some(42.0));
        assert_eq!(job.result_id().as_deref(), Some("batch-9"));
        assert!(job.core().started_at.is_some());
    }

    #[test]
    fn test_tagged_round_trip_keeps_kind() {
        let job = Job::from_value(JobKind::Image, image_payload()).unwrap();
        let encoded = serde_json::to_value(&job).unwrap();
        assert_eq!(encoded["kind"], "image");
        let decoded: Job = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn test_bulk_aggregate_progress() {
        let job: BulkJob = serde_json::from_value(json!({
            "id": "bulk-1",
            "status": "generating",
            "total": 10,
            "completed": 7,
            "failed": 1,
            "created_at": "2025-03-01T10:00:00"
        }))
        .unwrap();
        assert_eq!(job.aggregate_progress(), 80.0);
    }

    #[test]
    fn test_bulk_with_zero_total_has_no_progress() {
        let job: BulkJob = serde_json::from_value(json!({
            "id": "bulk-2",
            "created_at": "2025-03-01T10:00:00"
        }))
        .unwrap();
        assert_eq!(job.aggregate_progress(), 0.0);
    }

    #[test]
    fn test_civitai_download_uses_progress_as_download_channel() {
        let job = Job::from_value(
            JobKind::CivitaiDownload,
            json!({
                "id": "dl-1",
                "civitai_model_id": 101,
                "version_id": 202,
                "model_name": "Dreamy LoRA",
                "type": "LORA",
                "filename": "dreamy.safetensors",
                "download_url": "https://civitai.com/api/download/models/202",
                "status": "downloading",
                "progress": 64.0,
                "created_at": "2025-03-01T10:00:00"
            }),
        )
        .unwrap();

        assert_eq!(job.download_progress(), 64.0);
        assert_eq!(job.title(), "Dreamy LoRA");
        assert_eq!(job.result_id(), None);
        assert_eq!(job.kind().session_kind(), None);
    }

    #[test]
    fn test_upscale_job_binds_its_output_video() {
        let job = Job::from_value(
            JobKind::Upscale,
            json!({
                "id": "up-1",
                "session_id": "s-4",
                "status": "completed",
                "progress": 100.0,
                "current_frame": 49,
                "total_frames": 49,
                "source_video_id": "vid-7",
                "source_width": 720,
                "source_height": 480,
                "source_fps": 8,
                "source_duration": 6.1,
                "model": "realesrgan-x2plus",
                "scale_factor": 2,
                "target_width": 1440,
                "target_height": 960,
                "video": {
                    "id": "vid-8",
                    "filename": "vid-8.mp4",
                    "url": "/outputs/vid-8.mp4",
                    "seed": 0,
                    "duration": 6.1,
                    "fps": 8,
                    "num_frames": 49,
                    "width": 1440,
                    "height": 960
                },
                "created_at": "2025-03-01T10:00:00",
                "completed_at": "2025-03-01T10:00:30"
            }),
        )
        .unwrap();

        assert_eq!(job.result_id().as_deref(), Some("vid-8"));
        assert_eq!(job.preview().as_deref(), Some("/outputs/vid-8.mp4"));
        assert_eq!(job.prompt(), None);
        assert_eq!(job.title(), "realesrgan-x2plus");
        assert!(job.is_terminal());
    }

    #[test]
    fn test_normalized_clamps_and_stamps_completion() {
        let mut job = Job::from_value(JobKind::Image, image_payload()).unwrap();
        job.core_mut().status = JobStatus::Completed;
        job.core_mut().progress = 140.0;
        let now = Utc::now();

        let job = job.normalized(now);

        assert_eq!(job.progress(), 100.0);
        assert_eq!(job.core().completed_at, Some(now));
    }

    #[test]
    fn test_clamp_progress_handles_nan() {
        assert_eq!(clamp_progress(f64::NAN), 0.0);
        assert_eq!(clamp_progress(-3.0), 0.0);
        assert_eq!(clamp_progress(55.5), 55.5);
    }
}

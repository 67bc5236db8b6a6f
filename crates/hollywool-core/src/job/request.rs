//! Job creation requests and the optimistic snapshots inserted for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{
    BulkItem, BulkJob, CivitaiDownloadJob, I2vJob, ImageJob, Job, JobCore, ModelStageProgress, UpscaleJob, VideoJob,
};
use super::status::{JobKind, JobStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageJobRequest {
    pub prompt: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    pub num_images: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ImageJobRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: "flux-schnell".to_string(),
            negative_prompt: None,
            width: 1024,
            height: 1024,
            steps: None,
            guidance_scale: None,
            seed: None,
            num_images: 4,
            session_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJobRequest {
    pub prompt: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_frames: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl VideoJobRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: "cogvideox-5b".to_string(),
            negative_prompt: None,
            num_frames: None,
            fps: None,
            width: 720,
            height: 480,
            steps: None,
            seed: None,
            session_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct I2vJobRequest {
    #[serde(flatten)]
    pub video: VideoJobRequest,
    /// Asset id of a previously generated image to animate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpscaleJobRequest {
    /// Asset id of the video to upscale.
    pub video_asset_id: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl UpscaleJobRequest {
    pub fn new(video_asset_id: impl Into<String>) -> Self {
        Self {
            video_asset_id: video_asset_id.into(),
            model: "realesrgan-x4-video".to_string(),
            session_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkJobRequest {
    pub prompts: Vec<String>,
    pub fal_model: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CivitaiDownloadRequest {
    pub civitai_model_id: i64,
    pub version_id: i64,
    pub model_name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    pub filename: String,
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_kb: Option<f64>,
}

/// Parameters for `create_job`, one variant per creatable kind.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    Image(ImageJobRequest),
    Video(VideoJobRequest),
    ImageToVideo(I2vJobRequest),
    Upscale(UpscaleJobRequest),
    Bulk(BulkJobRequest),
    CivitaiDownload(CivitaiDownloadRequest),
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Image(_) => JobKind::Image,
            Self::Video(_) => JobKind::Video,
            Self::ImageToVideo(_) => JobKind::ImageToVideo,
            Self::Upscale(_) => JobKind::Upscale,
            Self::Bulk(_) => JobKind::Bulk,
            Self::CivitaiDownload(_) => JobKind::CivitaiDownload,
        }
    }

    /// Request body as sent to the backend.
    pub fn to_body(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Image(request) => serde_json::to_value(request),
            Self::Video(request) => serde_json::to_value(request),
            Self::ImageToVideo(request) => serde_json::to_value(request),
            Self::Upscale(request) => serde_json::to_value(request),
            Self::Bulk(request) => serde_json::to_value(request),
            Self::CivitaiDownload(request) => serde_json::to_value(request),
        }
    }

    /// A `queued` snapshot standing in for the job until the backend lists it.
    pub fn placeholder(&self, job_id: &str, now: DateTime<Utc>) -> Job {
        match self {
            Self::Image(request) => Job::Image(ImageJob {
                core: JobCore::queued(job_id, request.session_id.clone(), now),
                model_stage: ModelStageProgress::default(),
                current_image: 0,
                total_images: request.num_images,
                prompt: request.prompt.clone(),
                model: request.model.clone(),
                width: request.width,
                height: request.height,
                steps: request.steps.unwrap_or_default(),
                num_images: request.num_images,
                batch_id: None,
                images: Vec::new(),
            }),
            Self::Video(request) => Job::Video(video_placeholder(request, job_id, now)),
            Self::ImageToVideo(request) => {
                let video = video_placeholder(&request.video, job_id, now);
                Job::ImageToVideo(I2vJob {
                    core: video.core,
                    model_stage: video.model_stage,
                    current_frame: 0,
                    total_frames: video.total_frames,
                    prompt: video.prompt,
                    model: video.model,
                    width: video.width,
                    height: video.height,
                    steps: video.steps,
                    num_frames: video.num_frames,
                    fps: video.fps,
                    source_image_urls: request.reference_images.clone(),
                    video: None,
                })
            }
            Self::Upscale(request) => Job::Upscale(UpscaleJob {
                core: JobCore::queued(job_id, request.session_id.clone(), now),
                current_frame: 0,
                total_frames: 0,
                source_video_id: request.video_asset_id.clone(),
                source_width: 0,
                source_height: 0,
                source_fps: 0,
                source_duration: 0.0,
                model: request.model.clone(),
                scale_factor: 0,
                target_width: 0,
                target_height: 0,
                video: None,
            }),
            Self::Bulk(request) => Job::Bulk(BulkJob {
                core: JobCore::queued(job_id, None, now),
                total: u32::try_from(request.prompts.len()).unwrap_or(u32::MAX),
                completed: 0,
                failed: 0,
                items: request
                    .prompts
                    .iter()
                    .enumerate()
                    .map(|(index, prompt)| BulkItem {
                        index: u32::try_from(index).unwrap_or(u32::MAX),
                        prompt: prompt.clone(),
                        status: JobStatus::from("pending"),
                        image_url: None,
                        asset_id: None,
                        seed: None,
                        error: None,
                    })
                    .collect(),
                base_prompt: request.base_prompt.clone(),
                fal_model: request.fal_model.clone(),
                width: request.width,
                height: request.height,
                steps: request.steps,
            }),
            Self::CivitaiDownload(request) => Job::CivitaiDownload(CivitaiDownloadJob {
                core: JobCore::queued(job_id, None, now),
                civitai_model_id: request.civitai_model_id,
                version_id: request.version_id,
                model_name: request.model_name.clone(),
                model_type: request.model_type.clone(),
                filename: request.filename.clone(),
                download_url: request.download_url.clone(),
                base_model: request.base_model.clone(),
                file_size_kb: request.file_size_kb,
                downloaded_bytes: 0,
                total_bytes: 0,
                speed_bytes_per_sec: 0.0,
                local_path: None,
            }),
        }
    }
}

fn video_placeholder(request: &VideoJobRequest, job_id: &str, now: DateTime<Utc>) -> VideoJob {
    let num_frames = request.num_frames.unwrap_or_default();
    VideoJob {
        core: JobCore::queued(job_id, request.session_id.clone(), now),
        model_stage: ModelStageProgress::default(),
        current_frame: 0,
        total_frames: num_frames,
        prompt: request.prompt.clone(),
        model: request.model.clone(),
        width: request.width,
        height: request.height,
        steps: request.steps.unwrap_or_default(),
        num_frames,
        fps: request.fps.unwrap_or_default(),
        video: None,
    }
}

/// Acknowledgement of `create_job`.
///
/// Generation endpoints answer `{job_id, status, message}`; the download
/// endpoint answers with the whole job, whose identifier is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedJob {
    #[serde(alias = "id")]
    pub job_id: String,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub message: Option<String>,
}

//! Job domain module.
//!
//! - `model`: the [`Job`] tagged union and its per-kind payloads
//! - `status`: [`JobKind`] and the backend [`JobStatus`] literals
//! - `stages`: stage sequences, timing and display progress
//! - `merge`: pure reconciliation of local and fetched snapshots
//! - `request`: creation requests and optimistic placeholders
//! - `api`: the [`JobApi`] port implemented by infrastructure adapters

mod api;
pub mod merge;
mod model;
mod request;
pub mod stages;
mod status;

pub use api::{JobApi, JobFilter};
pub use merge::{FetchStamp, StampSource, Stamped, merge};
pub use model::{
    BulkItem, BulkJob, CivitaiDownloadJob, HfDownloadJob, I2vJob, ImageJob, ImageResult, Job, JobCore,
    ModelStageProgress, UpscaleJob, VideoJob, VideoResult, clamp_progress,
};
pub use request::{
    BulkJobRequest, CivitaiDownloadRequest, CreatedJob, I2vJobRequest, ImageJobRequest, JobRequest, UpscaleJobRequest,
    VideoJobRequest,
};
pub use stages::{DerivedJobView, Stage, StageSpan, StageTimeline, StageView, derive_view, display_progress};
pub use status::{JobKind, JobStatus};

//! Job kinds and the status strings the backend reports.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString};

use crate::session::SessionKind;

/// Discriminant of the [`Job`](super::Job) tagged union.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    Image,
    Video,
    #[serde(rename = "i2v")]
    #[strum(serialize = "i2v")]
    ImageToVideo,
    Upscale,
    Bulk,
    CivitaiDownload,
    HuggingfaceDownload,
}

impl JobKind {
    pub fn is_download(self) -> bool {
        matches!(self, Self::CivitaiDownload | Self::HuggingfaceDownload)
    }

    /// The session family completed jobs of this kind are bound into.
    ///
    /// Downloads never belong to a session.
    pub fn session_kind(self) -> Option<SessionKind> {
        match self {
            Self::Image => Some(SessionKind::Image),
            Self::Video | Self::ImageToVideo | Self::Upscale => Some(SessionKind::Video),
            Self::Bulk => Some(SessionKind::Bulk),
            Self::CivitaiDownload | Self::HuggingfaceDownload => None,
        }
    }

    /// Whether `status` is in this kind's terminal set.
    pub fn is_terminal(self, status: &JobStatus) -> bool {
        match status {
            JobStatus::Completed | JobStatus::Failed => true,
            JobStatus::Cancelled => self.is_download(),
            _ => false,
        }
    }
}

/// A job status string.
///
/// The literals match the backend exactly. Strings this client does not know
/// are preserved in [`JobStatus::Unknown`] instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Queued,
    Downloading,
    LoadingModel,
    Generating,
    Saving,
    Completed,
    Failed,
    Cancelled,
    Unknown(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::LoadingModel => "loading_model",
            Self::Generating => "generating",
            Self::Saving => "saving",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown(raw) => raw,
        }
    }

    /// Terminal regardless of kind. Prefer [`JobKind::is_terminal`] when the
    /// kind is known.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Queued
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "queued" => Self::Queued,
            "downloading" => Self::Downloading,
            "loading_model" => Self::LoadingModel,
            "generating" => Self::Generating,
            "saving" => Self::Saving,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Unknown(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_literals_round_trip_through_json() {
        let status: JobStatus = serde_json::from_str("\"loading_model\"").unwrap();
        assert_eq!(status, JobStatus::LoadingModel);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"loading_model\"");
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let status: JobStatus = serde_json::from_str("\"upscaling\"").unwrap();
        assert_eq!(status, JobStatus::Unknown("upscaling".to_string()));
        assert_eq!(status.as_str(), "upscaling");
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_cancelled_is_terminal_only_for_downloads() {
        assert!(JobKind::CivitaiDownload.is_terminal(&JobStatus::Cancelled));
        assert!(JobKind::HuggingfaceDownload.is_terminal(&JobStatus::Cancelled));
        assert!(!JobKind::Image.is_terminal(&JobStatus::Cancelled));
        assert!(JobKind::Image.is_terminal(&JobStatus::Failed));
        assert!(!JobKind::Bulk.is_terminal(&JobStatus::Generating));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(JobKind::ImageToVideo.to_string(), "i2v");
        assert_eq!(JobKind::from_str("civitai_download").unwrap(), JobKind::CivitaiDownload);
        assert_eq!(
            serde_json::to_string(&JobKind::HuggingfaceDownload).unwrap(),
            "\"huggingface_download\""
        );
    }

    #[test]
    fn test_session_kind_mapping() {
        assert_eq!(JobKind::ImageToVideo.session_kind(), Some(SessionKind::Video));
        assert_eq!(JobKind::Upscale.session_kind(), Some(SessionKind::Video));
        assert_eq!(JobKind::Bulk.session_kind(), Some(SessionKind::Bulk));
        assert_eq!(JobKind::CivitaiDownload.session_kind(), None);
    }
}

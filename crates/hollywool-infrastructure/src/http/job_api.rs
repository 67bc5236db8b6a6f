//! HTTP implementation of [`JobApi`].

use async_trait::async_trait;
use serde_json::Value;

use hollywool_core::error::{HollywoolError, Result};
use hollywool_core::job::{CreatedJob, Job, JobApi, JobFilter, JobKind, JobRequest};

use super::client::ApiClient;

/// Collection path of each kind's job resource.
///
/// `None` for kinds the backend tracks internally but exposes no router for
/// (huggingface downloads).
pub fn jobs_path(kind: JobKind) -> Option<&'static str> {
    match kind {
        JobKind::Image => Some("/api/jobs"),
        JobKind::Video => Some("/api/video/jobs"),
        JobKind::ImageToVideo => Some("/api/i2v/jobs"),
        JobKind::Upscale => Some("/api/upscale/jobs"),
        JobKind::Bulk => Some("/api/bulk/jobs"),
        JobKind::CivitaiDownload => Some("/api/civitai/downloads"),
        JobKind::HuggingfaceDownload => None,
    }
}

/// Job endpoints of one kind on the HollyWool backend.
#[derive(Debug, Clone)]
pub struct HttpJobApi {
    client: ApiClient,
    kind: JobKind,
}

impl HttpJobApi {
    pub fn new(client: ApiClient, kind: JobKind) -> Self {
        Self { client, kind }
    }

    fn collection(&self) -> Result<&'static str> {
        jobs_path(self.kind)
            .ok_or_else(|| HollywoolError::unsupported(format!("{} jobs are not served over HTTP", self.kind)))
    }

    fn item_path(&self, id: &str) -> Result<String> {
        Ok(format!("{}/{}", self.collection()?, id))
    }

    fn decode(&self, value: Value) -> Result<Job> {
        Ok(Job::from_value(self.kind, value)?)
    }
}

/// Extracts the job array from either `{"jobs": [...]}` or a bare array.
fn job_values(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("jobs") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(HollywoolError::Serialization {
                format: "JSON".to_string(),
                message: "job list response has no `jobs` array".to_string(),
            }),
        },
        other => Err(HollywoolError::Serialization {
            format: "JSON".to_string(),
            message: format!("unexpected job list response: {other}"),
        }),
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let body: Value = self.client.get(self.collection()?, filter).await?;
        let jobs = job_values(body)?
            .into_iter()
            .filter_map(|value| match self.decode(value) {
                Ok(job) => Some(job),
                Err(e) => {
                    tracing::warn!("[HttpJobApi] Skipping undecodable {} job: {}", self.kind, e);
                    None
                }
            })
            // Not every list endpoint honours the query parameters.
            .filter(|job| filter.matches(job))
            .collect();
        Ok(jobs)
    }

    async fn get_job(&self, id: &str) -> Result<Job> {
        let body: Value = self.client.get(&self.item_path(id)?, &()).await?;
        self.decode(body)
    }

    async fn create_job(&self, request: &JobRequest) -> Result<CreatedJob> {
        if request.kind() != self.kind {
            return Err(HollywoolError::internal(format!(
                "{} request sent to the {} job API",
                request.kind(),
                self.kind
            )));
        }
        let body = request.to_body()?;
        let created: CreatedJob = self.client.post(self.collection()?, &body).await?;
        tracing::info!("[HttpJobApi] Created {} job {}", self.kind, created.job_id);
        Ok(created)
    }

    async fn cancel_job(&self, id: &str) -> Result<()> {
        match self.kind {
            JobKind::Bulk | JobKind::CivitaiDownload => self.client.delete(&self.item_path(id)?).await,
            kind => Err(HollywoolError::unsupported(format!("cancelling {kind} job '{id}'"))),
        }
    }
}

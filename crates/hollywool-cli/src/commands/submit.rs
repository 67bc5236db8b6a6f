use anyhow::{Context, Result, bail};
use clap::Subcommand;
use tokio::sync::broadcast::error::RecvError;

use hollywool_application::Workbench;
use hollywool_core::config::HollywoolConfig;
use hollywool_core::job::{BulkJobRequest, ImageJobRequest, JobRequest, JobStatus, UpscaleJobRequest, VideoJobRequest};
use hollywool_core::session::SessionKind;
use hollywool_infrastructure::HollywoolPaths;

use super::job_line;

#[derive(Subcommand)]
pub enum SubmitJob {
    /// Text-to-image batch
    Image {
        prompt: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        negative: Option<String>,
        #[arg(long, default_value_t = 4)]
        count: u32,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        steps: Option<u32>,
        #[arg(long)]
        seed: Option<i64>,
    },
    /// Text-to-video clip
    Video {
        prompt: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        frames: Option<u32>,
        #[arg(long)]
        fps: Option<u32>,
        #[arg(long)]
        seed: Option<i64>,
    },
    /// Upscale a generated video
    Upscale {
        /// Asset id of the source video
        video: String,
        #[arg(long)]
        model: Option<String>,
    },
    /// One image per prompt
    Bulk {
        #[arg(required = true)]
        prompts: Vec<String>,
        #[arg(long, default_value = "flux-dev")]
        model: String,
        #[arg(long, default_value_t = 1024)]
        size: u32,
        #[arg(long)]
        base_prompt: Option<String>,
    },
}

impl SubmitJob {
    fn session_kind(&self) -> SessionKind {
        match self {
            Self::Image { .. } => SessionKind::Image,
            Self::Video { .. } | Self::Upscale { .. } => SessionKind::Video,
            Self::Bulk { .. } => SessionKind::Bulk,
        }
    }

    fn into_request(self, session_id: Option<String>) -> JobRequest {
        match self {
            Self::Image {
                prompt,
                model,
                negative,
                count,
                width,
                height,
                steps,
                seed,
            } => {
                let mut request = ImageJobRequest::new(prompt);
                if let Some(model) = model {
                    request.model = model;
                }
                request.negative_prompt = negative;
                request.num_images = count;
                request.width = width.unwrap_or(request.width);
                request.height = height.unwrap_or(request.height);
                request.steps = steps;
                request.seed = seed;
                request.session_id = session_id;
                JobRequest::Image(request)
            }
            Self::Video {
                prompt,
                model,
                frames,
                fps,
                seed,
            } => {
                let mut request = VideoJobRequest::new(prompt);
                if let Some(model) = model {
                    request.model = model;
                }
                request.num_frames = frames;
                request.fps = fps;
                request.seed = seed;
                request.session_id = session_id;
                JobRequest::Video(request)
            }
            Self::Upscale { video, model } => {
                let mut request = UpscaleJobRequest::new(video);
                if let Some(model) = model {
                    request.model = model;
                }
                request.session_id = session_id;
                JobRequest::Upscale(request)
            }
            Self::Bulk {
                prompts,
                model,
                size,
                base_prompt,
            } => JobRequest::Bulk(BulkJobRequest {
                prompts,
                fal_model: model,
                width: size,
                height: size,
                steps: None,
                base_prompt,
            }),
        }
    }
}

pub async fn run(config: &HollywoolConfig, paths: &HollywoolPaths, job: SubmitJob, wait: bool) -> Result<()> {
    let workbench = Workbench::from_config(config, paths)?;
    let sessions = workbench.sessions(job.session_kind());
    let session = sessions.ensure_current_session().await;
    let request = job.into_request(Some(session.id.clone()));
    let kind = request.kind();
    let poller = workbench
        .poller(kind)
        .with_context(|| format!("No job API configured for {kind}"))?;

    let mut updates = poller.subscribe();
    let submitted = workbench.submit(&request).await?;
    println!("Submitted {kind} job {} into session '{}'", submitted.id(), session.name);
    if !wait {
        workbench.shutdown().await;
        return Ok(());
    }

    let finished = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                workbench.shutdown().await;
                bail!("Interrupted; job {} keeps running on the backend", submitted.id());
            }
            update = updates.recv() => match update {
                Ok(update) if update.job.id() == submitted.id() => {
                    let view = workbench.timings().observe(&update.job).await;
                    println!("{}", job_line(&update.job, &view));
                    if update.job.is_terminal() {
                        break update.job;
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => bail!("Poller stopped before job {} finished", submitted.id()),
            }
        }
    };

    if *finished.status() == JobStatus::Completed {
        let outcome = workbench.binder().bind(&finished).await?;
        tracing::debug!("[Submit] Bind outcome for {}: {:?}", finished.id(), outcome);
        if let Some(bound) = sessions.session(&session.id).await {
            println!("Session '{}' now has {} results", bound.name, bound.results.len());
        }
    }
    workbench.shutdown().await;
    Ok(())
}

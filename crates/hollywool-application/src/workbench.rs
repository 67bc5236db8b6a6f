//! Wiring of every per-kind service into one running workbench.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use strum::IntoEnumIterator;
use tokio::sync::broadcast::error::RecvError;

use hollywool_core::clock::{Clock, SystemClock};
use hollywool_core::config::{HollywoolConfig, PollerSettings, SessionStoreKind};
use hollywool_core::error::{HollywoolError, Result};
use hollywool_core::job::{DerivedJobView, Job, JobApi, JobKind, JobRequest};
use hollywool_core::session::{DraftStore, SessionGateway, SessionKind, TitleGenerator};
use hollywool_infrastructure::http::jobs_path;
use hollywool_infrastructure::{
    ApiClient, HollywoolPaths, HttpJobApi, HttpSessionGateway, HttpTitleGenerator, JsonFileStore, KindRoutedGateway,
};

use crate::binder::SessionJobBinder;
use crate::job::{JobPoller, StageTimingCache};
use crate::notifications::NotificationAggregator;
use crate::scheduler::{ScheduledTask, TaskControl};
use crate::session::SessionManager;

/// Collaborators a [`Workbench`] is assembled from.
pub struct WorkbenchDeps {
    pub job_apis: Vec<Arc<dyn JobApi>>,
    pub sessions: Arc<dyn SessionGateway>,
    pub drafts: Option<Arc<dyn DraftStore>>,
    pub titles: Arc<dyn TitleGenerator>,
    pub clock: Arc<dyn Clock>,
}

impl WorkbenchDeps {
    /// Backend adapters for every job kind the backend routes; session stores
    /// per `config.session_store`.
    ///
    /// Image sessions live in the backend Session API in `remote` mode; every
    /// other kind, and every kind in `local` mode, is kept in JSON files under
    /// the data directory.
    pub fn from_config(config: &HollywoolConfig, paths: &HollywoolPaths) -> Result<Self> {
        let client = ApiClient::new(config.api_base_url.clone(), config.request_timeout())?;
        let store = Arc::new(JsonFileStore::new(paths.store_dir()?));

        let sessions: Arc<dyn SessionGateway> = match config.session_store {
            SessionStoreKind::Remote => Arc::new(
                KindRoutedGateway::new(store.clone())
                    .route(SessionKind::Image, Arc::new(HttpSessionGateway::new(client.clone()))),
            ),
            SessionStoreKind::Local => store.clone(),
        };
        let job_apis = JobKind::iter()
            .filter(|kind| jobs_path(*kind).is_some())
            .map(|kind| Arc::new(HttpJobApi::new(client.clone(), kind)) as Arc<dyn JobApi>)
            .collect();

        Ok(Self {
            job_apis,
            sessions,
            drafts: Some(store),
            titles: Arc::new(HttpTitleGenerator::new(client)),
            clock: Arc::new(SystemClock),
        })
    }
}

/// Session managers, job pollers, the binder and the activity feed, built
/// once and shared for the life of the process.
pub struct Workbench {
    sessions: BTreeMap<SessionKind, Arc<SessionManager>>,
    pollers: BTreeMap<JobKind, Arc<JobPoller>>,
    binder: Arc<SessionJobBinder>,
    notifications: NotificationAggregator,
    timings: Arc<StageTimingCache>,
    sweep_interval: std::time::Duration,
    tasks: StdMutex<Vec<ScheduledTask>>,
}

impl Workbench {
    pub fn new(deps: WorkbenchDeps, settings: PollerSettings, done_limit: usize) -> Self {
        let sessions: BTreeMap<SessionKind, Arc<SessionManager>> = SessionKind::iter()
            .map(|kind| {
                let mut manager = SessionManager::new(kind, deps.sessions.clone(), deps.clock.clone());
                if let Some(drafts) = &deps.drafts {
                    manager = manager.with_drafts(drafts.clone());
                }
                (kind, Arc::new(manager))
            })
            .collect();

        let binder = sessions
            .values()
            .fold(SessionJobBinder::new(deps.titles.clone()), |binder, manager| {
                binder.with_manager(manager.clone())
            });

        let pollers = deps
            .job_apis
            .iter()
            .map(|api| {
                let poller = JobPoller::new(api.clone(), deps.clock.clone(), settings);
                (api.kind(), Arc::new(poller))
            })
            .collect();

        Self {
            sessions,
            pollers,
            binder: Arc::new(binder),
            notifications: NotificationAggregator::new(deps.job_apis, deps.clock.clone()).with_done_limit(done_limit),
            timings: Arc::new(StageTimingCache::new(deps.clock)),
            sweep_interval: settings.list_interval,
            tasks: StdMutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &HollywoolConfig, paths: &HollywoolPaths) -> Result<Self> {
        let deps = WorkbenchDeps::from_config(config, paths)?;
        Ok(Self::new(deps, config.poller_settings(), config.done_feed_limit))
    }

    pub fn sessions(&self, kind: SessionKind) -> Arc<SessionManager> {
        // Every SessionKind gets a manager in `new`.
        Arc::clone(&self.sessions[&kind])
    }

    pub fn poller(&self, kind: JobKind) -> Option<Arc<JobPoller>> {
        self.pollers.get(&kind).cloned()
    }

    pub fn binder(&self) -> &Arc<SessionJobBinder> {
        &self.binder
    }

    pub fn notifications(&self) -> &NotificationAggregator {
        &self.notifications
    }

    pub fn timings(&self) -> &Arc<StageTimingCache> {
        &self.timings
    }

    /// Loads every session list, then starts polling, binding and stage
    /// timing. Idempotent.
    pub async fn start(&self) {
        for manager in self.sessions.values() {
            manager.init().await;
        }

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if !tasks.is_empty() {
            return;
        }

        for (kind, poller) in &self.pollers {
            // Subscribe before polling starts so no update is missed.
            if kind.session_kind().is_some() {
                tasks.push(self.binder.run(format!("{kind}-binder"), poller.subscribe()));
            }
            let timings = Arc::clone(&self.timings);
            let mut updates = poller.subscribe();
            tasks.push(ScheduledTask::spawn(format!("{kind}-stage-timing"), async move {
                loop {
                    match updates.recv().await {
                        Ok(update) => {
                            timings.observe(&update.job).await;
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            }));
            poller.start();
        }

        let pollers: Vec<Arc<JobPoller>> = self.pollers.values().cloned().collect();
        let timings = Arc::clone(&self.timings);
        tasks.push(ScheduledTask::every("stage-timing-sweep", self.sweep_interval, move || {
            let pollers = pollers.clone();
            let timings = Arc::clone(&timings);
            async move {
                let mut live = HashSet::new();
                for poller in &pollers {
                    live.extend(poller.snapshot().await.into_iter().map(|job| job.id().to_string()));
                }
                timings.retain(|id| live.contains(id)).await;
                TaskControl::Continue
            }
        }));

        tracing::info!(
            "[Workbench] Started {} pollers and {} background tasks",
            self.pollers.len(),
            tasks.len()
        );
    }

    /// Submits a job through its kind's poller.
    pub async fn submit(&self, request: &JobRequest) -> Result<Job> {
        let poller = self
            .poller(request.kind())
            .ok_or_else(|| HollywoolError::unsupported(format!("no job API configured for {}", request.kind())))?;
        poller.submit(request).await
    }

    /// Every live job across kinds with its stage view, newest first.
    pub async fn live_jobs(&self) -> Vec<(Job, DerivedJobView)> {
        let mut jobs = Vec::new();
        for poller in self.pollers.values() {
            jobs.extend(poller.snapshot().await);
        }
        jobs.sort_by(|a, b| b.core().created_at.cmp(&a.core().created_at));

        let mut views = Vec::with_capacity(jobs.len());
        for job in jobs {
            let view = self.timings.observe(&job).await;
            views.push((job, view));
        }
        views
    }

    /// Stops every task and retries any failed session save.
    pub async fn shutdown(&self) {
        let tasks: Vec<ScheduledTask> = self.tasks.lock().unwrap_or_else(|e| e.into_inner()).drain(..).collect();
        drop(tasks);
        for poller in self.pollers.values() {
            poller.shutdown();
        }
        for manager in self.sessions.values() {
            if !manager.flush().await {
                tracing::warn!("[Workbench] {} sessions still unsaved at shutdown", manager.kind());
            }
        }
        tracing::info!("[Workbench] Shut down");
    }
}

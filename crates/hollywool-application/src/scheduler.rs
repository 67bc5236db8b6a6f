//! Cancellable background tasks.
//!
//! A [`ScheduledTask`] owns a spawned tokio task and a stop signal. Dropping
//! the handle cancels the task, so a poller can never outlive its owner.

use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What a periodic tick wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskControl {
    Continue,
    Stop,
}

#[derive(Debug)]
pub struct ScheduledTask {
    name: String,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Runs `tick` every `period`, first immediately, until it returns
    /// [`TaskControl::Stop`] or the task is cancelled. Ticks never overlap;
    /// ticks missed while one runs are skipped.
    pub fn every<F, Fut>(name: impl Into<String>, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TaskControl> + Send + 'static,
    {
        let name = name.into();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        if tick().await == TaskControl::Stop {
                            tracing::debug!("[ScheduledTask] {} finished", task_name);
                            break;
                        }
                    }
                }
            }
        });
        tracing::debug!("[ScheduledTask] {} started ({:?} interval)", name, period);
        Self {
            name,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Runs `work` once in the background until it completes or the task is
    /// cancelled.
    pub fn spawn<Fut>(name: impl Into<String>, work: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = stop_rx => {},
                _ = work => {},
            }
        });
        Self {
            name,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_finished())
    }

    /// Signals the task to stop and aborts any in-flight await. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("[ScheduledTask] {} cancelled", self.name);
        }
    }

    /// Signals the task to stop and waits for the current tick to finish.
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!("[ScheduledTask] {} join failed: {}", self.name, e);
                }
            }
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

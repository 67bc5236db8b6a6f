use hollywool_core::clock::Clock;
use hollywool_core::error::{HollywoolError, Result};
use hollywool_core::session::{
    DEFAULT_SESSION_NAME, DraftStore, Session, SessionGateway, SessionKind, SessionSnapshot,
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OnceCell, RwLock};

/// Result of [`SessionManager::attach_result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachOutcome {
    /// The result id was not yet in the session and has been appended.
    pub appended: bool,
    /// The appended id is the session's first result.
    pub first_result: bool,
}

/// Owns the session list and current-session pointer of one [`SessionKind`].
///
/// `SessionManager` is responsible for:
/// - Loading the snapshot once per instance
/// - Creating, deleting and renaming sessions
/// - Keeping the current pointer valid
/// - Binding results to sessions idempotently
/// - Persisting the full snapshot after every mutation
///
/// Persistence failures never propagate out of mutations. The in-memory
/// snapshot stays authoritative and is rewritten in full by the next
/// mutation or an explicit [`flush`](Self::flush).
pub struct SessionManager {
    kind: SessionKind,
    gateway: Arc<dyn SessionGateway>,
    drafts: Option<Arc<dyn DraftStore>>,
    clock: Arc<dyn Clock>,
    loaded: OnceCell<()>,
    state: RwLock<SessionSnapshot>,
    /// Serialises saves so an older snapshot never lands after a newer one.
    save_lock: Mutex<()>,
    dirty: AtomicBool,
}

impl SessionManager {
    pub fn new(kind: SessionKind, gateway: Arc<dyn SessionGateway>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kind,
            gateway,
            drafts: None,
            clock,
            loaded: OnceCell::new(),
            state: RwLock::new(SessionSnapshot::default()),
            save_lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn with_drafts(mut self, drafts: Arc<dyn DraftStore>) -> Self {
        self.drafts = Some(drafts);
        self
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Loads the session list and pointer, once.
    ///
    /// Later and concurrent calls share the first load. A failed load leaves
    /// an empty list rather than an error.
    pub async fn init(&self) -> SessionSnapshot {
        self.ensure_loaded().await;
        self.state.read().await.clone()
    }

    async fn ensure_loaded(&self) {
        self.loaded
            .get_or_init(|| async {
                match self.gateway.load(self.kind).await {
                    Ok(snapshot) => {
                        tracing::info!(
                            "[SessionManager] Loaded {} {} sessions (current: {:?})",
                            snapshot.sessions.len(),
                            self.kind,
                            snapshot.current_session_id
                        );
                        *self.state.write().await = snapshot;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "[SessionManager] Failed to load {} sessions, starting empty: {}",
                            self.kind,
                            e
                        );
                    }
                }
            })
            .await;
    }

    pub async fn sessions(&self) -> Vec<Session> {
        self.ensure_loaded().await;
        self.state.read().await.sessions.clone()
    }

    pub async fn session(&self, id: &str) -> Option<Session> {
        self.ensure_loaded().await;
        self.state.read().await.get(id).cloned()
    }

    pub async fn current_session_id(&self) -> Option<String> {
        self.ensure_loaded().await;
        self.state.read().await.current_session_id.clone()
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.ensure_loaded().await;
        self.state.read().await.current().cloned()
    }

    /// Creates a session at the front of the list and makes it current.
    pub async fn create_session(&self, name: Option<String>) -> Session {
        self.ensure_loaded().await;
        let session = Session::new(name, self.clock.now());
        {
            let mut state = self.state.write().await;
            state.sessions.insert(0, session.clone());
            state.current_session_id = Some(session.id.clone());
        }
        tracing::info!("[SessionManager] Created {} session {}", self.kind, session.id);
        self.persist().await;
        session
    }

    /// Deletes a session, keeping the current pointer valid.
    ///
    /// Whenever the pointer no longer references a listed session afterwards,
    /// it moves to the new first session, or to a freshly created one when
    /// none remain.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        self.ensure_loaded().await;
        let needs_fresh = {
            let mut state = self.state.write().await;
            let index = state
                .sessions
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(|| HollywoolError::not_found("Session", id))?;
            state.sessions.remove(index);

            // Also repairs a pointer that was absent or dangling before the delete.
            if state.current().is_none() {
                state.current_session_id = state.sessions.first().map(|s| s.id.clone());
            }
            state.current_session_id.is_none()
        };
        tracing::info!("[SessionManager] Deleted {} session {}", self.kind, id);

        if needs_fresh {
            // Persists the deletion along with the new session.
            self.create_session(None).await;
        } else {
            self.persist().await;
        }
        Ok(())
    }

    /// Renames a session on the user's behalf. Auto-naming is disabled for it
    /// from then on.
    pub async fn rename_session(&self, id: &str, name: &str) -> Result<Session> {
        self.update(id, |session| {
            session.name = normalize_name(name);
            session.is_auto_named = Some(false);
        })
        .await
    }

    /// Renames a session on the system's behalf, unless the user renamed it.
    ///
    /// Returns whether the name was applied.
    pub async fn auto_rename_session(&self, id: &str, name: &str) -> Result<bool> {
        self.ensure_loaded().await;
        let applied = {
            let mut state = self.state.write().await;
            let session = state
                .get_mut(id)
                .ok_or_else(|| HollywoolError::not_found("Session", id))?;
            if session.allows_auto_rename() {
                session.name = normalize_name(name);
                session.is_auto_named = Some(true);
                true
            } else {
                false
            }
        };
        if applied {
            tracing::debug!("[SessionManager] Auto-named {} session {} as '{}'", self.kind, id, name);
            self.persist().await;
        } else {
            tracing::debug!("[SessionManager] Skipped auto-name for user-named session {}", id);
        }
        Ok(applied)
    }

    /// Returns the current session, repairing the pointer if needed.
    ///
    /// Resolution order: the pointed-to session if it exists; otherwise the
    /// first session (the adoption is persisted, as another client may have
    /// written the list since the pointer was saved); otherwise a new session.
    pub async fn ensure_current_session(&self) -> Session {
        self.ensure_loaded().await;
        let adopted = {
            let mut state = self.state.write().await;
            if let Some(current) = state.current() {
                return current.clone();
            }
            match state.sessions.first().cloned() {
                Some(first) => {
                    state.current_session_id = Some(first.id.clone());
                    Some(first)
                }
                None => None,
            }
        };
        match adopted {
            Some(session) => {
                tracing::info!("[SessionManager] Adopted {} session {} as current", self.kind, session.id);
                self.persist().await;
                session
            }
            None => self.create_session(None).await,
        }
    }

    /// Appends `result_id` to the session unless it is already there. The
    /// thumbnail is replaced only when the result is new.
    pub async fn attach_result(&self, id: &str, result_id: &str, thumbnail: Option<String>) -> Result<AttachOutcome> {
        self.ensure_loaded().await;
        let outcome = {
            let mut state = self.state.write().await;
            let session = state
                .get_mut(id)
                .ok_or_else(|| HollywoolError::not_found("Session", id))?;
            let appended = session.push_result(result_id);
            if appended && thumbnail.is_some() {
                session.thumbnail = thumbnail;
            }
            AttachOutcome {
                appended,
                first_result: appended && session.results.len() == 1,
            }
        };
        if outcome.appended {
            tracing::debug!("[SessionManager] Attached {} to {} session {}", result_id, self.kind, id);
            self.persist().await;
        }
        Ok(outcome)
    }

    /// Makes `id` current, flushing the outgoing session's draft first.
    ///
    /// Returns the incoming session's stored draft. If the outgoing draft
    /// cannot be written, the switch is aborted and the pointer is unchanged.
    pub async fn switch_session(&self, id: &str, outgoing_draft: Option<Value>) -> Result<Option<Value>> {
        self.ensure_loaded().await;
        let outgoing = {
            let state = self.state.read().await;
            if !state.contains(id) {
                return Err(HollywoolError::not_found("Session", id));
            }
            state.current().map(|s| s.id.clone())
        };

        if let (Some(drafts), Some(outgoing), Some(draft)) = (&self.drafts, &outgoing, &outgoing_draft) {
            drafts.save_draft(self.kind, outgoing, draft).await?;
            tracing::debug!("[SessionManager] Flushed draft for {} session {}", self.kind, outgoing);
        }

        self.state.write().await.current_session_id = Some(id.to_string());
        self.persist().await;

        let Some(drafts) = &self.drafts else {
            return Ok(None);
        };
        match drafts.load_draft(self.kind, id).await {
            Ok(draft) => Ok(draft),
            Err(e) => {
                tracing::warn!("[SessionManager] Failed to load draft for session {}: {}", id, e);
                Ok(None)
            }
        }
    }

    /// Whether the last save failed and has not been retried successfully.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Retries a failed save. Returns whether the store is now up to date.
    pub async fn flush(&self) -> bool {
        if !self.is_dirty() {
            return true;
        }
        self.persist().await
    }

    /// Applies `updater` to one session and persists.
    async fn update<F>(&self, id: &str, updater: F) -> Result<Session>
    where
        F: FnOnce(&mut Session),
    {
        self.ensure_loaded().await;
        let updated = {
            let mut state = self.state.write().await;
            let session = state
                .get_mut(id)
                .ok_or_else(|| HollywoolError::not_found("Session", id))?;
            updater(session);
            session.clone()
        };
        tracing::debug!("[SessionManager] Updated {} session {}", self.kind, id);
        self.persist().await;
        Ok(updated)
    }

    /// Writes the full snapshot. Failures are logged and leave the manager dirty.
    async fn persist(&self) -> bool {
        let _guard = self.save_lock.lock().await;
        let snapshot = self.state.read().await.clone();
        match self.gateway.save(self.kind, &snapshot).await {
            Ok(()) => {
                self.dirty.store(false, Ordering::SeqCst);
                true
            }
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                tracing::warn!(
                    "[SessionManager] Failed to save {} sessions, will retry on next change: {}",
                    self.kind,
                    e
                );
                false
            }
        }
    }
}

fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        DEFAULT_SESSION_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;

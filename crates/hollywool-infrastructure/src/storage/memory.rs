//! In-process stores for tests and offline runs.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use hollywool_core::error::{HollywoolError, Result};
use hollywool_core::session::{DraftStore, SessionGateway, SessionKind, SessionSnapshot};

/// Session gateway holding snapshots in memory.
///
/// Loads and saves can be switched to fail, and saves are counted, so the
/// failure policy of callers can be observed.
#[derive(Debug, Default)]
pub struct MemorySessionGateway {
    snapshots: RwLock<HashMap<SessionKind, SessionSnapshot>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemorySessionGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(kind: SessionKind, snapshot: SessionSnapshot) -> Self {
        Self {
            snapshots: RwLock::new(HashMap::from([(kind, snapshot)])),
            ..Self::default()
        }
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// What is currently stored for `kind`.
    pub async fn stored(&self, kind: SessionKind) -> Option<SessionSnapshot> {
        self.snapshots.read().await.get(&kind).cloned()
    }
}

#[async_trait]
impl SessionGateway for MemorySessionGateway {
    async fn load(&self, kind: SessionKind) -> Result<SessionSnapshot> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(HollywoolError::transport("memory gateway: load failure"));
        }
        Ok(self.snapshots.read().await.get(&kind).cloned().unwrap_or_default())
    }

    async fn save(&self, kind: SessionKind, snapshot: &SessionSnapshot) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(HollywoolError::transport("memory gateway: save failure"));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.snapshots.write().await.insert(kind, snapshot.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<(SessionKind, String), Value>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn load_draft(&self, kind: SessionKind, session_id: &str) -> Result<Option<Value>> {
        Ok(self.drafts.read().await.get(&(kind, session_id.to_string())).cloned())
    }

    async fn save_draft(&self, kind: SessionKind, session_id: &str, draft: &Value) -> Result<()> {
        self.drafts
            .write()
            .await
            .insert((kind, session_id.to_string()), draft.clone());
        Ok(())
    }
}

//! Local key-value store backed by one JSON file per key.
//!
//! Used for session kinds the backend cannot store, and for drafts.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

use hollywool_core::error::Result;
use hollywool_core::session::{DraftStore, SessionGateway, SessionKind, SessionSnapshot};

use super::atomic_json::AtomicJsonFile;

/// Directory-backed store: `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file<T>(&self, key: &str) -> AtomicJsonFile<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        AtomicJsonFile::new(self.dir.join(format!("{}.json", sanitize_key(key))))
    }

    fn draft_key(kind: SessionKind, session_id: &str) -> String {
        format!("{}-draft-{}", kind.prefix(), session_id)
    }
}

/// Keeps keys to a single path component.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl SessionGateway for JsonFileStore {
    async fn load(&self, kind: SessionKind) -> Result<SessionSnapshot> {
        let snapshot = self.file::<SessionSnapshot>(&kind.storage_key()).load().await?;
        Ok(snapshot.unwrap_or_default())
    }

    async fn save(&self, kind: SessionKind, snapshot: &SessionSnapshot) -> Result<()> {
        self.file(&kind.storage_key()).save(snapshot).await?;
        tracing::debug!(
            "[JsonFileStore] Saved {} {} sessions",
            snapshot.sessions.len(),
            kind
        );
        Ok(())
    }
}

#[async_trait]
impl DraftStore for JsonFileStore {
    async fn load_draft(&self, kind: SessionKind, session_id: &str) -> Result<Option<Value>> {
        self.file::<Value>(&Self::draft_key(kind, session_id)).load().await
    }

    async fn save_draft(&self, kind: SessionKind, session_id: &str, draft: &Value) -> Result<()> {
        self.file(&Self::draft_key(kind, session_id)).save(draft).await
    }
}

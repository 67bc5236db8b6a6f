//! Persistence and collaborator ports for sessions.

use async_trait::async_trait;
use serde_json::Value;

use super::model::{SessionKind, SessionSnapshot};
use crate::error::Result;

/// Loads and saves a kind's whole session snapshot.
///
/// Saves are full replacements: callers always send the complete list.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Loads the snapshot for `kind`. A store that has never been written
    /// returns an empty snapshot, not an error.
    async fn load(&self, kind: SessionKind) -> Result<SessionSnapshot>;

    async fn save(&self, kind: SessionKind, snapshot: &SessionSnapshot) -> Result<()>;
}

/// Per-session draft (in-progress form input) storage.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn load_draft(&self, kind: SessionKind, session_id: &str) -> Result<Option<Value>>;

    async fn save_draft(&self, kind: SessionKind, session_id: &str, draft: &Value) -> Result<()>;
}

/// Produces a short session title from a prompt.
#[async_trait]
pub trait TitleGenerator: Send + Sync {
    async fn generate_title(&self, prompt: &str) -> Result<String>;
}

//! Session domain model.
//!
//! A session is a named container of related generation results. The session
//! list and the current-session pointer travel together as a
//! [`SessionSnapshot`], which is also the unit of persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::timestamp;

pub const DEFAULT_SESSION_NAME: &str = "New Session";

/// Session families. Each kind has its own list and its own current pointer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionKind {
    Image,
    Video,
    Bulk,
}

impl SessionKind {
    /// Storage key prefix for this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Bulk => "bulk",
        }
    }

    /// Key under which the kind's snapshot is stored locally.
    pub fn storage_key(self) -> String {
        format!("{}-sessions", self.prefix())
    }
}

/// A persistent, named container of generation results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub name: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Preview of the most recently bound result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// `Some(false)` once the user renamed the session; absent means `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_auto_named: Option<bool>,
    /// Append-only, deduplicated result identifiers (batch ids for images).
    #[serde(rename = "batchIds", alias = "resultIds", default)]
    pub results: Vec<String>,
}

impl Session {
    pub fn new(name: Option<String>, created_at: DateTime<Utc>) -> Self {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            created_at,
            thumbnail: None,
            is_auto_named: Some(true),
            results: Vec::new(),
        }
    }

    /// Whether the system may still rename this session.
    pub fn allows_auto_rename(&self) -> bool {
        self.is_auto_named != Some(false)
    }

    pub fn has_result(&self, result_id: &str) -> bool {
        self.results.iter().any(|r| r == result_id)
    }

    /// Appends `result_id` unless already present. Returns whether it was added.
    pub fn push_result(&mut self, result_id: &str) -> bool {
        if self.has_result(result_id) {
            return false;
        }
        self.results.push(result_id.to_string());
        true
    }
}

/// The full session list of one kind plus its current pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub current_session_id: Option<String>,
}

impl SessionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The current session, if the pointer references one that exists.
    pub fn current(&self) -> Option<&Session> {
        self.current_session_id.as_deref().and_then(|id| self.get(id))
    }
}

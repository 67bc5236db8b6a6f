//! Error types for HollyWool.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the whole HollyWool workspace.
///
/// Variants are structured so callers can decide on a policy (retry, swallow,
/// surface) without string matching.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum HollywoolError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// The backend answered with a non-success status code
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation not offered by this backend or kind
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HollywoolError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error (or a 404 from the backend)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Http { status: 404, .. })
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// Transport failures and 5xx/429 answers are transient; everything else
    /// needs a different request.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Io { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for HollywoolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for HollywoolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for HollywoolError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for HollywoolError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, HollywoolError>`.
pub type Result<T> = std::result::Result<T, HollywoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_404_counts_as_not_found() {
        assert!(HollywoolError::http(404, "Job not found").is_not_found());
        assert!(HollywoolError::not_found("Session", "s-1").is_not_found());
        assert!(!HollywoolError::http(500, "boom").is_not_found());
    }

    #[test]
    fn test_transient_classification() {
        assert!(HollywoolError::transport("connection refused").is_transient());
        assert!(HollywoolError::http(503, "unavailable").is_transient());
        assert!(HollywoolError::http(429, "slow down").is_transient());
        assert!(!HollywoolError::http(400, "bad request").is_transient());
        assert!(!HollywoolError::config("bad url").is_transient());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: HollywoolError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(err.is_serialization());
    }
}

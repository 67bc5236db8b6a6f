//! Path management for HollyWool files.
//!
//! ```text
//! ~/.config/hollywool/          # Config directory
//! └── config.toml               # Application configuration
//!
//! ~/.local/share/hollywool/     # Data directory (or `data_dir` from config)
//! ├── store/                    # Local key-value store
//! │   ├── video-sessions.json
//! │   └── image-draft-<id>.json
//! └── logs/
//!     └── hollywool.log.YYYY-MM-DD
//! ```

use std::path::PathBuf;

use hollywool_core::error::{HollywoolError, Result};

const APP_DIR: &str = "hollywool";

/// Resolves HollyWool's directories, honouring an optional data-dir override.
#[derive(Debug, Clone, Default)]
pub struct HollywoolPaths {
    data_dir_override: Option<PathBuf>,
}

impl HollywoolPaths {
    pub fn new(data_dir_override: Option<PathBuf>) -> Self {
        Self { data_dir_override }
    }

    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| HollywoolError::config("Cannot find config directory"))
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir_override {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| HollywoolError::config("Cannot find data directory"))
    }

    /// Root of the local key-value store (sessions and drafts).
    pub fn store_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("store"))
    }

    pub fn logs_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("logs"))
    }
}

//! Configuration service.
//!
//! Loads [`HollywoolConfig`] from `~/.config/hollywool/config.toml` (or an
//! explicit path), applies environment overrides, and caches the result.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use hollywool_core::config::HollywoolConfig;
use hollywool_core::error::{HollywoolError, Result};

use crate::paths::HollywoolPaths;

/// Overrides `api_base_url`.
pub const API_URL_ENV: &str = "HOLLYWOOL_API_URL";

#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
    config: Arc<RwLock<Option<HollywoolConfig>>>,
}

impl ConfigService {
    /// Uses the default config file location.
    pub fn new() -> Self {
        Self {
            path: None,
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the configuration, loading it on first access.
    pub fn get_config(&self) -> Result<HollywoolConfig> {
        {
            let cached = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let path = match &self.path {
            Some(path) => path.clone(),
            None => HollywoolPaths::config_file()?,
        };
        let mut loaded = load_config_file(&path)?;
        apply_env_overrides(&mut loaded, std::env::var(API_URL_ENV).ok());

        *self.config.write().unwrap_or_else(|e| e.into_inner()) = Some(loaded.clone());
        Ok(loaded)
    }

    /// Forces a reload on next access.
    pub fn invalidate_cache(&self) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a TOML config file. Missing or blank files yield the defaults.
pub fn load_config_file(path: &Path) -> Result<HollywoolConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("[ConfigService] No config at {}, using defaults", path.display());
            return Ok(HollywoolConfig::default());
        }
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(HollywoolConfig::default());
    }
    toml::from_str(&content)
        .map_err(|e| HollywoolError::config(format!("{}: {}", path.display(), e)))
}

fn apply_env_overrides(config: &mut HollywoolConfig, api_url: Option<String>) {
    if let Some(url) = api_url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
        tracing::debug!("[ConfigService] {} overrides api_base_url", API_URL_ENV);
        config.api_base_url = url;
    }
}

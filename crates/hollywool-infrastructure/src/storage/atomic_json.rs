//! Atomic JSON file operations.
//!
//! Writes go to a sibling temporary file which is fsynced and renamed over the
//! target, so a crash never leaves a half-written file behind.

use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use hollywool_core::error::{HollywoolError, Result};

/// A handle to a JSON file holding one `T`.
#[derive(Debug, Clone)]
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the file.
    ///
    /// - `Ok(Some(T))`: loaded and deserialized
    /// - `Ok(None)`: file missing or empty
    /// - `Err`: unreadable or not valid JSON for `T`
    pub async fn load(&self) -> Result<Option<T>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&content)?))
    }

    pub async fn save(&self, data: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(data)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = fs::File::create(&tmp_path).await?;
        tmp_file.write_all(&json).await?;
        tmp_file.sync_all().await?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| HollywoolError::io(format!("invalid store path: {}", self.path.display())))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        Ok(self.path.with_file_name(tmp_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_missing_and_empty_files_load_as_none() {
        let dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Sample>::new(dir.path().join("missing.json"));
        assert_eq!(file.load().await.unwrap(), None);

        std::fs::write(dir.path().join("empty.json"), "  \n").unwrap();
        let empty = AtomicJsonFile::<Sample>::new(dir.path().join("empty.json"));
        assert_eq!(empty.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_creates_parent_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sample.json");
        let file = AtomicJsonFile::new(path.clone());
        let sample = Sample {
            name: "fox".to_string(),
            count: 3,
        };

        file.save(&sample).await.unwrap();

        assert_eq!(file.load().await.unwrap(), Some(sample));
        assert!(!path.with_file_name("sample.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = AtomicJsonFile::<Sample>::new(path).load().await.unwrap_err();
        assert!(err.is_serialization());
    }
}

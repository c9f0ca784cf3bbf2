//! Directory-backed store

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{validate_relative_path, FileStore};
use crate::error::StoreError;

/// Stores files below a root directory
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a partially written file.
#[derive(Debug, Clone)]
pub struct LocalDirectoryStore {
    root: PathBuf,
}

impl LocalDirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        validate_relative_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl FileStore for LocalDirectoryStore {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn put(&self, path: &str, content: &[u8]) -> Result<(), StoreError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut staging = target.clone().into_os_string();
        staging.push(".partial");
        let staging = PathBuf::from(staging);

        tokio::fs::write(&staging, content).await?;
        tokio::fs::rename(&staging, &target).await?;
        debug!(path = %target.display(), bytes = content.len(), "Wrote file");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let target = self.resolve(path)?;
        let bytes = tokio::fs::read(&target).await?;
        debug!(path = %target.display(), bytes = bytes.len(), "Read file");
        Ok(bytes)
    }
}

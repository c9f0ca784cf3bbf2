//! File stores used by the transfer client
//!
//! A store moves opaque bytes to and from a path. The exchange point for a
//! payer is usually a [`LocalDirectoryStore`] rooted at an SFTP-mounted
//! directory; the durable backup is an [`HttpBucketStore`].

mod http;
mod local;
mod memory;

pub use http::HttpBucketStore;
pub use local::LocalDirectoryStore;
pub use memory::MemoryFileStore;

use async_trait::async_trait;

use crate::error::StoreError;

/// A location files can be written to and read from
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Human-readable destination for log lines
    fn describe(&self) -> String;

    /// Writes `content` at `path`, replacing any existing file
    async fn put(&self, path: &str, content: &[u8]) -> Result<(), StoreError>;

    /// Reads the file at `path`
    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError>;
}

/// Rejects absolute paths and parent-directory escapes
pub(crate) fn validate_relative_path(path: &str) -> Result<(), StoreError> {
    if path.is_empty() {
        return Err(StoreError::InvalidPath("empty path".to_string()));
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(StoreError::InvalidPath(format!("{path} is absolute")));
    }
    if path.split(['/', '\\']).any(|part| part == "..") {
        return Err(StoreError::InvalidPath(format!("{path} escapes the store root")));
    }
    Ok(())
}

//! In-memory store with scripted failures

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::FileStore;
use crate::error::StoreError;

#[derive(Default)]
struct MemoryState {
    files: HashMap<String, Vec<u8>>,
    put_failures: VecDeque<StoreError>,
    get_failures: VecDeque<StoreError>,
    put_attempts: u32,
    get_attempts: u32,
}

/// A store held in a map, for tests and dry runs
///
/// Queued failures are returned by the next calls, in order, before the
/// store behaves normally again.
#[derive(Clone, Default)]
pub struct MemoryFileStore {
    name: String,
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryFileStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    pub async fn fail_puts(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.state.write().await.put_failures.extend(errors);
    }

    pub async fn fail_gets(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.state.write().await.get_failures.extend(errors);
    }

    pub async fn insert(&self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.state.write().await.files.insert(path.into(), content.into());
    }

    pub async fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.read().await.files.get(path).cloned()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.state.read().await.files.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub async fn put_attempts(&self) -> u32 {
        self.state.read().await.put_attempts
    }

    pub async fn get_attempts(&self) -> u32 {
        self.state.read().await.get_attempts
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    fn describe(&self) -> String {
        format!("memory://{}", self.name)
    }

    async fn put(&self, path: &str, content: &[u8]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.put_attempts += 1;
        if let Some(error) = state.put_failures.pop_front() {
            return Err(error);
        }
        state.files.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let mut state = self.state.write().await;
        state.get_attempts += 1;
        if let Some(error) = state.get_failures.pop_front() {
            return Err(error);
        }
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }
}

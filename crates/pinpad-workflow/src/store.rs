//! State store collaborator.
//!
//! Actions persist the in-flight request envelope at defined checkpoints
//! through [`StateStore::save`]. The store is synchronous: saves are small
//! and happen between device calls, never during one.

use crate::error::Result;
use pinpad_core::LinkRequest;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persistence hook for the in-flight request.
pub trait StateStore: Send + Sync {
    /// Persist a snapshot of `request`.
    fn save(&self, request: &LinkRequest) -> Result<()>;
}

/// In-memory store keeping every snapshot, oldest first.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    snapshots: Mutex<Vec<LinkRequest>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saves performed.
    pub fn save_count(&self) -> usize {
        self.snapshots.lock().map(|s| s.len()).unwrap_or_default()
    }

    /// Snapshot of every saved request.
    pub fn snapshots(&self) -> Vec<LinkRequest> {
        self.snapshots
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Most recently saved request.
    pub fn latest(&self) -> Option<LinkRequest> {
        self.snapshots.lock().ok().and_then(|s| s.last().cloned())
    }
}

impl StateStore for MemoryStateStore {
    fn save(&self, request: &LinkRequest) -> Result<()> {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.push(request.clone());
        }
        Ok(())
    }
}

/// Store writing the latest snapshot as pretty JSON, overwriting per save.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back the last saved request.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or does not hold a request.
    pub fn load(&self) -> Result<LinkRequest> {
        let json = std::fs::read_to_string(&self.path)?;
        Ok(LinkRequest::from_json(&json)?)
    }
}

impl StateStore for JsonFileStateStore {
    fn save(&self, request: &LinkRequest) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, request.to_json()?)?;
        tracing::debug!(path = %self.path.display(), request_id = %request.request_id, "state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinpad_core::RequestActionType;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemoryStateStore::new();
        assert_eq!(store.save_count(), 0);
        assert!(store.latest().is_none());

        let request = LinkRequest::new(RequestActionType::GetStatus);
        store.save(&request).unwrap();
        store.save(&request).unwrap();

        assert_eq!(store.save_count(), 2);
        assert_eq!(store.latest().unwrap().request_id, request.request_id);
    }

    #[test]
    fn test_json_store_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("state").join("request.json"));

        let first = LinkRequest::new(RequestActionType::GetStatus);
        let second = LinkRequest::new(RequestActionType::VipaVersions);
        store.save(&first).unwrap();
        store.save(&second).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.request_id, second.request_id);
        assert_eq!(loaded.action, Some(RequestActionType::VipaVersions));
    }

    #[test]
    fn test_json_store_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("missing.json"));
        assert!(store.load().is_err());
    }
}

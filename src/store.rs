//! Store — persistence boundary for the state aggregate
//!
//! The core reads the whole [`State`] at startup and writes it wholesale
//! after each mutation. `JsonFileStore` is the production implementation;
//! `MemoryStore` backs tests (including the save-failure rollback path).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{AccessError, Result};
use crate::schema::State;

/// Wholesale persistence of the access-control aggregate
#[async_trait]
pub trait Store: Send + Sync {
    /// Read the persisted state; a never-written store yields a fresh bootstrap
    async fn load(&self) -> Result<State>;

    /// Persist the full state; must either complete or leave the previous
    /// persisted state intact
    async fn save(&self, state: &State) -> Result<()>;
}

/// JSON file store — one pretty-printed document, replaced atomically
///
/// Writes go to `<path>.tmp` and are renamed over the target, so a crash
/// mid-write never leaves a truncated state file behind.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os = self.path.clone().into_os_string();
        os.push(".tmp");
        PathBuf::from(os)
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn load(&self) -> Result<State> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let state: State = serde_json::from_slice(&bytes)?;
                debug!(path = %self.path.display(), users = state.users.len(), "State loaded");
                Ok(state)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No state file, bootstrapping");
                Ok(State::bootstrap())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &State) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "State saved");
        Ok(())
    }
}

/// In-memory store for tests — cloneable snapshots plus a failure toggle
/// to exercise the caller's rollback path
pub struct MemoryStore {
    state: Mutex<State>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::bootstrap()),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `save` fail with an IO error
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the currently persisted state
    pub fn snapshot(&self) -> Result<State> {
        self.state
            .lock()
            .map(|s| s.clone())
            .map_err(|_| AccessError::Internal("store mutex poisoned".into()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self) -> Result<State> {
        self.snapshot()
    }

    async fn save(&self, state: &State) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AccessError::Io(std::io::Error::other("simulated save failure")));
        }
        let mut guard = self
            .state
            .lock()
            .map_err(|_| AccessError::Internal("store mutex poisoned".into()))?;
        *guard = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let mut state = store.load().await.unwrap();
        state.permissions.insert("read".into());

        store.save(&state).await.unwrap();
        let reloaded = store.load().await.unwrap();
        assert!(reloaded.permissions.contains("read"));
    }

    #[tokio::test]
    async fn test_memory_store_failure_toggle() {
        let store = MemoryStore::new();
        let mut state = store.load().await.unwrap();
        state.permissions.insert("read".into());

        store.set_fail_saves(true);
        assert!(matches!(store.save(&state).await, Err(AccessError::Io(_))));

        // previous contents untouched
        assert!(store.snapshot().unwrap().permissions.is_empty());

        store.set_fail_saves(false);
        store.save(&state).await.unwrap();
        assert!(store.snapshot().unwrap().permissions.contains("read"));
    }
}

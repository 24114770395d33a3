// src/state.rs
//! Last observed fingerprint, durable across restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::PersistError;
use crate::poller::Fingerprint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedState {
    pub fingerprint: Fingerprint,
    pub observed_at: DateTime<Utc>,
}

impl ObservedState {
    pub fn new(fingerprint: Fingerprint, observed_at: DateTime<Utc>) -> Self {
        Self {
            fingerprint,
            observed_at,
        }
    }
}

#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing was stored yet.
    async fn load(&self) -> Result<Option<ObservedState>, PersistError>;
    /// Replace the stored state. Either the old or the new value survives a crash.
    async fn save(&self, state: &ObservedState) -> Result<(), PersistError>;
}

/// JSON record on disk, replaced via write-to-temp + rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn io_err(path: &Path, source: std::io::Error) -> PersistError {
    PersistError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait::async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<Option<ObservedState>, PersistError> {
        match fs::read_to_string(&self.path).await {
            Ok(s) => Ok(Some(serde_json::from_str(&s)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&self.path, e)),
        }
    }

    async fn save(&self, state: &ObservedState) -> Result<(), PersistError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| io_err(dir, e))?;
        }

        let tmp = self.tmp_path();
        let json = serde_json::to_vec_pretty(state)?;
        let mut f = fs::File::create(&tmp)
            .await
            .map_err(|e| io_err(&tmp, e))?;
        f.write_all(&json).await.map_err(|e| io_err(&tmp, e))?;
        f.sync_all().await.map_err(|e| io_err(&tmp, e))?;
        drop(f);

        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

/// In-process store, used by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Option<ObservedState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: ObservedState) -> Self {
        Self {
            inner: Mutex::new(Some(state)),
        }
    }

    pub fn current(&self) -> Option<ObservedState> {
        self.inner.lock().expect("state mutex poisoned").clone()
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<Option<ObservedState>, PersistError> {
        Ok(self.current())
    }

    async fn save(&self, state: &ObservedState) -> Result<(), PersistError> {
        *self.inner.lock().expect("state mutex poisoned") = Some(state.clone());
        Ok(())
    }
}

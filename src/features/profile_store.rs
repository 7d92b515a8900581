//! Profile store: last-visit records keyed by profile handle.
//!
//! The file store keeps every record in one JSON map (by default
//! `~/.profile-scout/profiles.json`). The map is read fresh on every call so a
//! long-running watch never works from a stale copy, and writes go through a
//! temp file + rename so a concurrent reader never sees a partial file.
//! Records are decoded one at a time: a malformed entry reads as "no record"
//! for its own handle and leaves every other profile alone.

use crate::types::PersistedProfileState;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize profile state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("profile store {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot locate home directory for the profile store")]
    NoHomeDir,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, identity: &str) -> Result<Option<PersistedProfileState>, StoreError>;

    /// Replace the record for `identity` wholesale.
    async fn set(&self, identity: &str, state: PersistedProfileState) -> Result<(), StoreError>;

    /// Returns `true` when a record was removed.
    async fn remove(&self, identity: &str) -> Result<bool, StoreError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON file store
// ─────────────────────────────────────────────────────────────────────────────

/// Raw records; each is decoded only when its handle is asked for.
type ProfileMap = BTreeMap<String, serde_json::Value>;

pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at the configured path, or `~/.profile-scout/profiles.json`.
    pub fn from_config(cfg: &crate::core::config::StoreConfig) -> Result<Self, StoreError> {
        cfg.resolve_path().map(Self::new).ok_or(StoreError::NoHomeDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<ProfileMap, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ProfileMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(ProfileMap::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, map: &ProfileMap) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StoreError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let json = serde_json::to_string_pretty(map).map_err(StoreError::Serialize)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait]
impl ProfileStore for JsonFileStore {
    async fn get(&self, identity: &str) -> Result<Option<PersistedProfileState>, StoreError> {
        let mut map = self.load().await?;
        let Some(raw) = map.remove(identity) else {
            return Ok(None);
        };
        match serde_json::from_value(raw) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!("profile_store: record for {} is malformed, ignoring it: {}", identity, e);
                Ok(None)
            }
        }
    }

    async fn set(&self, identity: &str, state: PersistedProfileState) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        debug!(
            "profile_store: {} → count={} ids={}",
            identity,
            state.last_seen_count,
            state.seen_item_ids.as_ref().map_or(0, Vec::len)
        );
        let raw = serde_json::to_value(&state).map_err(StoreError::Serialize)?;
        map.insert(identity.to_string(), raw);
        self.save(&map).await
    }

    async fn remove(&self, identity: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        if map.remove(identity).is_none() {
            return Ok(false);
        }
        self.save(&map).await?;
        info!("profile_store: removed record for {}", identity);
        Ok(true)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, PersistedProfileState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(identity: &str, state: PersistedProfileState) -> Self {
        let mut records = HashMap::new();
        records.insert(identity.to_string(), state);
        Self {
            records: Mutex::new(records),
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get(&self, identity: &str) -> Result<Option<PersistedProfileState>, StoreError> {
        Ok(self.records.lock().await.get(identity).cloned())
    }

    async fn set(&self, identity: &str, state: PersistedProfileState) -> Result<(), StoreError> {
        self.records.lock().await.insert(identity.to_string(), state);
        Ok(())
    }

    async fn remove(&self, identity: &str) -> Result<bool, StoreError> {
        Ok(self.records.lock().await.remove(identity).is_some())
    }
}

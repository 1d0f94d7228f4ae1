//! Durable `source id -> CacheEntry` mapping
//!
//! The whole mapping lives in one JSON file. It is read once per process on
//! first use and rewritten in full (temp file + rename) after every update.
//! A missing file is a first run; an unparsable one is set aside and treated
//! the same way, which makes every source due on the next sync.

use crate::error::{CacheError, Result};
use crate::files;
use crate::types::CacheEntry;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

pub type Registry = BTreeMap<String, CacheEntry>;

/// Flat-file persistence for a [`Registry`]
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted registry, falling back to an empty one
    pub async fn load(&self) -> Registry {
        match self.read().await {
            Ok(registry) => {
                debug!(path = ?self.path, entries = registry.len(), "Registry loaded");
                registry
            }
            Err(CacheError::RegistryCorrupt(msg)) => {
                warn!(path = ?self.path, error = %msg, "Registry is corrupt, starting empty");
                self.quarantine().await;
                Registry::new()
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read registry, starting empty");
                Registry::new()
            }
        }
    }

    async fn read(&self) -> Result<Registry> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = ?self.path, "No registry yet, starting empty");
                return Ok(Registry::new());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|e| CacheError::RegistryCorrupt(e.to_string()))
    }

    /// Keep the unreadable file around for inspection
    async fn quarantine(&self) {
        let target = files::sibling(&self.path, "corrupt");
        if let Err(e) = fs::rename(&self.path, &target).await {
            warn!(path = ?self.path, error = %e, "Failed to quarantine corrupt registry");
        }
    }

    /// Atomically replace the persisted registry
    pub async fn save(&self, registry: &Registry) -> Result<()> {
        let json = serde_json::to_vec_pretty(registry)
            .map_err(|e| CacheError::Registry(e.to_string()))?;

        files::write_atomic(&self.path, &json)
            .await
            .map_err(|e| CacheError::Registry(format!("{}: {}", self.path.display(), e)))
    }
}

/// In-memory registry backed by a [`RegistryStore`]
pub struct CacheRegistry {
    store: RegistryStore,
    entries: OnceCell<Mutex<Registry>>,
}

impl CacheRegistry {
    pub fn new(store: RegistryStore) -> Self {
        Self {
            store,
            entries: OnceCell::new(),
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(RegistryStore::new(path))
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    async fn entries(&self) -> &Mutex<Registry> {
        self.entries
            .get_or_init(|| async { Mutex::new(self.store.load().await) })
            .await
    }

    pub async fn get(&self, source_id: &str) -> Option<CacheEntry> {
        self.entries().await.lock().await.get(source_id).cloned()
    }

    /// Record `entry` and persist the full mapping.
    ///
    /// The lock is held across the write so concurrent updates from
    /// different sources cannot drop each other's entries.
    pub async fn put(&self, source_id: &str, entry: CacheEntry) -> Result<()> {
        let mut registry = self.entries().await.lock().await;
        registry.insert(source_id.to_string(), entry);
        self.store.save(&registry).await
    }

    pub async fn snapshot(&self) -> Registry {
        self.entries().await.lock().await.clone()
    }
}

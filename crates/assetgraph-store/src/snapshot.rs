//! Snapshot persistence for [`MemoryStore`].
//!
//! A snapshot is the store name plus its sorted fact list, bincode-encoded.
//! Nothing else is persisted: indexes and interned ids are rebuilt on load.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{GraphStore, MemoryStore, StoreError, StoreResult, Triple};

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    name: String,
    triples: Vec<Triple>,
}

impl MemoryStore {
    /// Serialize to bytes
    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        let snapshot = Snapshot {
            name: self.name().to_string(),
            triples: self.triples(),
        };
        bincode::serialize(&snapshot).map_err(|e| StoreError::Snapshot(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> StoreResult<Self> {
        let snapshot: Snapshot =
            bincode::deserialize(bytes).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        let mut store = MemoryStore::new(snapshot.name);
        store.load_triples(snapshot.triples);
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &bytes)?;
        tracing::debug!(
            store = %self.name(),
            path = %path.display(),
            facts = self.len(),
            bytes = bytes.len(),
            "saved snapshot"
        );
        Ok(())
    }

    pub fn open(path: &Path) -> StoreResult<Self> {
        let bytes = std::fs::read(path)?;
        let store = Self::from_bytes(&bytes)?;
        tracing::debug!(
            store = %store.name(),
            path = %path.display(),
            facts = store.len(),
            "loaded snapshot"
        );
        Ok(store)
    }
}

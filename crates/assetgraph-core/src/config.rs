//! Graph configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GraphError, Result};

/// Configuration for a [`crate::Graph`] handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Store name, reported by `Display` and prefixed to store errors
    pub name: String,
    /// Minimum age of an event's `finish` timestamp before it is rewritten
    pub event_finish_debounce_ms: u64,
    /// Upper bound on CNAME hops followed while resolving names to addresses
    pub max_alias_hops: usize,
    /// Snapshot file loaded by `Graph::open` and written by `Graph::save_snapshot`
    pub snapshot_path: Option<PathBuf>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            event_finish_debounce_ms: 5_000,
            max_alias_hops: 10,
            snapshot_path: None,
        }
    }
}

impl GraphConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| GraphError::Config(e.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GraphError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.event_finish_debounce_ms = ms;
        self
    }

    pub fn with_max_alias_hops(mut self, hops: usize) -> Self {
        self.max_alias_hops = hops;
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub(crate) fn debounce(&self) -> chrono::Duration {
        // clamped to one year
        let ms = self.event_finish_debounce_ms.min(31_536_000_000);
        chrono::Duration::milliseconds(ms as i64)
    }
}

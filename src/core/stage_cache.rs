//! Per-session, per-stage output cache.
//!
//! Layout: `<root>/<session_id>/<stage>.json`, pretty-printed so cached
//! outputs stay readable and diff-friendly.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use crate::domain::Stage;

/// File-based cache of stage outputs
#[derive(Debug, Clone)]
pub struct StageCache {
    root: PathBuf,
}

impl StageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one session's entries
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Path of the entry for `(session_id, stage)`
    pub fn entry_path(&self, session_id: &str, stage: Stage) -> PathBuf {
        self.session_dir(session_id)
            .join(format!("{}.json", stage.as_str()))
    }

    pub fn contains(&self, session_id: &str, stage: Stage) -> bool {
        self.entry_path(session_id, stage).exists()
    }

    /// Load a cached entry. `Ok(None)` when nothing was cached yet.
    pub async fn load<T: DeserializeOwned>(
        &self,
        session_id: &str,
        stage: Stage,
    ) -> Result<Option<T>> {
        let path = self.entry_path(session_id, stage);

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read cache entry: {}", path.display()))?;

        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cache entry: {}", path.display()))?;

        Ok(Some(value))
    }

    /// Write (or replace) an entry, returning its path
    pub async fn store<T: Serialize>(
        &self,
        session_id: &str,
        stage: Stage,
        value: &T,
    ) -> Result<PathBuf> {
        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;

        let path = self.entry_path(session_id, stage);
        let content = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {} output", stage))?;

        fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write cache entry: {}", path.display()))?;

        Ok(path)
    }
}

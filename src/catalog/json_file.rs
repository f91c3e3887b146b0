//! JSON-file catalog provider.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CatalogState, ComponentRecord, ComponentStore, NewComponent};

/// Catalog provider persisting saved components to a JSON document.
///
/// The whole document is read and rewritten on each mutation, serialized by
/// an internal lock. Fine for the single-process catalog sizes this app
/// deals in.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store backed by the given file path.
    ///
    /// The file is created on first save; a missing file reads as an empty
    /// catalog.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<CatalogState> {
        if !self.path.exists() {
            return Ok(CatalogState::default());
        }
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading catalog file {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing catalog file {}", self.path.display()))
    }

    async fn persist(&self, state: &CatalogState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| *p != Path::new("")) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating catalog directory {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&self.path, raw)
            .await
            .with_context(|| format!("writing catalog file {}", self.path.display()))
    }
}

#[async_trait]
impl ComponentStore for JsonFileStore {
    async fn list(&self) -> Result<Vec<ComponentRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.visible())
    }

    async fn get(&self, id: &str) -> Result<Option<ComponentRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.find(id))
    }

    async fn save(&self, component: NewComponent) -> Result<ComponentRecord> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        let record = component.into_record();
        state.insert(record.clone());
        self.persist(&state).await?;
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        let removed = state.remove(id);
        if removed {
            self.persist(&state).await?;
        }
        Ok(removed)
    }
}

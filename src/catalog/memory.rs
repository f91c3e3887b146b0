//! In-memory catalog provider.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::{CatalogState, ComponentRecord, ComponentStore, NewComponent};

/// Catalog provider holding everything in process memory.
///
/// Saved components are lost on restart; the built-in starters survive
/// because they live in code. This is the default provider.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<CatalogState>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ComponentStore for MemoryStore {
    async fn list(&self) -> Result<Vec<ComponentRecord>> {
        Ok(self.state.read().unwrap().visible())
    }

    async fn get(&self, id: &str) -> Result<Option<ComponentRecord>> {
        Ok(self.state.read().unwrap().find(id))
    }

    async fn save(&self, component: NewComponent) -> Result<ComponentRecord> {
        let record = component.into_record();
        self.state.write().unwrap().insert(record.clone());
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.state.write().unwrap().remove(id))
    }
}

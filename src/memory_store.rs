use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use async_trait::async_trait;
use crate::principal::{PrincipalRecord, PrincipalResolver};
use crate::types::PrincipalId;

/// In-memory principal resolver for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemoryPrincipalStore {
    inner: Arc<RwLock<HashMap<String, PrincipalRecord>>>,
}

impl MemoryPrincipalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record, keyed by its id.
    pub fn insert(&self, record: PrincipalRecord) {
        let mut guard = self.inner.write().expect("poisoned lock");
        guard.insert(record.id.clone(), record);
    }

    /// Removes a record.
    pub fn remove(&self, id: &str) -> Option<PrincipalRecord> {
        let mut guard = self.inner.write().expect("poisoned lock");
        guard.remove(id)
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.inner.read().expect("poisoned lock").len()
    }

    /// Returns whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PrincipalResolver for MemoryPrincipalStore {
    async fn resolve(
        &self,
        id: &PrincipalId,
    ) -> std::result::Result<Option<PrincipalRecord>, crate::ResolverError> {
        let guard = self.inner.read().expect("poisoned lock");
        Ok(guard.get(id.as_str()).cloned())
    }
}

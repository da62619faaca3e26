use std::collections::hash_map::Entry as Slot;
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use ovl_types::{HeaderSet, StoreKey};

use crate::entry::Entry;
use crate::error::{StoreError, StoreResult};
use crate::format::validate_headers;
use crate::traits::EntryStore;

/// In-memory, HashMap-based entry store.
///
/// Intended for tests and embedding. Same contract as the filesystem store:
/// keys are derived from paths, creation is exclusive, headers are
/// validated against the on-disk rules. Bodies are buffered on `set`.
pub struct InMemoryEntryStore {
    entries: RwLock<HashMap<StoreKey, (HeaderSet, Bytes)>>,
}

impl InMemoryEntryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntryStore for InMemoryEntryStore {
    async fn get(&self, path: &str) -> StoreResult<Entry> {
        let map = self.entries.read().expect("lock poisoned");
        match map.get(&StoreKey::derive(path)) {
            Some((headers, body)) => Ok(Entry::from_bytes(headers.clone(), body.clone())),
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    async fn set(&self, path: &str, entry: Entry) -> StoreResult<()> {
        validate_headers(entry.headers())?;
        let key = StoreKey::derive(path);
        if self.entries.read().expect("lock poisoned").contains_key(&key) {
            return Err(StoreError::Exists(path.to_string()));
        }

        let headers = entry.headers().clone();
        let body = Bytes::from(entry.read_body().await?);

        let mut map = self.entries.write().expect("lock poisoned");
        match map.entry(key) {
            Slot::Occupied(_) => Err(StoreError::Exists(path.to_string())),
            Slot::Vacant(slot) => {
                slot.insert((headers, body));
                Ok(())
            }
        }
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        match map.remove(&StoreKey::derive(path)) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }
}

impl std::fmt::Debug for InMemoryEntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEntryStore")
            .field("entry_count", &self.len())
            .finish()
    }
}

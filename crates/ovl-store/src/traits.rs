use async_trait::async_trait;

use crate::entry::Entry;
use crate::error::{StoreError, StoreResult};

/// Path-keyed entry store.
///
/// All implementations must satisfy these invariants:
/// - The storage location of a path is a pure function of the path.
/// - Entries are immutable once created. There is no update; callers
///   delete and then set again.
/// - Concurrent `set` calls for the same path race only at creation:
///   exactly one succeeds and the others fail with [`StoreError::Exists`].
/// - Invalid headers are rejected before anything becomes visible.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Open the entry stored for `path`.
    ///
    /// Every call returns an independent body stream.
    /// Returns [`StoreError::NotFound`] if nothing is stored.
    async fn get(&self, path: &str) -> StoreResult<Entry>;

    /// Create the entry for `path`, consuming the entry's body.
    ///
    /// Returns [`StoreError::Exists`] if an entry is already stored and
    /// [`StoreError::InvalidFormat`] if a header cannot be stored.
    async fn set(&self, path: &str, entry: Entry) -> StoreResult<()>;

    /// Remove the entry for `path`.
    ///
    /// Returns [`StoreError::NotFound`] if nothing is stored.
    async fn delete(&self, path: &str) -> StoreResult<()>;

    /// Check whether an entry is stored for `path`.
    ///
    /// Default implementation opens the entry and drops it.
    async fn contains(&self, path: &str) -> StoreResult<bool> {
        match self.get(path).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

//! Content-addressed entry storage for the overlay proxy.
//!
//! An entry is a header set plus a body, stored under the logical request
//! path it overrides. Paths are never used as filenames directly: each path
//! is hashed into a [`StoreKey`](ovl_types::StoreKey) and the entry lives in
//! a single file named by the key's hex digest.
//!
//! # Storage Backends
//!
//! All backends implement the [`EntryStore`] trait:
//!
//! - [`FsEntryStore`] -- one file per entry under a root directory
//! - [`InMemoryEntryStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Entries are immutable once written. There is no update in place.
//! 2. Exclusive create is the only concurrency control. Stores sharing a
//!    root across processes need no coordination.
//! 3. Headers are validated before any byte reaches storage.
//! 4. Each `get` opens an independent, lazily read body stream.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod entry;
pub mod error;
pub mod format;
pub mod fs;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use entry::{Entry, EntryBody};
pub use error::{StoreError, StoreResult};
pub use fs::{FsEntryStore, WriteMode};
pub use memory::InMemoryEntryStore;
pub use traits::EntryStore;

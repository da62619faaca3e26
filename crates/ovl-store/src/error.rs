/// Errors from entry store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No entry is stored for the path.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// An entry already exists for the path. Entries are never overwritten.
    #[error("entry already exists: {0}")]
    Exists(String),

    /// A header cannot be represented in the on-disk format.
    #[error("invalid header {name:?}: {reason}")]
    InvalidFormat { name: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Domain tag mixed into every key derivation.
const KEY_DOMAIN: &str = "ovl-entry-v1";

/// Content-addressed location of a stored entry.
///
/// A `StoreKey` is the domain-separated BLAKE3 hash of a logical request
/// path. The same path always produces the same key, so arbitrary path
/// strings (slashes, dots, spaces, anything) map onto a flat namespace of
/// filename-safe hex identifiers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey([u8; 32]);

impl StoreKey {
    /// Derive the key for a logical request path.
    pub fn derive(path: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(KEY_DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(path.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Hex-encoded string representation. This is the on-disk filename.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreKey({})", self.short_hex())
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

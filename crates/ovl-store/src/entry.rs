use std::fmt;
use std::io::Cursor;
use std::pin::Pin;

use bytes::Bytes;
use ovl_types::HeaderSet;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Single-pass byte stream of an entry body.
///
/// For entries read from disk the stream owns the open file; dropping it
/// closes the file.
pub type EntryBody = Pin<Box<dyn AsyncRead + Send>>;

/// A stored resource: a header set plus a body stream.
///
/// `Entry` is the unit of storage. It is handed to [`EntryStore::set`] to be
/// persisted and returned by [`EntryStore::get`] with a freshly opened body.
///
/// [`EntryStore::set`]: crate::EntryStore::set
/// [`EntryStore::get`]: crate::EntryStore::get
pub struct Entry {
    headers: HeaderSet,
    body: EntryBody,
}

impl Entry {
    /// Create an entry from headers and any async reader.
    pub fn new(headers: HeaderSet, body: impl AsyncRead + Send + 'static) -> Self {
        Self {
            headers,
            body: Box::pin(body),
        }
    }

    /// Create an entry whose body is held in memory.
    pub fn from_bytes(headers: HeaderSet, body: impl Into<Bytes>) -> Self {
        Self::new(headers, Cursor::new(body.into()))
    }

    /// Header metadata.
    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    /// Split into headers and body stream.
    pub fn into_parts(self) -> (HeaderSet, EntryBody) {
        (self.headers, self.body)
    }

    /// Drain the body into memory.
    pub async fn read_body(mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_bytes_reads_back() {
        let mut headers = HeaderSet::new();
        headers.append("X-Tag", "a");
        let entry = Entry::from_bytes(headers, "hello");
        assert_eq!(entry.headers().get("x-tag"), Some("a"));
        assert_eq!(entry.read_body().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn into_parts_keeps_stream() {
        let entry = Entry::from_bytes(HeaderSet::new(), vec![1u8, 2, 3]);
        let (headers, mut body) = entry.into_parts();
        assert!(headers.is_empty());
        let mut buf = Vec::new();
        body.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
    }

    #[test]
    fn debug_omits_body() {
        let entry = Entry::from_bytes(HeaderSet::new(), "secret");
        let debug = format!("{entry:?}");
        assert!(debug.contains("Entry"));
        assert!(!debug.contains("secret"));
    }
}

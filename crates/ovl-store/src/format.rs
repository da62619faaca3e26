//! On-disk entry format.
//!
//! ```text
//! name: value\n        (zero or more, one line per value)
//! name: value\n
//! \n                   (blank line ends the header block)
//! <raw body bytes>     (copied verbatim, no framing)
//! ```
//!
//! Multi-valued headers repeat the line. The reader trims line terminators
//! and whitespace around values, so `\r\n` line endings also parse.

use ovl_types::HeaderSet;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::{StoreError, StoreResult};

/// Check that every header survives a write/read cycle through the format.
///
/// Runs before any storage side effect so a rejected entry never becomes
/// visible.
pub fn validate_headers(headers: &HeaderSet) -> StoreResult<()> {
    for (name, value) in headers.iter() {
        let reason = if name.is_empty() {
            Some("empty header name")
        } else if name.contains(['\n', '\r']) {
            Some("newline in header name")
        } else if name.contains(':') {
            Some("separator in header name")
        } else if value.contains(['\n', '\r']) {
            Some("newline in header value")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(StoreError::InvalidFormat {
                name: name.to_string(),
                reason: reason.to_string(),
            });
        }
    }
    Ok(())
}

/// Serialize the header block, including the terminating blank line.
pub fn encode_header_block(headers: &HeaderSet) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in headers.iter() {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.push(b'\n');
    }
    out.push(b'\n');
    out
}

/// Read header lines up to and including the blank separator line.
///
/// On return the reader is positioned at the first body byte. A file that
/// ends before the blank line yields the headers read so far and an empty
/// body.
pub async fn read_header_block<R>(reader: &mut R) -> std::io::Result<HeaderSet>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = HeaderSet::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        match parse_header_line(&line) {
            Some((name, value)) => headers.append(name, value),
            None => break,
        }
    }
    Ok(headers)
}

/// Parse one header line. Returns `None` for the blank separator line.
///
/// A line without a `:` separator is kept as a header with an empty value.
/// Names are kept exactly as written; only values are trimmed.
fn parse_header_line(line: &[u8]) -> Option<(String, String)> {
    let line = trim_line_end(line);
    if line.is_empty() {
        return None;
    }
    let (name, value) = match line.iter().position(|&b| b == b':') {
        Some(idx) => (&line[..idx], &line[idx + 1..]),
        None => (line, &[][..]),
    };
    let name = String::from_utf8_lossy(name).into_owned();
    let value = String::from_utf8_lossy(value).trim().to_string();
    Some((name, value))
}

fn trim_line_end(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\n' | b'\r'] = line {
        line = rest;
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, BufReader};

    fn headers(pairs: &[(&str, &str)]) -> HeaderSet {
        pairs.iter().copied().collect()
    }

    #[test]
    fn encode_repeats_multi_valued_headers() {
        let h = headers(&[("Set-Cookie", "a=1"), ("Set-Cookie", "b=2"), ("X", "y")]);
        let block = encode_header_block(&h);
        assert_eq!(block, b"Set-Cookie: a=1\nSet-Cookie: b=2\nX: y\n\n");
    }

    #[test]
    fn encode_empty_set_is_blank_line() {
        assert_eq!(encode_header_block(&HeaderSet::new()), b"\n");
    }

    #[tokio::test]
    async fn read_stops_at_blank_line_and_leaves_body() {
        let data = b"X-Tag: a\nLocation:  https://example.com/x \n\nbody\n\nmore".to_vec();
        let mut reader = BufReader::new(&data[..]);
        let h = read_header_block(&mut reader).await.unwrap();
        assert_eq!(h.get("x-tag"), Some("a"));
        assert_eq!(h.get("location"), Some("https://example.com/x"));
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"body\n\nmore");
    }

    #[tokio::test]
    async fn read_accepts_crlf() {
        let data = b"A: 1\r\nB: 2\r\n\r\nrest".to_vec();
        let mut reader = BufReader::new(&data[..]);
        let h = read_header_block(&mut reader).await.unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.get("b"), Some("2"));
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"rest");
    }

    #[tokio::test]
    async fn line_without_separator_has_empty_value() {
        let data = b"Orphan\nA: 1\n\n".to_vec();
        let mut reader = BufReader::new(&data[..]);
        let h = read_header_block(&mut reader).await.unwrap();
        assert_eq!(h.get("Orphan"), Some(""));
        assert_eq!(h.get("A"), Some("1"));
    }

    #[tokio::test]
    async fn name_is_kept_as_written() {
        let data = b"X : padded
 Lead: y

".to_vec();
        let mut reader = BufReader::new(&data[..]);
        let h = read_header_block(&mut reader).await.unwrap();
        let pairs: Vec<_> = h.iter().collect();
        assert_eq!(pairs, vec![("X ", "padded"), (" Lead", "y")]);
    }

    #[tokio::test]
    async fn value_keeps_inner_colons() {
        let data = b"Location: http://host:8080/p\n\n".to_vec();
        let mut reader = BufReader::new(&data[..]);
        let h = read_header_block(&mut reader).await.unwrap();
        assert_eq!(h.get("location"), Some("http://host:8080/p"));
    }

    #[tokio::test]
    async fn truncated_block_yields_empty_body() {
        let data = b"A: 1\n".to_vec();
        let mut reader = BufReader::new(&data[..]);
        let h = read_header_block(&mut reader).await.unwrap();
        assert_eq!(h.get("a"), Some("1"));
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn validate_rejects_newlines() {
        let err = validate_headers(&headers(&[("X", "a\nb")])).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFormat { .. }));
        let err = validate_headers(&headers(&[("X\nY", "a")])).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFormat { .. }));
        let err = validate_headers(&headers(&[("X", "a\r")])).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFormat { .. }));
    }

    #[test]
    fn validate_rejects_unparseable_names() {
        assert!(validate_headers(&headers(&[("", "a")])).is_err());
        assert!(validate_headers(&headers(&[("A:B", "c")])).is_err());
    }

    #[test]
    fn validate_accepts_ordinary_headers() {
        let h = headers(&[("Content-Type", "text/plain; charset=utf-8"), ("Status", "201")]);
        assert!(validate_headers(&h).is_ok());
    }
}

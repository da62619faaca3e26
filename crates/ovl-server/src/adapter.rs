//! HTTP face of the entry store.
//!
//! `GET` serves an entry, `PUT` creates one from the request, `DELETE`
//! removes one. The request path is the store key.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use ovl_store::{Entry, EntryStore, StoreError};
use ovl_types::HeaderSet;
use tokio_stream::StreamExt;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::log::{Outcome, RequestLog, Source};

/// Request headers that describe the inbound connection rather than the
/// resource, and so are never persisted.
pub const STRIPPED_HEADERS: &[&str] = &[
    "user-agent",
    "accept",
    "accept-encoding",
    "date",
    "transfer-encoding",
    "host",
    "connection",
];

/// Entry pseudo-header that sets the response status.
pub const STATUS_HEADER: &str = "status";

/// Translates HTTP requests into [`EntryStore`] calls.
#[derive(Clone)]
pub struct StoreAdapter {
    store: Arc<dyn EntryStore>,
    log: Arc<dyn RequestLog>,
}

impl StoreAdapter {
    pub fn new(store: Arc<dyn EntryStore>, log: Arc<dyn RequestLog>) -> Self {
        Self { store, log }
    }

    pub async fn handle(&self, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        let path = parts.uri.path();
        match parts.method {
            Method::GET => self.get(path).await,
            Method::PUT => self.put(path, &parts.headers, body).await,
            Method::DELETE => self.delete(path).await,
            ref other => self.respond_error(other, path, StatusCode::METHOD_NOT_ALLOWED, None),
        }
    }

    async fn get(&self, path: &str) -> Response {
        let entry = match self.store.get(path).await {
            Ok(entry) => entry,
            Err(e) => return self.respond_error(&Method::GET, path, status_for(&e), Some(&e)),
        };
        let (headers, body) = entry.into_parts();
        let (status, header_map) = response_head(&headers);
        self.log
            .record(&Outcome::new(Source::Store, &Method::GET, path, status));

        // The stream owns the open entry; hyper drops it when the copy ends.
        let logged_path = path.to_string();
        let stream = ReaderStream::new(body).map(move |chunk| {
            if let Err(e) = &chunk {
                tracing::warn!(path = %logged_path, error = %e, "entry body copy failed");
            }
            chunk
        });
        let mut response = Response::new(Body::from_stream(stream));
        *response.status_mut() = status;
        *response.headers_mut() = header_map;
        response
    }

    async fn put(&self, path: &str, request_headers: &HeaderMap, body: Body) -> Response {
        let headers = entry_headers(request_headers);
        let stream = body
            .into_data_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        let entry = Entry::new(headers, StreamReader::new(stream));

        match self.store.set(path, entry).await {
            Ok(()) => {
                self.log
                    .record(&Outcome::new(Source::Store, &Method::PUT, path, StatusCode::NO_CONTENT));
                StatusCode::NO_CONTENT.into_response()
            }
            Err(e) => self.respond_error(&Method::PUT, path, status_for(&e), Some(&e)),
        }
    }

    async fn delete(&self, path: &str) -> Response {
        match self.store.delete(path).await {
            Ok(()) => {
                self.log.record(&Outcome::new(
                    Source::Store,
                    &Method::DELETE,
                    path,
                    StatusCode::NO_CONTENT,
                ));
                StatusCode::NO_CONTENT.into_response()
            }
            Err(e) => self.respond_error(&Method::DELETE, path, status_for(&e), Some(&e)),
        }
    }

    fn respond_error(
        &self,
        method: &Method,
        path: &str,
        status: StatusCode,
        err: Option<&StoreError>,
    ) -> Response {
        let mut outcome = Outcome::new(Source::Store, method, path, status);
        if let Some(e) = err {
            outcome = outcome.with_detail(e);
        }
        self.log.record(&outcome);
        error_response(status)
    }
}

/// Axum handler serving every path from the adapter in state.
pub async fn handle(State(adapter): State<StoreAdapter>, req: Request) -> Response {
    adapter.handle(req).await
}

/// Total mapping from store failures to HTTP statuses.
pub fn status_for(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Exists(_) => StatusCode::CONFLICT,
        StoreError::InvalidFormat { .. } | StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Plain-text error body: the status reason phrase.
pub fn error_response(status: StatusCode) -> Response {
    let reason = status.canonical_reason().unwrap_or("");
    (status, format!("{reason}\n")).into_response()
}

/// Status and headers to serve for a stored entry.
///
/// A valid `Status` pseudo-header wins; otherwise a `Location` header makes
/// the entry a permanent redirect; otherwise 200. The pseudo-header itself
/// is never sent.
fn response_head(headers: &HeaderSet) -> (StatusCode, HeaderMap) {
    let mut explicit = None;
    let mut has_location = false;
    let mut map = HeaderMap::new();

    for (name, value) in headers.iter() {
        if name.eq_ignore_ascii_case(STATUS_HEADER) {
            explicit = explicit.or_else(|| parse_status(value));
            continue;
        }
        if name.eq_ignore_ascii_case("location") {
            has_location = true;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                map.append(n, v);
            }
            _ => tracing::warn!(header = name, "skipping stored header that is not valid HTTP"),
        }
    }

    let status = explicit.unwrap_or(if has_location {
        StatusCode::PERMANENT_REDIRECT
    } else {
        StatusCode::OK
    });
    (status, map)
}

fn parse_status(value: &str) -> Option<StatusCode> {
    if value.len() != 3 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let code: u16 = value.parse().ok()?;
    if !(100..600).contains(&code) {
        return None;
    }
    StatusCode::from_u16(code).ok()
}

/// Request headers minus the connection artifacts, as an entry header set.
fn entry_headers(request_headers: &HeaderMap) -> HeaderSet {
    request_headers
        .iter()
        .filter(|(name, _)| !STRIPPED_HEADERS.contains(&name.as_str()))
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

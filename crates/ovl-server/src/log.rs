use std::fmt;
use std::sync::Mutex;

use axum::http::{Method, StatusCode};

/// Which component produced an outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// The store adapter answered the request.
    Store,
    /// The overlay decided hit or miss.
    Overlay,
    /// The origin answered a forwarded miss.
    Origin,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Overlay => write!(f, "overlay"),
            Self::Origin => write!(f, "origin"),
        }
    }
}

/// One logged request outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub source: Source,
    pub method: Method,
    pub path: String,
    pub status: StatusCode,
    pub detail: Option<String>,
}

impl Outcome {
    pub fn new(source: Source, method: &Method, path: &str, status: StatusCode) -> Self {
        Self {
            source,
            method: method.clone(),
            path: path.to_string(),
            status,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl fmt::Display) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}

/// Sink for request outcomes.
///
/// Passed to each component at construction so embedders and tests decide
/// where outcomes go.
pub trait RequestLog: Send + Sync {
    fn record(&self, outcome: &Outcome);
}

/// Emits outcomes as `tracing` events.
pub struct TracingLog;

impl RequestLog for TracingLog {
    fn record(&self, o: &Outcome) {
        let detail = o.detail.as_deref().unwrap_or("");
        if o.status.is_server_error() {
            tracing::error!(source = %o.source, method = %o.method, path = %o.path, status = o.status.as_u16(), detail);
        } else if o.status.is_client_error() && o.status != StatusCode::NOT_FOUND {
            tracing::warn!(source = %o.source, method = %o.method, path = %o.path, status = o.status.as_u16(), detail);
        } else {
            tracing::info!(source = %o.source, method = %o.method, path = %o.path, status = o.status.as_u16(), detail);
        }
    }
}

/// Discards every outcome.
pub struct NullLog;

impl RequestLog for NullLog {
    fn record(&self, _outcome: &Outcome) {}
}

/// Keeps outcomes in memory, in arrival order.
#[derive(Default)]
pub struct MemoryLog {
    outcomes: Mutex<Vec<Outcome>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().expect("lock poisoned").clone()
    }

    /// Recorded outcomes from one component.
    pub fn from_source(&self, source: Source) -> Vec<Outcome> {
        self.outcomes()
            .into_iter()
            .filter(|o| o.source == source)
            .collect()
    }
}

impl RequestLog for MemoryLog {
    fn record(&self, outcome: &Outcome) {
        self.outcomes
            .lock()
            .expect("lock poisoned")
            .push(outcome.clone());
    }
}

impl fmt::Debug for MemoryLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLog")
            .field("outcomes", &self.outcomes().len())
            .finish()
    }
}

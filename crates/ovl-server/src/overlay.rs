//! Hit/miss dispatch between the local store and the origin.
//!
//! Every `GET` is first answered by the wrapped handler into a
//! [`ShadowResponse`]. A 404 there is a miss: the shadow is dropped unseen
//! and the request goes to the origin instead. Anything else is replayed to
//! the client as-is. Other methods pass straight through to the wrapped
//! handler and never reach the origin.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::adapter::error_response;
use crate::log::{Outcome, RequestLog, Source};
use crate::origin::OriginTransport;
use crate::shadow::ShadowResponse;

/// Shared state of the overlay middleware: where misses go, where outcomes
/// are logged, and how much of a local answer to hold before deciding.
#[derive(Clone)]
pub struct Overlay {
    origin: Arc<dyn OriginTransport>,
    log: Arc<dyn RequestLog>,
    max_shadow_bytes: Option<usize>,
}

impl Overlay {
    /// Overlay forwarding misses to `origin`, with unbounded shadow buffering.
    pub fn new(origin: Arc<dyn OriginTransport>, log: Arc<dyn RequestLog>) -> Self {
        Self {
            origin,
            log,
            max_shadow_bytes: None,
        }
    }

    /// Bound how much of a local response is held in memory before the
    /// hit/miss decision.
    pub fn with_shadow_limit(mut self, limit: Option<usize>) -> Self {
        self.max_shadow_bytes = limit;
        self
    }

    async fn get(&self, req: Request, next: Next) -> Response {
        let path = req.uri().path().to_string();
        let (parts, body) = req.into_parts();

        // The origin may need the same body after the local attempt.
        let body = match to_bytes(body, usize::MAX).await {
            Ok(body) => body,
            Err(e) => {
                self.record(&path, StatusCode::BAD_REQUEST, e);
                return error_response(StatusCode::BAD_REQUEST);
            }
        };

        let local = Request::from_parts(parts.clone(), Body::from(body.clone()));
        let shadow = match ShadowResponse::capture(next.run(local).await, self.max_shadow_bytes).await {
            Ok(shadow) => shadow,
            Err(e) => {
                self.record(&path, StatusCode::INTERNAL_SERVER_ERROR, e);
                return error_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        if shadow.is_miss() {
            drop(shadow);
            self.record(&path, StatusCode::NOT_FOUND, "miss");
            return self
                .origin
                .forward(Request::from_parts(parts, Body::from(body)))
                .await;
        }

        self.record(&path, shadow.status(), "hit");
        shadow.into_response()
    }

    fn record(&self, path: &str, status: StatusCode, detail: impl std::fmt::Display) {
        self.log.record(
            &Outcome::new(Source::Overlay, &Method::GET, path, status).with_detail(detail),
        );
    }
}

/// Middleware entry point, installed with
/// [`axum::middleware::from_fn_with_state`].
pub async fn dispatch(State(overlay): State<Overlay>, req: Request, next: Next) -> Response {
    if req.method() != Method::GET {
        return next.run(req).await;
    }
    overlay.get(req, next).await
}

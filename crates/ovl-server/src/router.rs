use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::adapter::{self, StoreAdapter};
use crate::overlay::{self, Overlay};

/// Build the overlay router: every path is served by the store adapter,
/// wrapped in the overlay so `GET` misses fall through to the origin.
///
/// A request that is not answered within `request_timeout` gets 408.
pub fn build_router(store: StoreAdapter, overlay: Overlay, request_timeout: Duration) -> Router {
    Router::new()
        .fallback(adapter::handle)
        .with_state(store)
        .layer(from_fn_with_state(overlay, overlay::dispatch))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::{Method, StatusCode};
    use axum::response::{IntoResponse, Response};
    use ovl_store::InMemoryEntryStore;
    use tower::util::ServiceExt;

    use crate::log::MemoryLog;
    use crate::origin::OriginTransport;

    /// Origin that never answers in time.
    struct StalledOrigin;

    #[async_trait]
    impl OriginTransport for StalledOrigin {
        async fn forward(&self, _req: Request) -> Response {
            tokio::time::sleep(Duration::from_secs(30)).await;
            (StatusCode::OK, "too late").into_response()
        }
    }

    fn app(timeout: Duration) -> Router {
        let log = Arc::new(MemoryLog::new());
        build_router(
            StoreAdapter::new(Arc::new(InMemoryEntryStore::new()), log.clone()),
            Overlay::new(Arc::new(StalledOrigin), log),
            timeout,
        )
    }

    fn request(method: Method, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn slow_request_times_out() {
        let resp = app(Duration::from_millis(50))
            .oneshot(request(Method::GET, "/slow"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn fast_request_is_unaffected() {
        let resp = app(Duration::from_millis(50))
            .oneshot(request(Method::DELETE, "/absent"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

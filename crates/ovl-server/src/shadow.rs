use axum::body::{Body, BodyDataStream};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use tokio_stream::StreamExt;

/// Failure while buffering a shadowed response.
#[derive(Debug, thiserror::Error)]
#[error("failed to read shadowed response body: {0}")]
pub struct CaptureError(#[from] axum::Error);

/// A response held back from the client until the overlay decides what to
/// do with it.
///
/// Capturing drains the wrapped handler's response into memory: status,
/// headers and body. Nothing reaches the client until the value is turned
/// back into a response with [`IntoResponse`], and dropping it discards
/// every captured byte.
///
/// With a byte limit, buffering stops once the limit is reached and the
/// unread remainder is kept as a stream ("spilled"). Replaying a spilled
/// response sends the buffered prefix followed by the rest of the stream.
pub struct ShadowResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    spilled: Option<BodyDataStream>,
}

impl ShadowResponse {
    /// Buffer `response`. With a `limit`, stops reading once the buffer holds
    /// at least that many bytes.
    pub async fn capture(response: Response, limit: Option<usize>) -> Result<Self, CaptureError> {
        let (parts, body) = response.into_parts();
        let mut stream = body.into_data_stream();
        let mut buf = BytesMut::new();
        let mut spilled = None;

        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
            if limit.is_some_and(|limit| buf.len() >= limit) {
                spilled = Some(stream);
                break;
            }
        }

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body: buf.freeze(),
            spilled,
        })
    }

    /// Status the wrapped handler answered with.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// A 404 from the wrapped handler means the overlay has no answer.
    pub fn is_miss(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

impl std::fmt::Debug for ShadowResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("buffered", &self.body.len())
            .field("spilled", &self.spilled.is_some())
            .finish()
    }
}

impl IntoResponse for ShadowResponse {
    fn into_response(self) -> Response {
        let body = match self.spilled {
            None => Body::from(self.body),
            Some(rest) => {
                let prefix = tokio_stream::once(Ok::<_, axum::Error>(self.body));
                Body::from_stream(prefix.chain(rest))
            }
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

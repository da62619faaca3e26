//! Forward leg to the remote origin.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, Request};
use axum::http::header::{self, HeaderValue};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::adapter::error_response;
use crate::config::OriginConfig;
use crate::error::ServerResult;
use crate::log::{Outcome, RequestLog, Source};

/// Headers that only describe a single hop and never cross the proxy.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Something that can answer a request the overlay could not.
///
/// Implementations never fail: transport problems become a response.
#[async_trait]
pub trait OriginTransport: Send + Sync {
    async fn forward(&self, req: Request) -> Response;
}

/// Reverse-proxies requests to a fixed origin over HTTP(S).
pub struct HttpOrigin {
    client: reqwest::Client,
    config: OriginConfig,
    log: Arc<dyn RequestLog>,
}

impl HttpOrigin {
    pub fn new(config: &OriginConfig, log: Arc<dyn RequestLog>) -> ServerResult<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
            log,
        })
    }

    /// The origin URL for an inbound request: scheme and authority replaced,
    /// path and query kept.
    pub fn target_url(&self, uri: &Uri) -> String {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("{}{}", self.config.base_url(), path_and_query)
    }

    async fn send(&self, req: Request) -> ServerResult<Response> {
        let client_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let (parts, body) = req.into_parts();
        let url = self.target_url(&parts.uri);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        if !self.config.preserve_host {
            headers.remove(header::HOST);
        }
        if let Some(ip) = client_ip {
            append_forwarded_for(&mut headers, ip);
        }
        let body = to_bytes(body, usize::MAX).await?;

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(StatusCode::NOT_FOUND.into_response());
        }

        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

#[async_trait]
impl OriginTransport for HttpOrigin {
    async fn forward(&self, req: Request) -> Response {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        match self.send(req).await {
            Ok(response) => {
                self.log
                    .record(&Outcome::new(Source::Origin, &method, &path, response.status()));
                response
            }
            Err(e) => {
                self.log.record(
                    &Outcome::new(Source::Origin, &method, &path, StatusCode::BAD_GATEWAY)
                        .with_detail(&e),
                );
                error_response(StatusCode::BAD_GATEWAY)
            }
        }
    }
}

impl std::fmt::Debug for HttpOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOrigin")
            .field("base", &self.config.base_url())
            .field("preserve_host", &self.config.preserve_host)
            .finish()
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();
    for name in listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let value = if prior.is_empty() {
        ip.to_string()
    } else {
        format!("{}, {ip}", prior.join(", "))
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert("x-forwarded-for", value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use axum::Router;
    use tokio::net::TcpListener;

    use crate::config::Scheme;
    use crate::log::MemoryLog;

    /// Origin that echoes what it received.
    async fn echo(req: Request) -> Response {
        let (parts, body) = req.into_parts();
        if parts.uri.path() == "/absent" {
            return (StatusCode::NOT_FOUND, [("x-leak", "1")], "origin says no").into_response();
        }
        let mut names: Vec<&str> = parts.headers.keys().map(|n| n.as_str()).collect();
        names.sort();
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let xff = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = to_bytes(body, usize::MAX).await.unwrap();
        let text = format!(
            "{} {}\nhost={host}\nxff={xff}\nheaders={}\nbody={}",
            parts.method,
            parts.uri,
            names.join(","),
            String::from_utf8_lossy(&body)
        );
        (StatusCode::ACCEPTED, [("x-origin", "yes")], text).into_response()
    }

    async fn spawn_origin() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().fallback(echo)).await.unwrap();
        });
        addr
    }

    fn config_for(addr: SocketAddr) -> OriginConfig {
        OriginConfig {
            host: addr.to_string(),
            scheme: Scheme::Http,
            ..OriginConfig::default()
        }
    }

    async fn text(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn target_url_keeps_path_and_query() {
        let origin = HttpOrigin::new(
            &OriginConfig {
                host: "10.1.2.3:8443".into(),
                ..OriginConfig::default()
            },
            Arc::new(MemoryLog::new()),
        )
        .unwrap();
        let uri: Uri = "http://overlay.local/a/b?x=1&y=2".parse().unwrap();
        assert_eq!(origin.target_url(&uri), "https://10.1.2.3:8443/a/b?x=1&y=2");
        let bare: Uri = "/".parse().unwrap();
        assert_eq!(origin.target_url(&bare), "https://10.1.2.3:8443/");
    }

    #[test]
    fn strips_connection_listed_headers() {
        let mut h = HeaderMap::new();
        h.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, X-Secret"));
        h.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        h.insert("x-secret", HeaderValue::from_static("s"));
        h.insert(header::PROXY_AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        h.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        h.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        strip_hop_by_hop(&mut h);
        assert_eq!(h.len(), 1);
        assert!(h.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn forwarded_for_appends_to_existing_chain() {
        let mut h = HeaderMap::new();
        append_forwarded_for(&mut h, "192.0.2.7".parse().unwrap());
        assert_eq!(h["x-forwarded-for"], "192.0.2.7");
        append_forwarded_for(&mut h, "198.51.100.1".parse().unwrap());
        assert_eq!(h["x-forwarded-for"], "192.0.2.7, 198.51.100.1");
    }

    #[tokio::test]
    async fn forwards_request_and_streams_response() {
        let addr = spawn_origin().await;
        let log = Arc::new(MemoryLog::new());
        let origin = HttpOrigin::new(&config_for(addr), log.clone()).unwrap();

        let mut req = Request::builder()
            .method(Method::GET)
            .uri("/docs/page?lang=en")
            .header(header::HOST, "overlay.test")
            .header("x-forwarded-for", "10.0.0.1")
            .header(header::CONNECTION, "x-secret")
            .header("x-secret", "s")
            .header(header::PROXY_AUTHORIZATION, "Basic abc")
            .body(Body::from("query"))
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("192.0.2.7:5555".parse::<SocketAddr>().unwrap()));

        let resp = origin.forward(req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(resp.headers()["x-origin"], "yes");
        let body = text(resp).await;
        assert!(body.starts_with("GET /docs/page?lang=en\n"), "{body}");
        assert!(body.contains("host=overlay.test\n"), "{body}");
        assert!(body.contains("xff=10.0.0.1, 192.0.2.7\n"), "{body}");
        assert!(!body.contains("x-secret"), "{body}");
        assert!(!body.contains("proxy-authorization"), "{body}");
        assert!(body.ends_with("body=query"), "{body}");

        let outcome = &log.from_source(Source::Origin)[0];
        assert_eq!(outcome.status, StatusCode::ACCEPTED);
        assert_eq!(outcome.path, "/docs/page");
    }

    #[tokio::test]
    async fn host_is_rewritten_when_not_preserved() {
        let addr = spawn_origin().await;
        let mut config = config_for(addr);
        config.preserve_host = false;
        let origin = HttpOrigin::new(&config, Arc::new(MemoryLog::new())).unwrap();

        let req = Request::builder()
            .uri("/h")
            .header(header::HOST, "overlay.test")
            .body(Body::empty())
            .unwrap();
        let body = text(origin.forward(req).await).await;
        assert!(body.contains(&format!("host={addr}\n")), "{body}");
    }

    #[tokio::test]
    async fn origin_not_found_is_blanked() {
        let addr = spawn_origin().await;
        let origin = HttpOrigin::new(&config_for(addr), Arc::new(MemoryLog::new())).unwrap();

        let req = Request::builder().uri("/absent").body(Body::empty()).unwrap();
        let resp = origin.forward(req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.headers().get("x-leak").is_none());
        assert_eq!(text(resp).await, "");
    }

    #[tokio::test]
    async fn unreachable_origin_is_bad_gateway() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let log = Arc::new(MemoryLog::new());
        let origin = HttpOrigin::new(&config_for(addr), log.clone()).unwrap();
        let req = Request::builder().uri("/x").body(Body::empty()).unwrap();
        let resp = origin.forward(req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(text(resp).await, "Bad Gateway\n");

        let outcome = &log.outcomes()[0];
        assert_eq!(outcome.source, Source::Origin);
        assert_eq!(outcome.status, StatusCode::BAD_GATEWAY);
        assert!(outcome.detail.is_some());
    }
}

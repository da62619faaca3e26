use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use ovl_store::FsEntryStore;
use tokio::net::TcpListener;

use crate::adapter::StoreAdapter;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::log::{RequestLog, TracingLog};
use crate::origin::HttpOrigin;
use crate::overlay::Overlay;
use crate::router::build_router;

/// Overlay proxy server: a file-backed store in front of one origin.
pub struct OverlayServer {
    config: ServerConfig,
    log: Arc<dyn RequestLog>,
}

impl OverlayServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            log: Arc::new(TracingLog),
        }
    }

    /// Replace the default `tracing` request log.
    pub fn with_log(mut self, log: Arc<dyn RequestLog>) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the store and build the router (useful for testing).
    pub async fn router(&self) -> ServerResult<axum::Router> {
        let store = FsEntryStore::open(&self.config.store_root, self.config.write_mode).await?;
        tracing::debug!(root = %store.root().display(), mode = ?store.mode(), "entry store opened");
        let origin = HttpOrigin::new(&self.config.origin, self.log.clone())?;
        let adapter = StoreAdapter::new(Arc::new(store), self.log.clone());
        let overlay = Overlay::new(Arc::new(origin), self.log.clone())
            .with_shadow_limit(self.config.max_shadow_bytes);
        Ok(build_router(adapter, overlay, self.config.request_timeout))
    }

    /// Serve until the process is killed.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_listener(listener, signal).await
    }

    /// Serve on an already bound listener until `signal` resolves. In-flight
    /// requests are allowed to finish.
    pub async fn serve_listener<F>(self, listener: TcpListener, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.config.validate()?;
        let app = self.router().await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            origin = %self.config.origin.base_url(),
            store = %self.config.store_root.display(),
            "overlay listening"
        );
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(signal)
            .await?;
        tracing::info!("overlay stopped");
        Ok(())
    }
}

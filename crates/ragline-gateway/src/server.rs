use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use ragline_core::{KnowledgeBase, Orchestrator, SettingsStore};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::router::build_router;

/// Multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub knowledge: Arc<KnowledgeBase>,
    pub settings: Arc<SettingsStore>,
    /// Cancelled on shutdown; every open chat stream holds a child token.
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        knowledge: Arc<KnowledgeBase>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            orchestrator,
            knowledge,
            settings,
            shutdown: CancellationToken::new(),
            started_at: Instant::now(),
        }
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    max_body_size: usize,
    state: AppState,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(bind: &str, port: u16, state: AppState, shutdown_rx: watch::Receiver<bool>) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("server binding to 0.0.0.0, the API has no authentication");
        }

        Self {
            addr,
            max_body_size: 50 * 1024 * 1024 + MULTIPART_OVERHEAD,
            state,
            shutdown_rx,
        }
    }

    /// Limit for request bodies, given the largest accepted upload.
    #[must_use]
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes.saturating_add(MULTIPART_OVERHEAD);
        self
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until the shutdown channel flips to `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let streams = self.state.shutdown.clone();
        let router = build_router(self.state, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("ragline listening on http://{}/api/v1", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow_and_update() {
                    if shutdown_rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                tracing::info!("server shutting down");
                streams.cancel();
            })
            .await
            .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}

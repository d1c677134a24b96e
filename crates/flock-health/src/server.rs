//! Health check HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use flock_metrics::MetricsRegistry;

use crate::probe::ReadinessProbe;

#[derive(Clone)]
struct HealthState {
    probe: Arc<dyn ReadinessProbe>,
    metrics: Option<Arc<MetricsRegistry>>,
}

/// Serves `/healthz`, `/readyz`, and (when a registry is attached)
/// `/metrics`.
pub struct HealthServer {
    addr: SocketAddr,
    state: HealthState,
}

impl HealthServer {
    pub fn new(addr: SocketAddr, probe: Arc<dyn ReadinessProbe>) -> Self {
        Self {
            addr,
            state: HealthState {
                probe,
                metrics: None,
            },
        }
    }

    /// Expose a metrics registry on `/metrics`.
    pub fn with_metrics(mut self, registry: Arc<MetricsRegistry>) -> Self {
        self.state.metrics = Some(registry);
        self
    }

    fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/healthz", get(healthz))
            .route("/readyz", get(readyz));
        if self.state.metrics.is_some() {
            router = router.route("/metrics", get(metrics));
        }
        router.with_state(self.state.clone())
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` fires.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        info!(addr = %listener.local_addr()?, "health server listening");

        let router = self.router();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
                info!("health server shutting down");
            })
            .await?;
        Ok(())
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok\n")
}

async fn readyz(State(state): State<HealthState>) -> impl IntoResponse {
    if state.probe.is_ready() {
        (StatusCode::OK, "ok\n")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready\n")
    }
}

async fn metrics(State(state): State<HealthState>) -> impl IntoResponse {
    // Only routed when a registry is attached.
    let body = state.metrics.as_ref().map(|m| m.render()).unwrap_or_default();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

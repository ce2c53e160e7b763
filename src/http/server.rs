//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the redirect handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Map the request host to a site root and resolve the request

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RedirectsConfig;
use crate::http::request::{request_host, SiteMap, X_REQUEST_ID};
use crate::http::response;
use crate::routing::ResolutionEngine;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ResolutionEngine>,
    pub sites: Arc<SiteMap>,
}

/// HTTP server answering redirect traffic.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &RedirectsConfig, engine: Arc<ResolutionEngine>) -> Self {
        let state = AppState {
            engine,
            sites: Arc::new(SiteMap::from_config(&config.sites)),
        };
        let router = Self::build_router(state, Duration::from_secs(config.timeouts.request_secs));
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);
        Router::new()
            .fallback(redirect_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Resolve the request and answer with a redirect or 404.
async fn redirect_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let root = state.sites.root_for(request_host(&request));
    let uri = request.uri().clone();
    let path = uri.path();
    let query = uri.query().unwrap_or_default();

    match state.engine.resolve(root, path, query).await {
        Some(resolution) => response::redirect(&resolution),
        None => {
            tracing::debug!(path = %path, root = ?root, "No redirect matched");
            response::not_found()
        }
    }
}

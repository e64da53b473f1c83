//! HTTP API: axum router over a [`DuckStore`], JSON envelope, error mapping.
//!
//! ## Endpoints
//!
//! - `GET /health`
//! - `GET /api/stats` - row counts per table and status
//! - `GET /api/comments` - filtered, paginated listing
//! - `GET /api/comments/:id` - one normalised comment
//! - `GET /api/entities` - ranked entities (precomputed or mined)
//! - `GET /api/themes` - precomputed themes
//! - `GET /api/export` - every completed analysis, up to the export ceiling

mod envelope;
mod error;
mod routes;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::routing::get;
use commentscope_store::{Capabilities, DuckStore, StoreError};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use envelope::ApiResponse;
pub use error::ApiError;

/// Shared server state: the root connection and the startup capability probe.
#[derive(Clone)]
pub struct AppState {
    root: Arc<Mutex<DuckStore>>,
    caps: Capabilities,
}

impl AppState {
    /// Wrap a store, probing its optional tables once.
    pub fn new(store: DuckStore) -> Self {
        let caps = store.probe_capabilities();
        Self {
            root: Arc::new(Mutex::new(store)),
            caps,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// A connection owned by one request, closed when dropped.
    fn session(&self) -> Result<DuckStore, ApiError> {
        let root = self
            .root
            .lock()
            .map_err(|_| ApiError::Internal("store lock poisoned".into()))?;
        Ok(root.try_clone()?)
    }

    /// Run `f` on a fresh session on the blocking pool.
    async fn with_store<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut DuckStore) -> Result<T, StoreError> + Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut store = state.session()?;
            f(&mut store).map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("request task failed: {e}")))?
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/stats", get(routes::stats))
        .route("/api/comments", get(routes::list_comments))
        .route("/api/comments/:id", get(routes::get_comment))
        .route("/api/entities", get(routes::entities))
        .route("/api/themes", get(routes::themes))
        .route("/api/export", get(routes::export))
        .fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, entities = ?state.caps.entities, "commentscope API listening");
    axum::serve(listener, router(state)).await
}

//! HTTP surface for the duplicate scanner and storage statistics.

pub mod error;
pub mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::io;
use std::sync::Arc;
use storage_toolkit_core::config::AnalysisConfig;
use storage_toolkit_core::{ObjectStore, ScanEngine, StatisticsAggregator};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const API_PREFIX: &str = "/api/v1alpha1";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ScanEngine>,
    pub statistics: Arc<StatisticsAggregator>,
}

impl AppState {
    pub fn new(engine: ScanEngine) -> Self {
        let statistics = StatisticsAggregator::new(Arc::clone(engine.store()));
        Self {
            engine: Arc::new(engine),
            statistics: Arc::new(statistics),
        }
    }

    pub fn from_store(store: Arc<dyn ObjectStore>, analysis: AnalysisConfig) -> Self {
        Self::new(ScanEngine::new(store).with_analysis_config(analysis))
    }
}

pub fn create_app(state: AppState) -> Router {
    use handlers::{duplicates, statistics};

    let api = Router::new()
        .route(
            "/duplicates",
            get(duplicates::list_duplicates).delete(duplicates::clear_duplicates),
        )
        .route("/duplicates/stats", get(duplicates::get_stats))
        .route("/duplicates/scan", post(duplicates::start_scan))
        .route("/duplicates/scan/cancel", post(duplicates::cancel_scan))
        .route(
            "/duplicates/{attachment_name}",
            delete(duplicates::delete_duplicate),
        )
        .route("/statistics", get(statistics::get_statistics));

    Router::new()
        .nest(API_PREFIX, api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `bind_addr` until Ctrl-C.
pub async fn serve(bind_addr: &str, state: AppState) -> io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!("Listening on http://{}{}", listener.local_addr()?, API_PREFIX);

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

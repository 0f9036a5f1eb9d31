pub mod api;

use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::health::HealthServer;
use crate::storage::Store;
use api::AppState;

/// Build the HTTP router consumed by the frontends
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(api::healthz))
        .route(
            "/database/exist",
            get(api::check_database).post(api::report_database),
        )
        .route("/api/collect", post(api::collect))
        .route("/api/banned", get(api::banned))
        .route("/api/fetchall", get(api::fetch_all))
        .with_state(state)
}

pub async fn run(
    config: &Config,
    store: Arc<Store>,
    health_server: HealthServer,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> Result<()> {
    let state = AppState {
        store,
        health: health_server,
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            info!("Server shutting down");
        })
        .await?;

    Ok(())
}

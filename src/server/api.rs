use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::health::HealthServer;
use crate::storage::{CollectedEvent, Store};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub health: HealthServer,
}

/// Database status reported by a frontend
#[derive(Debug, Deserialize)]
pub struct DatabaseExists {
    #[serde(default)]
    pub frontend: String,
    #[serde(default)]
    pub connection: String,
    #[serde(default)]
    pub tables: String,
}

#[derive(Debug, Deserialize)]
pub struct BannedQuery {
    pub banned: Option<String>,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// HTTP status for a storage failure
pub fn error_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::AmbiguousMatch { .. } => StatusCode::CONFLICT,
        e if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn store_error(err: StoreError) -> Response {
    error_response(error_status(&err), err.to_string())
}

// ============================================
// Handlers
// ============================================

pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Check that the database is alive, initializing it if a remote store
/// cannot be queried
pub async fn check_database(State(state): State<AppState>) -> Response {
    info!("Received request to check if the database exists");

    let report = state.store.check_and_heal().await;
    if let Some(outcome) = &report.bootstrap {
        if let Ok(schema) = outcome {
            info!(schema = %schema, "Database initialized by liveness check");
        }
        state.health.set_ready(state.store.is_initialized().await);
    }

    if report.is_alive() {
        (StatusCode::OK, "exists").into_response()
    } else {
        let body = match &report.bootstrap {
            Some(Err(e)) => format!("{}: {}", report.status, e),
            _ => report.status.to_string(),
        };
        warn!(status = %report.status, "Database liveness check failed");
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Receive a frontend's view of the database; `tables: "create"` requests
/// initialization
pub async fn report_database(
    State(state): State<AppState>,
    Json(report): Json<DatabaseExists>,
) -> Response {
    info!(
        frontend = %report.frontend,
        connection = %report.connection,
        tables = %report.tables,
        "Frontend reported database status"
    );

    if report.tables != "create" {
        return (StatusCode::OK, "acknowledged").into_response();
    }

    match state.store.initialize().await {
        Ok(schema) => {
            state.health.set_ready(true);
            (StatusCode::OK, schema.to_string()).into_response()
        }
        Err(e) => {
            error!(frontend = %report.frontend, error = %e, "Unable to initialize database");
            state.health.set_ready(state.store.is_initialized().await);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Store a collected event
pub async fn collect(
    State(state): State<AppState>,
    Json(event): Json<CollectedEvent>,
) -> Response {
    debug!(
        frontend = %event.frontend_name,
        ip = %event.ip,
        path = %event.path,
        "Received collected event"
    );

    let db = match state.store.database().await {
        Ok(db) => db,
        Err(e) => return store_error(e),
    };

    match db.insert_collected_event(&event).await {
        Ok(()) => {
            (StatusCode::OK, Json(serde_json::json!({"message": "stored"}))).into_response()
        }
        Err(e) => {
            error!(
                frontend = %event.frontend_name,
                error = %e,
                "Error inserting data into database"
            );
            store_error(e)
        }
    }
}

/// Banned-entity look-up by source address (`?banned=<ip>`)
pub async fn banned(
    State(state): State<AppState>,
    Query(query): Query<BannedQuery>,
) -> Response {
    let Some(ip) = query.banned.filter(|ip| !ip.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing query parameter: banned");
    };

    let db = match state.store.database().await {
        Ok(db) => db,
        Err(e) => return store_error(e),
    };

    match db.lookup_banned_entity(&ip).await {
        Ok(entity) => (StatusCode::OK, Json(entity)).into_response(),
        Err(e) => {
            error!(ip = %ip, error = %e, "Error querying the database");
            store_error(e)
        }
    }
}

/// Every collected event. Unbounded.
pub async fn fetch_all(State(state): State<AppState>) -> Response {
    let db = match state.store.database().await {
        Ok(db) => db,
        Err(e) => return store_error(e),
    };

    match db.fetch_all_collected_events().await {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(e) => {
            error!(error = %e, "Error querying the database");
            store_error(e)
        }
    }
}

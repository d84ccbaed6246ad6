use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::error;

use kopsis_db::migrations::migration_status;

use crate::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub database: bool,
    pub migrations_total: usize,
    pub migrations_applied: usize,
    pub version: &'static str,
}

/// Reports database reachability and migration state. 503 when unhealthy.
async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let (database, total, applied) = match migration_status(state.db.pool()).await {
        Ok((total, applied)) => (state.db.health_check().await, total, applied),
        Err(e) => {
            error!(error = %e, "Migration status unavailable");
            (false, 0, 0)
        }
    };
    let healthy = database && total == applied;

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            healthy,
            database,
            migrations_total: total,
            migrations_applied: applied,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

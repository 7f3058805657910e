use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::state::AppState;
use crate::config::ping;

const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub time: DateTime<Utc>,
    pub database: &'static str,
}

/// Liveness plus a bounded database round trip
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_up = tokio::time::timeout(PING_TIMEOUT, ping(&state.db))
        .await
        .unwrap_or(false);

    let status = if database_up {
        StatusCode::OK
    } else {
        tracing::warn!("health check: database unreachable");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            ok: database_up,
            status: if database_up { "healthy" } else { "degraded" },
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            time: Utc::now(),
            database: if database_up { "up" } else { "down" },
        }),
    )
}

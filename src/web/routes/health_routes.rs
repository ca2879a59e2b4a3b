use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use super::router::AppState;
use crate::core::sheets::SpreadsheetClient;

/// Liveness only; never touches Google.
pub async fn health<C: SpreadsheetClient + 'static>(
    State(state): State<AppState<C>>,
) -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
    }))
}

/// Also checks that the service account can still get an access token.
pub async fn detailed_health<C: SpreadsheetClient + 'static>(
    State(state): State<AppState<C>>,
) -> (StatusCode, Json<Value>) {
    match state.sheets.probe().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "status": "ok",
                "checks": {"googleAuth": "ok"},
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Upstream health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "status": "degraded",
                    "checks": {"googleAuth": e.to_string()},
                })),
            )
        }
    }
}

pub mod dashboard;
pub mod transactions;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let health_response = state.health.check_health().await;

    // 503 only when a critical dependency is down; degraded still serves traffic
    let status_code = if health_response.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(health_response))
}

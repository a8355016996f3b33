//! Health check endpoints, served outside the API prefix.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub environment: &'static str,
    pub version: &'static str,
}

fn health_of(state: &AppState) -> Health {
    Health {
        status: "ok",
        environment: state.config().environment.as_str(),
        version: env!("CARGO_PKG_VERSION"),
    }
}

/// Liveness: answers as long as the process is serving requests.
pub async fn live(State(state): State<AppState>) -> ApiResponse<Health> {
    ApiResponse::ok(health_of(&state))
}

/// Readiness: pings the database, `503` when it is unreachable.
pub async fn ready(State(state): State<AppState>) -> Response {
    match sqlx::query("SELECT 1").execute(state.pool()).await {
        Ok(_) => ApiResponse::ok(health_of(&state)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            ApiResponse::failure(StatusCode::SERVICE_UNAVAILABLE, "Database unavailable", None)
                .into_response()
        }
    }
}

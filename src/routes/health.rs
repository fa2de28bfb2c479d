use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sqlx::query_scalar;
use utoipa::ToSchema;

use crate::app::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub db_ok: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Service and store liveness", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    // the profile table is what every permission check reads
    let db_ok = match query_scalar::<_, i64>("SELECT COUNT(*) FROM profiles LIMIT 1")
        .fetch_one(&state.pool)
        .await
    {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "health check: profile store unreachable");
            false
        }
    };

    Json(HealthResponse {
        status: if db_ok { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_ok,
    })
}

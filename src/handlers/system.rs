use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - service description
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "data": {
            "name": "Forest Watcher API",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "description": "Areas, teams and report templates for the Forest Watcher app",
            "endpoints": {
                "areas": "/v3/forest-watcher/area[/:id] (protected)",
                "teams": "/v3/forest-watcher/area/teams, /area/:id/team/:teamId (protected)",
                "templates": "/v3/forest-watcher/area/templates, /area/:id/template/:templateId (protected)",
                "transform": "/v3/forest-watcher/transform (protected)",
                "health": "/health (public)",
            }
        }
    }))
}

/// GET /health - relation store reachability
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.relations.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database_error": e.to_string()
                    }
                })),
            )
        }
    }
}

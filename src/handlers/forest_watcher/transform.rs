use axum::extract::State;
use tracing::error;

use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::services::transformer;
use crate::state::AppState;

/// GET /transform - start the template relation backfill and return immediately
pub async fn start(State(state): State<AppState>, Caller(upstream): Caller) -> ApiResult<()> {
    let relations = state.relations.clone();
    tokio::spawn(async move {
        if let Err(e) = transformer::run(&upstream, &relations).await {
            error!("Template relation backfill failed: {}", e);
        }
    });
    Ok(ApiResponse::no_content())
}

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::SecurityConfig;
use crate::handlers::{forest_watcher as fw, system};
use crate::middleware::require_user;
use crate::state::AppState;

pub const API_PREFIX: &str = "/v3/forest-watcher";

pub fn app(state: AppState) -> Router {
    let body_limit = state.config.service.max_upload_bytes;
    let cors = cors_layer(&state.config.security);

    Router::new()
        // Public
        .route("/", get(system::root))
        .route("/health", get(system::health))
        // Protected
        .nest(API_PREFIX, forest_watcher_routes(state.clone()))
        // Global middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

fn forest_watcher_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/transform", get(fw::transform))
        // Area collections
        .route("/area", get(fw::area_list).post(fw::area_create))
        .route(
            "/area/teams",
            get(fw::area_list_with_teams).delete(fw::delete_team_relations),
        )
        .route("/area/templates", delete(fw::delete_template_relations))
        // Relation lookups
        .route("/area/areaTemplates/:id", get(fw::area_templates))
        .route("/area/areaTeams/:id", get(fw::area_teams))
        .route("/area/teamAreas/:id", get(fw::team_areas))
        // Single area
        .route(
            "/area/:id",
            get(fw::area_show)
                .patch(fw::area_update)
                .delete(fw::area_delete),
        )
        // Area relations
        .route(
            "/area/:id/team/:team_id",
            post(fw::add_team).delete(fw::remove_team),
        )
        .route(
            "/area/:id/template/:template_id",
            post(fw::add_template).delete(fw::remove_template),
        )
        .route("/area/:id/teams", delete(fw::delete_area_teams))
        .route("/area/:id/templates", delete(fw::delete_area_templates))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();
    CorsLayer::permissive().allow_origin(origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::RelationStores;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let state = AppState::new(AppConfig::development(), RelationStores::in_memory()).unwrap();
        app(state)
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn forest_watcher_routes_require_a_token() {
        let response = test_app()
            .oneshot(Request::get("/v3/forest-watcher/area").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["errors"][0]["detail"], "Unauthorized");
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let response = test_app()
            .oneshot(Request::get("/v3/forest-watcher/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn explicit_origins_are_accepted() {
        let security = SecurityConfig {
            enable_cors: true,
            cors_origins: vec!["https://www.globalforestwatch.org".to_string()],
        };
        let _ = cors_layer(&security);
    }
}

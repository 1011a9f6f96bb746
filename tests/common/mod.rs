#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    extract::{Multipart, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use forest_watcher_bff::config::AppConfig;
use forest_watcher_bff::database::RelationStores;
use forest_watcher_bff::{app, AppState};

pub const TOKEN: &str = "Bearer abcd";
/// Resolves to a user who does not own the areas the stub lists
pub const OTHER_TOKEN: &str = "Bearer other";
pub const SERVICE_TOKEN: &str = "svc-token";
pub const USER_ID: &str = "user-1";

pub struct TestApp {
    pub base_url: String,
    pub upstream_url: String,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Start a stub of the remote services and the API pointed at it, both on free ports
    pub async fn spawn() -> Result<Self> {
        let upstream_url = serve(stub_upstream()).await?;

        let mut config = AppConfig::development();
        config.upstream.control_tower_url = upstream_url.clone();
        config.upstream.rw_areas_api_url = format!("{}/v2", upstream_url);
        config.upstream.areas_api_url = format!("{}/ms", upstream_url);
        config.upstream.geostore_api_url = format!("{}/v1", upstream_url);
        config.upstream.forms_api_url = format!("{}/v3", upstream_url);
        config.upstream.teams_api_url = format!("{}/v3", upstream_url);
        config.upstream.service_token = SERVICE_TOKEN.to_string();
        config.upstream.timeout_secs = 5;

        let state = AppState::new(config, RelationStores::in_memory())?;
        let base_url = serve(app(state)).await?;
        wait_ready(&base_url, Duration::from_secs(10)).await?;

        Ok(Self {
            base_url,
            upstream_url,
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v3/forest-watcher{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).header("Authorization", TOKEN)
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).header("Authorization", TOKEN)
    }

    pub fn patch(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.patch(self.url(path)).header("Authorization", TOKEN)
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).header("Authorization", TOKEN)
    }
}

async fn serve(router: Router) -> Result<String> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{}", addr))
}

async fn wait_ready(base_url: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::new();
    let deadline = Instant::now() + timeout;
    loop {
        if Instant::now() > deadline {
            break;
        }
        if let Ok(resp) = client.get(format!("{}/health", base_url)).send().await {
            if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    anyhow::bail!("server did not become ready on {} within {:?}", base_url, timeout)
}

// ---------------------------------------------------------------------------
// Stub remote services
//
// Areas owned by user-1:
//   a1  geostore g1 (100 ha), template tpl-legacy recorded on the area
//   a2  no geostore
//   a-big geostore g-big (3,000,000 ha)
//   wdpa  a protected-area subscription, filtered out
// Area a3 belongs to someone else and is only readable with the service token.
// ---------------------------------------------------------------------------

fn stub_upstream() -> Router {
    Router::new()
        .route("/auth/user/me", get(user_me))
        .route("/v2/area", get(list_areas))
        .route(
            "/v2/area/:id",
            get(user_area).patch(update_area).delete(delete_area),
        )
        .route("/ms/area/:id", get(service_area))
        .route("/ms/area/fw/:user_id", post(create_area))
        .route("/v1/geostore", post(create_geostore))
        .route("/v1/geostore/:id", get(geostore))
        .route("/v1/coverage/intersect", get(coverage))
        .route("/v3/reports/default", get(default_template))
        .route("/v3/reports/:id", get(template))
        .route("/v3/teams/user/:user_id", get(user_teams))
        .route("/v3/teams/:id", get(team))
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "errors": [{ "status": 404, "detail": "Not found" }] })))
        .into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers.get("authorization").and_then(|v| v.to_str().ok())
}

fn area(id: &str, user_id: &str, geostore: Option<&str>) -> Value {
    let mut attributes = json!({
        "name": format!("Area {}", id),
        "userId": user_id,
        "datasets": [],
        "wdpaid": null,
        "admin": {}
    });
    if let Some(geostore) = geostore {
        attributes["geostore"] = json!(geostore);
    }
    json!({ "type": "area", "id": id, "attributes": attributes })
}

fn user_areas() -> Vec<Value> {
    let mut a1 = area("a1", USER_ID, Some("g1"));
    a1["attributes"]["templateId"] = json!("tpl-legacy");
    let mut wdpa = area("wdpa", USER_ID, Some("g1"));
    wdpa["attributes"]["wdpaid"] = json!(555);
    vec![
        a1,
        area("a2", USER_ID, None),
        area("a-big", USER_ID, Some("g-big")),
        wdpa,
    ]
}

async fn user_me(headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some(TOKEN) => Json(json!({ "id": USER_ID, "role": "USER", "email": "user@example.org" }))
            .into_response(),
        Some(OTHER_TOKEN) => Json(json!({ "id": "user-2", "role": "USER" })).into_response(),
        _ => (StatusCode::UNAUTHORIZED, "Not authenticated").into_response(),
    }
}

async fn list_areas() -> Json<Value> {
    Json(json!({ "data": user_areas() }))
}

async fn user_area(Path(id): Path<String>) -> Response {
    match user_areas().into_iter().find(|a| a["id"] == id.as_str()) {
        Some(area) => Json(json!({ "data": area })).into_response(),
        None => not_found(),
    }
}

async fn service_area(headers: HeaderMap, Path(id): Path<String>) -> Response {
    let expected = format!("Bearer {}", SERVICE_TOKEN);
    if bearer(&headers) != Some(expected.as_str()) {
        return (StatusCode::UNAUTHORIZED, "service token required").into_response();
    }
    if id == "a3" {
        return Json(json!({ "data": area("a3", "user-9", Some("g1")) })).into_response();
    }
    user_area(Path(id)).await
}

async fn delete_area(Path(id): Path<String>) -> Response {
    match user_areas().iter().any(|a| a["id"] == id.as_str()) {
        true => StatusCode::NO_CONTENT.into_response(),
        false => not_found(),
    }
}

async fn form_fields(mut multipart: Multipart) -> (serde_json::Map<String, Value>, bool) {
    let mut fields = serde_json::Map::new();
    let mut has_image = false;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            has_image = field.bytes().await.map(|b| !b.is_empty()).unwrap_or(false);
        } else if let Ok(text) = field.text().await {
            fields.insert(name, json!(text));
        }
    }
    (fields, has_image)
}

async fn create_area(Path(user_id): Path<String>, multipart: Multipart) -> Response {
    let (fields, has_image) = form_fields(multipart).await;
    if !has_image {
        return (StatusCode::BAD_REQUEST, "image missing").into_response();
    }
    let mut created = area("a-new", &user_id, fields.get("geostore").and_then(Value::as_str));
    created["attributes"]["name"] = fields.get("name").cloned().unwrap_or(Value::Null);
    (StatusCode::OK, Json(json!({ "data": created }))).into_response()
}

async fn update_area(Path(id): Path<String>, multipart: Multipart) -> Response {
    let Some(mut existing) = user_areas().into_iter().find(|a| a["id"] == id.as_str()) else {
        return not_found();
    };
    let (fields, _) = form_fields(multipart).await;
    for (key, value) in fields {
        existing["attributes"][key] = value;
    }
    Json(json!({ "data": existing })).into_response()
}

async fn create_geostore(Json(body): Json<Value>) -> Response {
    if body.get("geojson").is_none() || body["lock"] != true {
        return (StatusCode::BAD_REQUEST, "geojson required").into_response();
    }
    Json(json!({
        "data": { "type": "geoStore", "id": "g-new", "attributes": { "areaHa": 42.0, "bbox": [0, 0, 1, 1] } }
    }))
    .into_response()
}

async fn geostore(Path(id): Path<String>) -> Response {
    let area_ha = match id.as_str() {
        "g1" => 100.0,
        "g-big" => 3_000_000.0,
        "g-new" => 42.0,
        _ => return not_found(),
    };
    Json(json!({
        "data": { "type": "geoStore", "id": id, "attributes": { "areaHa": area_ha, "bbox": [0, 0, 1, 1] } }
    }))
    .into_response()
}

async fn coverage() -> Json<Value> {
    Json(json!({
        "data": { "type": "coverages", "attributes": { "layers": ["umd_as_it_happens"] } }
    }))
}

async fn default_template() -> Json<Value> {
    Json(json!({
        "data": { "type": "reports", "id": "default-tpl", "attributes": { "name": { "en": "Default" } } }
    }))
}

async fn template(Path(id): Path<String>) -> Response {
    if !id.starts_with("tpl") && id != "default-tpl" {
        return not_found();
    }
    Json(json!({
        "data": { "type": "reports", "id": id, "attributes": { "name": { "en": id } } }
    }))
    .into_response()
}

async fn user_teams(Path(user_id): Path<String>) -> Json<Value> {
    let teams = match user_id.as_str() {
        USER_ID => json!([{ "type": "teams", "id": "team-1", "attributes": { "name": "Rangers", "userRole": "manager" } }]),
        _ => json!([]),
    };
    Json(json!({ "data": teams }))
}

async fn team(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "team-1" => Json(json!({
            "data": { "type": "teams", "id": "team-1", "attributes": { "name": "Rangers" } }
        }))
        .into_response(),
        _ => not_found(),
    }
}

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::database::{RelationFilter, RelationKind};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::services::area_templates as template_links;
use crate::services::{areas, teams, Upstream};
use crate::state::AppState;

/// Body of the bulk relation deletes; either side narrows the selection
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDelete {
    pub area_id: Option<String>,
    pub team_id: Option<String>,
    pub template_id: Option<String>,
}

impl BulkDelete {
    fn filter(self, kind: RelationKind) -> RelationFilter {
        let related_id = match kind {
            RelationKind::Team => self.team_id,
            RelationKind::Template => self.template_id,
        };
        RelationFilter {
            area_id: self.area_id.filter(|s| !s.is_empty()),
            related_id: related_id.filter(|s| !s.is_empty()),
        }
    }
}

/// POST /area/:id/team/:team_id
pub async fn add_team(
    State(state): State<AppState>,
    Path((area_id, team_id)): Path<(String, String)>,
) -> ApiResult<()> {
    link(&state, RelationKind::Team, &area_id, &team_id).await
}

/// DELETE /area/:id/team/:team_id
pub async fn remove_team(
    State(state): State<AppState>,
    Path((area_id, team_id)): Path<(String, String)>,
) -> ApiResult<()> {
    unlink(&state, RelationKind::Team, &area_id, &team_id).await
}

/// POST /area/:id/template/:template_id
pub async fn add_template(
    State(state): State<AppState>,
    Path((area_id, template_id)): Path<(String, String)>,
) -> ApiResult<()> {
    link(&state, RelationKind::Template, &area_id, &template_id).await
}

/// DELETE /area/:id/template/:template_id
pub async fn remove_template(
    State(state): State<AppState>,
    Path((area_id, template_id)): Path<(String, String)>,
) -> ApiResult<()> {
    unlink(&state, RelationKind::Template, &area_id, &template_id).await
}

/// DELETE /area/teams
pub async fn delete_team_relations(
    State(state): State<AppState>,
    body: Option<Json<BulkDelete>>,
) -> ApiResult<()> {
    delete_matching(&state, RelationKind::Team, body).await
}

/// DELETE /area/templates
pub async fn delete_template_relations(
    State(state): State<AppState>,
    body: Option<Json<BulkDelete>>,
) -> ApiResult<()> {
    delete_matching(&state, RelationKind::Template, body).await
}

/// DELETE /area/:id/teams
pub async fn delete_area_teams(
    State(state): State<AppState>,
    Caller(upstream): Caller,
    Path(area_id): Path<String>,
) -> ApiResult<()> {
    require_area_as_service(&upstream, &area_id).await?;
    clear_area(&state, RelationKind::Team, &area_id).await
}

/// DELETE /area/:id/templates
pub async fn delete_area_templates(
    State(state): State<AppState>,
    Caller(upstream): Caller,
    Path(area_id): Path<String>,
) -> ApiResult<()> {
    require_area_as_service(&upstream, &area_id).await?;
    clear_area(&state, RelationKind::Template, &area_id).await
}

/// GET /area/areaTeams/:id - team ids linked to an area
pub async fn area_teams(
    State(state): State<AppState>,
    Caller(upstream): Caller,
    Path(area_id): Path<String>,
) -> ApiResult<Vec<String>> {
    require_area_as_service(&upstream, &area_id).await?;
    let ids = state.relations.teams.related_for_area(&area_id).await?;
    Ok(ApiResponse::success(ids))
}

/// GET /area/areaTemplates/:id - template ids linked to an area, plus the default template
pub async fn area_templates(
    State(state): State<AppState>,
    Caller(upstream): Caller,
    Path(area_id): Path<String>,
) -> ApiResult<Vec<String>> {
    require_area_as_service(&upstream, &area_id).await?;
    let ids =
        template_links::template_ids_for_area(&upstream, &state.relations, &area_id).await?;
    Ok(ApiResponse::success(ids))
}

/// GET /area/teamAreas/:id - area ids linked to a team
pub async fn team_areas(
    State(state): State<AppState>,
    Caller(upstream): Caller,
    Path(team_id): Path<String>,
) -> ApiResult<Vec<String>> {
    if teams::team(&upstream, &team_id).await.is_none() {
        return Err(ApiError::not_found("Team doesn't exist"));
    }
    let ids = state.relations.teams.areas_for_related(&team_id).await?;
    Ok(ApiResponse::success(ids))
}

async fn link(state: &AppState, kind: RelationKind, area_id: &str, related_id: &str) -> ApiResult<()> {
    info!("Linking {} {} to area {}", kind.label(), related_id, area_id);
    state
        .relations
        .for_kind(kind)
        .create(area_id, related_id)
        .await?;
    Ok(ApiResponse::empty())
}

async fn unlink(state: &AppState, kind: RelationKind, area_id: &str, related_id: &str) -> ApiResult<()> {
    info!("Unlinking {} {} from area {}", kind.label(), related_id, area_id);
    state
        .relations
        .for_kind(kind)
        .delete(area_id, related_id)
        .await?
        .ok_or_else(|| ApiError::not_found(kind.missing_message()))?;
    Ok(ApiResponse::empty())
}

async fn delete_matching(
    state: &AppState,
    kind: RelationKind,
    body: Option<Json<BulkDelete>>,
) -> ApiResult<()> {
    let filter = body.map(|Json(b)| b).unwrap_or_default().filter(kind);
    if filter.is_empty() {
        return Err(ApiError::bad_request("Invalid Request"));
    }
    let removed = state.relations.for_kind(kind).delete_all(&filter).await?;
    info!("Removed {} {} relations matching {:?}", removed, kind.label(), filter);
    Ok(ApiResponse::empty())
}

async fn clear_area(state: &AppState, kind: RelationKind, area_id: &str) -> ApiResult<()> {
    let removed = state
        .relations
        .for_kind(kind)
        .delete_all(&RelationFilter::area(area_id))
        .await?;
    info!("Removed {} {} relations from area {}", removed, kind.label(), area_id);
    Ok(ApiResponse::no_content())
}

/// The area must be visible to the service account; remote failures keep their status
async fn require_area_as_service(upstream: &Upstream, area_id: &str) -> Result<(), ApiError> {
    match areas::area_as_service(upstream, area_id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(ApiError::not_found("Area doesn't exist")),
        Err(e) => Err(ApiError::from(e).with_detail("Area doesn't exist")),
    }
}

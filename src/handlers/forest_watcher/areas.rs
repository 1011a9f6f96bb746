use std::collections::BTreeMap;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use futures::future::try_join_all;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::api::{Area, Team};
use crate::database::RelationFilter;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Caller, CurrentUser};
use crate::services::area_response::{self, Provided};
use crate::services::areas::{self, ImageUpload};
use crate::services::{area_templates, teams, Upstream, UpstreamError};
use crate::state::AppState;

const RETRIEVE_FAILED: &str = "Error while retrieving areas";

/// Fields of the multipart area form; all optional until validated
#[derive(Debug, Default)]
pub struct AreaForm {
    pub name: Option<String>,
    pub geojson: Option<String>,
    pub image: Option<ImageUpload>,
}

impl AreaForm {
    async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, ApiError> {
        let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
        let mut form = AreaForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "name" => form.name = Some(field_text(field).await?),
                "geojson" => form.geojson = Some(field_text(field).await?),
                "image" => {
                    let file_name = field.file_name().unwrap_or("image").to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(e.body_text()))?;
                    if !bytes.is_empty() {
                        form.image = Some(ImageUpload {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                other => tracing::debug!("Ignoring unknown area form field {}", other),
            }
        }

        Ok(form)
    }

    /// Fields required to create an area: a non-empty name, valid geojson and an image
    fn validate_creation(self) -> Result<(String, Value, ImageUpload), ApiError> {
        info!("Validating area creation");
        let mut field_errors = BTreeMap::new();

        let name = self.name.map(|n| n.trim().to_string()).unwrap_or_default();
        if name.is_empty() {
            field_errors.insert("name".to_string(), "can not be empty".to_string());
        }

        let geojson = match self.geojson.as_deref().map(str::trim) {
            None | Some("") => {
                field_errors.insert("geojson".to_string(), "can not be empty".to_string());
                None
            }
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(value) => Some(value),
                Err(_) => {
                    field_errors.insert("geojson".to_string(), "should be json format".to_string());
                    None
                }
            },
        };

        let image = self
            .image
            .ok_or_else(|| ApiError::bad_request("No image found"))?;

        match geojson {
            Some(geojson) if field_errors.is_empty() => Ok((name, geojson, image)),
            _ => {
                info!("Error validating area creation");
                Err(ApiError::validation_error("Area not valid", field_errors))
            }
        }
    }

    fn geojson(&self) -> Result<Option<Value>, ApiError> {
        match self.geojson.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => serde_json::from_str(raw).map(Some).map_err(|_| {
                let mut fields = BTreeMap::new();
                fields.insert("geojson".to_string(), "should be json format".to_string());
                ApiError::validation_error("Area not valid", fields)
            }),
        }
    }
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

/// A 404 from the areas service reads as a missing area
fn area_lookup_failed(err: UpstreamError) -> ApiError {
    match err.status() {
        Some(404) => ApiError::not_found("Area not found"),
        _ => ApiError::from(err),
    }
}

/// Every listed area must belong to the caller
fn ensure_owned(areas: &[Area], user_id: &str) -> Result<(), ApiError> {
    if areas.iter().any(|a| a.user_id().as_deref() != Some(user_id)) {
        error!("Incorrect areas found for user {}", user_id);
        return Err(ApiError::service_unavailable("Incorrect areas found"));
    }
    Ok(())
}

/// GET /area - the caller's own areas
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Caller(upstream): Caller,
) -> ApiResult<Vec<Area>> {
    let result: Result<Vec<Area>, ApiError> = async {
        let user_areas = areas::user_areas(&upstream).await?;
        ensure_owned(&user_areas, &user.id)?;
        Ok(area_response::build_areas(&upstream, &state.relations, user_areas).await?)
    }
    .await;

    let built = result.map_err(|e| e.with_detail(RETRIEVE_FAILED))?;
    info!("Returning {} areas for user {}", built.len(), user.id);
    Ok(ApiResponse::success(area_response::within_size_limit(
        built,
        state.config.service.area_max_size_ha,
    )))
}

/// GET /area/teams - the caller's areas plus every area shared with one of their teams
pub async fn list_with_teams(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Caller(upstream): Caller,
) -> ApiResult<Vec<Area>> {
    let result: Result<Vec<Area>, ApiError> = async {
        let mut all = areas::user_areas(&upstream).await?;
        ensure_owned(&all, &user.id)?;
        for area in all.iter_mut() {
            area.set_attribute("teamId", Value::Null);
        }

        for team in teams::user_teams(&upstream, &user.id).await {
            all.extend(team_areas(&state, &upstream, &team).await?);
        }

        Ok(area_response::build_areas(&upstream, &state.relations, all).await?)
    }
    .await;

    let built = result.map_err(|e| e.with_detail(RETRIEVE_FAILED))?;
    Ok(ApiResponse::success(area_response::within_size_limit(
        built,
        state.config.service.area_max_size_ha,
    )))
}

/// Areas linked to `team`, fetched as the service and tagged with the team id
async fn team_areas(state: &AppState, upstream: &Upstream, team: &Team) -> Result<Vec<Area>, ApiError> {
    let area_ids = state.relations.teams.areas_for_related(&team.id).await?;
    let fetched = try_join_all(area_ids.iter().map(|id| async move {
        match areas::area_as_service(upstream, id).await {
            Err(e) if e.status() == Some(404) => Ok(None),
            other => other,
        }
    }))
    .await?;

    Ok(area_ids
        .iter()
        .zip(fetched)
        .filter_map(|(id, area)| {
            if area.is_none() {
                warn!("Area {} linked to team {} no longer exists", id, team.id);
            }
            area
        })
        .map(|mut area| {
            area.set_attribute("teamId", json!(team.id));
            area
        })
        .collect())
}

/// GET /area/:id - one area, readable by its owner or a member of a team it is shared with
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Caller(upstream): Caller,
    Path(area_id): Path<String>,
) -> ApiResult<Area> {
    let (user_teams, area_team_ids) = tokio::join!(
        teams::user_teams(&upstream, &user.id),
        state.relations.teams.related_for_area(&area_id),
    );
    let area_team_ids = area_team_ids?;
    let shared: Vec<Team> = user_teams
        .into_iter()
        .filter(|team| area_team_ids.contains(&team.id))
        .collect();

    let area = if shared.is_empty() {
        areas::area(&upstream, &area_id).await
    } else {
        areas::area_as_service(&upstream, &area_id).await
    };
    let area = area.map_err(area_lookup_failed)?;
    let mut area = area.ok_or_else(|| ApiError::not_found("Area not found"))?;

    let teams: Vec<Value> = shared
        .iter()
        .map(|team| json!({ "id": team.id, "name": team.name() }))
        .collect();
    let templates = area_templates::templates_for_area(&upstream, &state.relations, &area_id).await?;

    area.extra.insert("teams".to_string(), Value::Array(teams));
    area.extra.insert("reportTemplate".to_string(), Value::Array(templates));
    Ok(ApiResponse::success(area))
}

/// POST /area - multipart `name`, `geojson` and `image`
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Caller(upstream): Caller,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Option<Area>> {
    let (name, geojson, image) = AreaForm::read(multipart).await?.validate_creation()?;

    let saved = areas::create_with_geostore(&upstream, &name, image, &geojson, &user.id)
        .await
        .map_err(|e| ApiError::from(e).with_detail("Error while creating area"))?;
    info!("Created area {} for user {}", saved.area.id, user.id);

    let provided = Provided {
        geostore: saved.geostore,
        coverage: Some(saved.coverage),
    };
    let built = area_response::build_area(&upstream, &state.relations, saved.area, provided)
        .await
        .map_err(|e| ApiError::from(e).with_detail("Error while retrieving area's template"))?;
    Ok(ApiResponse::success(built))
}

/// PATCH /area/:id - any of `name`, `geojson`, `image`
pub async fn update(
    State(state): State<AppState>,
    Caller(upstream): Caller,
    Path(area_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Option<Area>> {
    let existing = areas::area(&upstream, &area_id)
        .await
        .map_err(area_lookup_failed)?
        .ok_or_else(|| ApiError::not_found("Area not found"))?;

    let form = AreaForm::read(multipart).await?;
    let geojson = form.geojson()?;
    let name = form.name.filter(|n| !n.trim().is_empty());

    let saved = areas::update_with_geostore(
        &upstream,
        name.as_deref(),
        form.image,
        geojson.as_ref(),
        &existing,
    )
    .await
    .map_err(|e| ApiError::from(e).with_detail("Error while updating area"))?;
    info!("Updated area {}", saved.area.id);

    let provided = Provided {
        geostore: saved.geostore,
        coverage: Some(saved.coverage).filter(|c| !c.is_null()),
    };
    let built = area_response::build_area(&upstream, &state.relations, saved.area, provided)
        .await
        .map_err(|e| ApiError::from(e).with_detail("Error while retrieving area's template"))?;
    Ok(ApiResponse::success(built))
}

/// DELETE /area/:id - owner only; also drops the area's team and template links
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Caller(upstream): Caller,
    Path(area_id): Path<String>,
) -> ApiResult<()> {
    let area = areas::area(&upstream, &area_id)
        .await
        .map_err(area_lookup_failed)?
        .ok_or_else(|| ApiError::not_found("Area not found"))?;
    if area.user_id().as_deref() != Some(user.id.as_str()) {
        return Err(ApiError::unauthorized("You are not authorised to delete this record"));
    }

    areas::delete(&upstream, &area_id).await?;

    let filter = RelationFilter::area(&area_id);
    let (teams_removed, templates_removed) = tokio::try_join!(
        state.relations.teams.delete_all(&filter),
        state.relations.templates.delete_all(&filter),
    )?;
    info!(
        teams_removed,
        templates_removed, "Deleted area {} and its relations", area_id
    );

    Ok(ApiResponse::no_content())
}

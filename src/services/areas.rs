use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{error, info};

use super::upstream::{Upstream, UpstreamError};
use super::{coverage, geostore, ServiceError};
use crate::api::format::object_id;
use crate::api::Area;

const SERVICE: &str = "areas";

/// An uploaded area image, forwarded to the areas service as-is
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Result of creating or updating an area: the saved area plus the
/// geostore/coverage looked up on the way, so callers need not fetch them again
#[derive(Debug, Clone)]
pub struct SavedArea {
    pub area: Area,
    /// Present when a new geostore was created from submitted geojson
    pub geostore: Option<Value>,
    pub coverage: Value,
}

/// GET {rw}/area — the caller's areas, minus WDPA and GADM subscriptions
pub async fn user_areas(upstream: &Upstream) -> Result<Vec<Area>, UpstreamError> {
    info!("Get user areas");
    let base = &upstream.config().upstream.rw_areas_api_url;
    let url = upstream.url(SERVICE, base, &["area"])?;
    let areas = parse_list(upstream.get_json(SERVICE, url).await?)?;
    info!("Got {} areas", areas.len());

    Ok(areas
        .into_iter()
        .filter(|area| !area.is_wdpa() && !area.is_gadm())
        .collect())
}

/// GET {rw}/area?all=true
pub async fn every_area(upstream: &Upstream) -> Result<Vec<Area>, UpstreamError> {
    info!("Get every area");
    let base = &upstream.config().upstream.rw_areas_api_url;
    let mut url = upstream.url(SERVICE, base, &["area"])?;
    url.query_pairs_mut().append_pair("all", "true");
    parse_list(upstream.get_json(SERVICE, url).await?)
}

/// GET {rw}/area/:id with the caller's token; the areas service enforces ownership
pub async fn area(upstream: &Upstream, area_id: &str) -> Result<Option<Area>, UpstreamError> {
    info!("Getting area with id {}", area_id);
    let base = &upstream.config().upstream.rw_areas_api_url;
    let url = upstream.url(SERVICE, base, &["area", area_id])?;
    parse_one(upstream.get_json(SERVICE, url).await?)
}

/// GET {areas}/area/:id with the microservice token, for areas shared through a team
pub async fn area_as_service(
    upstream: &Upstream,
    area_id: &str,
) -> Result<Option<Area>, UpstreamError> {
    info!("Getting area with id {} as service", area_id);
    let service = upstream.as_service();
    let base = &service.config().upstream.areas_api_url;
    let url = service.url(SERVICE, base, &["area", area_id])?;
    parse_one(service.get_json(SERVICE, url).await?)
}

/// DELETE {rw}/area/:id
pub async fn delete(upstream: &Upstream, area_id: &str) -> Result<(), UpstreamError> {
    info!("Deleting area with id {}", area_id);
    let base = &upstream.config().upstream.rw_areas_api_url;
    let url = upstream.url(SERVICE, base, &["area", area_id])?;
    upstream
        .send_json(SERVICE, upstream.request(reqwest::Method::DELETE, url))
        .await?;
    Ok(())
}

/// Create a geostore from `geojson`, look up its coverage, then create the area
/// through POST {areas}/area/fw/:userId
pub async fn create_with_geostore(
    upstream: &Upstream,
    name: &str,
    image: ImageUpload,
    geojson: &Value,
    user_id: &str,
) -> Result<SavedArea, ServiceError> {
    info!("Start area creation with name {} for user {}", name, user_id);

    let geostore = geostore::create(upstream, geojson).await.map_err(|e| {
        error!("Error while creating geostore: {}", e);
        e
    })?;
    let geostore_id = object_id(&geostore)
        .ok_or_else(|| UpstreamError::payload("geostore", "created geostore has no id"))?;

    let slugs = &upstream.config().service.alerts_supported;
    let coverage = coverage::get(upstream, &geostore_id, slugs)
        .await
        .map_err(|e| {
            error!("Error while getting area coverage: {}", e);
            e
        })?;

    info!("Creating area with geostore and coverage ready");
    let form = Form::new()
        .text("name", name.to_string())
        .text("geostore", geostore_id)
        .part("image", image_part(image)?);

    let base = &upstream.config().upstream.areas_api_url;
    let url = upstream.url(SERVICE, base, &["area", "fw", user_id])?;
    let request = upstream.request(reqwest::Method::POST, url).multipart(form);
    let area = parse_one(upstream.send_json(SERVICE, request).await?)?
        .ok_or_else(|| UpstreamError::payload(SERVICE, "created area missing from response"))?;
    info!("Area created {}", area.id);

    Ok(SavedArea {
        area,
        geostore: Some(geostore),
        coverage,
    })
}

/// Update an existing area. A new geostore is created when `geojson` is given,
/// otherwise the area keeps its current one; coverage is refreshed either way.
pub async fn update_with_geostore(
    upstream: &Upstream,
    name: Option<&str>,
    image: Option<ImageUpload>,
    geojson: Option<&Value>,
    existing: &Area,
) -> Result<SavedArea, ServiceError> {
    info!("Start area update for {}", existing.id);

    let (geostore, geostore_id) = match geojson {
        Some(geojson) => {
            let created = geostore::create(upstream, geojson).await.map_err(|e| {
                error!("Error while creating geostore: {}", e);
                e
            })?;
            let id = object_id(&created);
            (Some(created), id)
        }
        None => (None, existing.geostore_id().map(str::to_string)),
    };

    let coverage = match &geostore_id {
        Some(id) => {
            let slugs = &upstream.config().service.alerts_supported;
            coverage::get(upstream, id, slugs).await.map_err(|e| {
                error!("Error while getting area coverage: {}", e);
                e
            })?
        }
        None => Value::Null,
    };

    info!("Updating area with geostore and coverage ready");
    let mut form = Form::new();
    if let Some(name) = name {
        form = form.text("name", name.to_string());
    }
    if let Some(id) = geostore_id {
        form = form.text("geostore", id);
    }
    if let Some(image) = image {
        form = form.part("image", image_part(image)?);
    }

    let base = &upstream.config().upstream.rw_areas_api_url;
    let url = upstream.url(SERVICE, base, &["area", existing.id.as_str()])?;
    let request = upstream.request(reqwest::Method::PATCH, url).multipart(form);
    let area = parse_one(upstream.send_json(SERVICE, request).await?)?
        .ok_or_else(|| UpstreamError::payload(SERVICE, "updated area missing from response"))?;
    info!("Area updated {}", area.id);

    Ok(SavedArea {
        area,
        geostore,
        coverage,
    })
}

fn image_part(image: ImageUpload) -> Result<Part, UpstreamError> {
    let part = Part::bytes(image.bytes).file_name(image.file_name);
    match image.content_type {
        Some(mime) => part
            .mime_str(&mime)
            .map_err(|source| UpstreamError::Transport {
                service: SERVICE,
                source,
            }),
        None => Ok(part),
    }
}

fn parse_list(document: Value) -> Result<Vec<Area>, UpstreamError> {
    match document {
        Value::Object(mut doc) => match doc.remove("data") {
            Some(data @ Value::Array(_)) => serde_json::from_value(data)
                .map_err(|e| UpstreamError::payload(SERVICE, e.to_string())),
            _ => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

fn parse_one(document: Value) -> Result<Option<Area>, UpstreamError> {
    match document {
        Value::Object(mut doc) => match doc.remove("data") {
            Some(Value::Null) | None => Ok(None),
            Some(data) => serde_json::from_value(data)
                .map(Some)
                .map_err(|e| UpstreamError::payload(SERVICE, e.to_string())),
        },
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_list_reads_resources() {
        let doc = json!({ "data": [
            { "type": "area", "id": "a1", "attributes": { "name": "Portugal" } },
            { "type": "area", "id": "a2", "attributes": { "name": "Brazil", "geostore": "g2" } }
        ]});
        let areas = parse_list(doc).unwrap();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[1].geostore_id(), Some("g2"));
        assert!(parse_list(json!({})).unwrap().is_empty());
    }

    #[test]
    fn parse_one_treats_missing_data_as_absent() {
        assert!(parse_one(json!({ "data": null })).unwrap().is_none());
        assert!(parse_one(json!({ "type": "area", "id": "a1" })).unwrap().is_none());
        let area = parse_one(json!({ "data": { "id": "a1", "attributes": {} } }))
            .unwrap()
            .unwrap();
        assert_eq!(area.id, "a1");
    }

    #[test]
    fn malformed_area_is_a_payload_error() {
        let err = parse_one(json!({ "data": { "attributes": {} } })).unwrap_err();
        assert!(matches!(err, UpstreamError::Payload { service: "areas", .. }));
    }
}

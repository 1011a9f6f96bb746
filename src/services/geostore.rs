use serde_json::{json, Value};
use tracing::info;

use super::upstream::{Upstream, UpstreamError};
use crate::api::deserialize;

const SERVICE: &str = "geostore";

/// GET /geostore/:id, flattened
pub async fn get(upstream: &Upstream, geostore_id: &str) -> Result<Value, UpstreamError> {
    info!("Getting geostore with id {}", geostore_id);
    let base = &upstream.config().upstream.geostore_api_url;
    let url = upstream.url(SERVICE, base, &["geostore", geostore_id])?;
    let document = upstream.get_json(SERVICE, url).await?;
    Ok(deserialize(document))
}

/// POST /geostore with a locked geometry; returns the flattened geostore (with `id`)
pub async fn create(upstream: &Upstream, geojson: &Value) -> Result<Value, UpstreamError> {
    info!("Creating geostore");
    let base = &upstream.config().upstream.geostore_api_url;
    let url = upstream.url(SERVICE, base, &["geostore"])?;
    let request = upstream
        .request(reqwest::Method::POST, url)
        .json(&json!({ "geojson": geojson, "lock": true }));
    let document = upstream.send_json(SERVICE, request).await?;

    let geostore = deserialize(document);
    if crate::api::format::object_id(&geostore).is_none() {
        return Err(UpstreamError::payload(SERVICE, "created geostore has no id"));
    }
    Ok(geostore)
}

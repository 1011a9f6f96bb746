use serde_json::Value;
use tracing::info;

use super::upstream::{Upstream, UpstreamError};
use crate::api::deserialize;

const SERVICE: &str = "coverage";

/// GET /coverage/intersect?geostore=:id&slugs=a,b — which alert layers cover the geostore
pub async fn get(
    upstream: &Upstream,
    geostore_id: &str,
    slugs: &[String],
) -> Result<Value, UpstreamError> {
    let base = &upstream.config().upstream.geostore_api_url;
    let mut url = upstream.url(SERVICE, base, &["coverage", "intersect"])?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("geostore", geostore_id);
        if !slugs.is_empty() {
            query.append_pair("slugs", &slugs.join(","));
        }
    }
    info!("Getting coverage with geostore id {} and uri {}", geostore_id, url);

    let document = upstream.get_json(SERVICE, url).await?;
    Ok(deserialize(document))
}

/// Layer slugs of a flattened coverage object; anything else yields no layers
pub fn layers(coverage: &Value) -> Vec<String> {
    coverage
        .get("layers")
        .and_then(Value::as_array)
        .map(|layers| {
            layers
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

use serde_json::Value;
use tracing::{info, warn};

use super::upstream::Upstream;
use crate::api::deserialize;

const SERVICE: &str = "forms";

/// GET /reports/:id. A missing or failing template is logged and reported as `None`.
pub async fn get(upstream: &Upstream, template_id: &str) -> Option<Value> {
    info!("Getting template with id {}", template_id);
    fetch(upstream, &["reports", template_id]).await
}

/// GET /reports/default
pub async fn default_template(upstream: &Upstream) -> Option<Value> {
    info!("Getting default template");
    fetch(upstream, &["reports", "default"]).await
}

async fn fetch(upstream: &Upstream, segments: &[&str]) -> Option<Value> {
    let path = segments.join("/");
    let base = &upstream.config().upstream.forms_api_url;
    let result = match upstream.url(SERVICE, base, segments) {
        Ok(url) => upstream.get_json(SERVICE, url).await,
        Err(e) => Err(e),
    };
    match result.map(deserialize) {
        Ok(Value::Null) => {
            warn!("Template {} came back empty", path);
            None
        }
        Ok(template) => Some(template),
        Err(e) => {
            warn!("Error while fetching template {}: {}", path, e);
            None
        }
    }
}

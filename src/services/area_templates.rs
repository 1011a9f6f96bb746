use serde_json::Value;
use tracing::warn;

use super::templates;
use super::upstream::Upstream;
use crate::api::format::object_id;
use crate::database::{DatabaseError, RelationStores};

/// Template ids linked to an area, with the default template appended when it
/// is not linked already. If the default cannot be fetched it is left out.
pub async fn template_ids_for_area(
    upstream: &Upstream,
    relations: &RelationStores,
    area_id: &str,
) -> Result<Vec<String>, DatabaseError> {
    let (linked, default) = tokio::join!(
        relations.templates.related_for_area(area_id),
        default_template_id(upstream),
    );
    let mut ids = linked?;
    merge_default(&mut ids, default.as_deref());
    Ok(ids)
}

/// Template objects for an area, in the order of `template_ids_for_area`.
/// Templates that fail to load are skipped.
pub async fn templates_for_area(
    upstream: &Upstream,
    relations: &RelationStores,
    area_id: &str,
) -> Result<Vec<Value>, DatabaseError> {
    let ids = template_ids_for_area(upstream, relations, area_id).await?;
    let fetched =
        futures::future::join_all(ids.iter().map(|id| templates::get(upstream, id))).await;
    Ok(fetched.into_iter().flatten().collect())
}

/// Id of the default template; warns once when it cannot be resolved
pub(crate) async fn default_template_id(upstream: &Upstream) -> Option<String> {
    let id = templates::default_template(upstream)
        .await
        .as_ref()
        .and_then(object_id);
    if id.is_none() {
        warn!("Default template unavailable; returning linked templates only");
    }
    id
}

pub(crate) fn merge_default(ids: &mut Vec<String>, default: Option<&str>) {
    if let Some(id) = default {
        if !ids.iter().any(|linked| linked == id) {
            ids.push(id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_appended_once() {
        let mut ids = vec!["tpl-1".to_string()];
        merge_default(&mut ids, Some("default"));
        assert_eq!(ids, vec!["tpl-1", "default"]);

        merge_default(&mut ids, Some("default"));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn linked_default_keeps_its_position() {
        let mut ids = vec!["default".to_string(), "tpl-1".to_string()];
        merge_default(&mut ids, Some("default"));
        assert_eq!(ids, vec!["default", "tpl-1"]);
    }

    #[tokio::test]
    async fn unreachable_default_template_resolves_to_none() {
        let mut config = crate::config::AppConfig::development();
        config.upstream.forms_api_url = "http://127.0.0.1:9/v3".to_string();
        config.upstream.timeout_secs = 2;
        let http = super::super::upstream::build_http_client(&config.upstream).unwrap();
        let upstream = Upstream::new(http, std::sync::Arc::new(config), None);

        assert_eq!(default_template_id(&upstream).await, None);
    }

    #[test]
    fn missing_default_leaves_ids_alone() {
        let mut ids = vec!["tpl-1".to_string()];
        merge_default(&mut ids, None);
        assert_eq!(ids, vec!["tpl-1"]);
    }
}

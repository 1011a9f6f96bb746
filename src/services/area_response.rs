//! Decorates areas with their geostore, coverage, alert datasets and report
//! templates before they are returned to the app.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::{join_all, try_join_all};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::area_templates::{default_template_id, merge_default};
use super::upstream::Upstream;
use super::{coverage, geostore, templates, ServiceError};
use crate::api::{datasets, Area};
use crate::database::RelationStores;

/// Geostore and coverage the caller already holds for an area (e.g. right after
/// creating it), so the builder does not fetch them again
#[derive(Debug, Clone, Default)]
pub struct Provided {
    pub geostore: Option<Value>,
    pub coverage: Option<Value>,
}

/// Build a list of areas. Areas without a geostore are dropped.
pub async fn build_areas(
    upstream: &Upstream,
    relations: &RelationStores,
    areas: Vec<Area>,
) -> Result<Vec<Area>, ServiceError> {
    let provided = vec![Provided::default(); areas.len()];
    build(upstream, relations, areas, provided).await
}

/// Build a single area, reusing whatever geostore/coverage is already known.
/// Returns `None` when the area has no geostore.
pub async fn build_area(
    upstream: &Upstream,
    relations: &RelationStores,
    area: Area,
    provided: Provided,
) -> Result<Option<Area>, ServiceError> {
    let mut built = build(upstream, relations, vec![area], vec![provided]).await?;
    Ok(built.pop())
}

async fn build(
    upstream: &Upstream,
    relations: &RelationStores,
    areas: Vec<Area>,
    provided: Vec<Provided>,
) -> Result<Vec<Area>, ServiceError> {
    let (areas, provided): (Vec<Area>, Vec<Provided>) = areas
        .into_iter()
        .zip(provided)
        .filter(|(area, _)| area.geostore_id().is_some())
        .unzip();
    if areas.is_empty() {
        return Ok(areas);
    }
    info!("Building response for {} areas", areas.len());

    let slugs = &upstream.config().service.alerts_supported;

    let geostores = try_join_all(areas.iter().zip(&provided).map(|(area, given)| async move {
        match &given.geostore {
            Some(geostore) => Ok(geostore.clone()),
            None => geostore::get(upstream, area.geostore_id().unwrap_or_default()).await,
        }
    }));

    let coverages = try_join_all(areas.iter().zip(&provided).map(|(area, given)| async move {
        match &given.coverage {
            Some(coverage) => Ok(coverage.clone()),
            None => {
                coverage::get(upstream, area.geostore_id().unwrap_or_default(), slugs).await
            }
        }
    }));

    let template_ids = async {
        let (linked, default) = tokio::join!(
            try_join_all(
                areas
                    .iter()
                    .map(|area| relations.templates.related_for_area(&area.id))
            ),
            default_template_id(upstream),
        );
        let mut linked = linked?;
        for ids in linked.iter_mut() {
            merge_default(ids, default.as_deref());
        }
        Ok::<_, ServiceError>(linked)
    };

    let (geostores, coverages, template_ids) = tokio::try_join!(
        async { geostores.await.map_err(ServiceError::from) },
        async { coverages.await.map_err(ServiceError::from) },
        template_ids,
    )?;

    let template_objects = fetch_templates(upstream, &template_ids).await;
    let today = Utc::now().date_naive();

    let built = areas
        .into_iter()
        .zip(geostores)
        .zip(coverages)
        .zip(template_ids)
        .map(|(((mut area, geostore), coverage), ids)| {
            let layers = coverage::layers(&coverage);
            let listed = datasets::from_attribute(area.attribute("datasets"));
            let area_datasets = datasets::with_coverage(listed, &layers, today);
            let report_templates: Vec<Value> =
                ids.iter().filter_map(|id| template_objects.get(id).cloned()).collect();

            area.set_attribute("geostore", or_empty_object(geostore));
            area.set_attribute("coverage", json!(layers));
            area.set_attribute("datasets", json!(area_datasets));
            area.set_attribute("reportTemplate", Value::Array(report_templates));
            area
        })
        .collect();

    Ok(built)
}

/// Each distinct template once; failures are simply absent from the map
async fn fetch_templates(upstream: &Upstream, ids: &[Vec<String>]) -> HashMap<String, Value> {
    let mut unique: Vec<&String> = Vec::new();
    for id in ids.iter().flatten() {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    debug!("Fetching {} distinct templates", unique.len());

    let fetched = join_all(unique.iter().map(|id| templates::get(upstream, id))).await;
    unique
        .into_iter()
        .zip(fetched)
        .filter_map(|(id, template)| template.map(|t| (id.clone(), t)))
        .collect()
}

fn or_empty_object(value: Value) -> Value {
    match value {
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}

/// Keep areas whose geostore reports a size below `max_size_ha`
pub fn within_size_limit(areas: Vec<Area>, max_size_ha: f64) -> Vec<Area> {
    areas
        .into_iter()
        .filter(|area| {
            area.attribute("geostore")
                .and_then(|g| g.get("areaHa"))
                .and_then(Value::as_f64)
                .map_or(false, |ha| ha < max_size_ha)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(id: &str, area_ha: Value) -> Area {
        serde_json::from_value(json!({
            "id": id,
            "type": "area",
            "attributes": { "geostore": { "id": "g", "areaHa": area_ha } }
        }))
        .unwrap()
    }

    #[test]
    fn size_limit_is_exclusive() {
        let areas = vec![
            area("small", json!(10.0)),
            area("edge", json!(2_000_000)),
            area("huge", json!(5_000_000.5)),
        ];
        let kept = within_size_limit(areas, 2_000_000.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "small");
    }

    #[test]
    fn areas_without_numeric_size_are_dropped() {
        let areas = vec![area("text", json!("12")), area("null", Value::Null)];
        assert!(within_size_limit(areas, 2_000_000.0).is_empty());
    }

    #[test]
    fn null_geostore_becomes_an_empty_object() {
        assert_eq!(or_empty_object(Value::Null), json!({}));
        assert_eq!(or_empty_object(json!({ "id": "g" })), json!({ "id": "g" }));
    }
}

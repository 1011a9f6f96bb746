//! Backfills area↔template relations from the template ids that areas carried
//! before templates became a many-to-many link.

use serde::Serialize;
use tracing::{info, warn};

use super::upstream::Upstream;
use super::{areas, ServiceError};
use crate::api::Area;
use crate::database::{DatabaseError, RelationStore, RelationStores};

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TransformReport {
    pub areas: usize,
    pub created: usize,
    pub skipped: usize,
}

pub async fn run(
    upstream: &Upstream,
    relations: &RelationStores,
) -> Result<TransformReport, ServiceError> {
    info!("Starting template relation backfill");
    let every = areas::every_area(upstream).await?;
    let report = link_legacy_templates(relations.templates.as_ref(), &every).await?;
    info!(
        areas = report.areas,
        created = report.created,
        skipped = report.skipped,
        "Template relation backfill finished"
    );
    Ok(report)
}

async fn link_legacy_templates(
    store: &dyn RelationStore,
    areas: &[Area],
) -> Result<TransformReport, DatabaseError> {
    let mut report = TransformReport {
        areas: areas.len(),
        ..Default::default()
    };

    for area in areas {
        for template_id in area.legacy_template_ids() {
            match store.create(&area.id, &template_id).await {
                Ok(_) => report.created += 1,
                Err(DatabaseError::Conflict(_)) => report.skipped += 1,
                Err(e) => {
                    warn!("Could not link template {} to area {}: {}", template_id, area.id, e);
                    return Err(e);
                }
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryRelationStore, RelationKind};
    use serde_json::json;

    fn area(value: serde_json::Value) -> Area {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn links_legacy_templates_and_skips_existing() {
        let store = MemoryRelationStore::new(RelationKind::Template);
        store.create("a1", "tpl-1").await.unwrap();

        let areas = vec![
            area(json!({ "id": "a1", "attributes": { "reportTemplate": "tpl-1", "templateId": "tpl-2" } })),
            area(json!({ "id": "a2", "attributes": { "templateId": "tpl-1" } })),
            area(json!({ "id": "a3", "attributes": { "name": "no templates" } })),
        ];

        let report = link_legacy_templates(&store, &areas).await.unwrap();
        assert_eq!(
            report,
            TransformReport {
                areas: 3,
                created: 2,
                skipped: 1
            }
        );
        assert_eq!(store.related_for_area("a1").await.unwrap(), vec!["tpl-1", "tpl-2"]);
        assert_eq!(store.areas_for_related("tpl-1").await.unwrap(), vec!["a1", "a2"]);
    }
}

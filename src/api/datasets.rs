use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// GLAD deforestation alerts layer
pub const GLAD_SLUG: &str = "umd_as_it_happens";

/// An alert dataset shown for an area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub active: bool,
    // "1" for VIIRS, 6 for GLAD: kept verbatim
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub start_date: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub end_date: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Datasets used when an area has none of its own
pub fn global_alerts() -> Vec<Dataset> {
    vec![Dataset {
        slug: "viirs".to_string(),
        name: "VIIRS".to_string(),
        active: false,
        start_date: json!("1"),
        end_date: json!("8"),
        extra: Map::new(),
    }]
}

pub fn glad(today: NaiveDate) -> Dataset {
    Dataset {
        slug: GLAD_SLUG.to_string(),
        name: "GLAD".to_string(),
        active: false,
        start_date: json!(6),
        end_date: json!(today.format("%Y%m%d").to_string()),
        extra: Map::new(),
    }
}

/// Parse an area's `datasets` attribute; entries that are not datasets are dropped
pub fn from_attribute(value: Option<&Value>) -> Vec<Dataset> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match serde_json::from_value(item.clone()) {
                Ok(dataset) => Some(dataset),
                Err(e) => {
                    tracing::warn!("Skipping malformed area dataset {}: {}", item, e);
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Make sure exactly the first dataset is active when none is
pub fn with_active(mut datasets: Vec<Dataset>) -> Vec<Dataset> {
    if datasets.iter().any(|d| d.active) {
        return datasets;
    }
    if let Some(first) = datasets.first_mut() {
        first.active = true;
    }
    datasets
}

/// Datasets for an area given the alert layers its geostore is covered by.
/// Falls back to the global alerts, and prepends GLAD when covered but not listed.
pub fn with_coverage(list: Vec<Dataset>, layers: &[String], today: NaiveDate) -> Vec<Dataset> {
    let datasets = if list.is_empty() { global_alerts() } else { list };
    tracing::debug!(?layers, count = datasets.len(), "Parsing area datasets with coverage");

    let area_has_glad = layers.iter().any(|l| l == GLAD_SLUG);
    let datasets_have_glad = datasets.iter().any(|d| d.slug == GLAD_SLUG);
    if area_has_glad && !datasets_have_glad {
        let mut with_glad = Vec::with_capacity(datasets.len() + 1);
        with_glad.push(glad(today));
        with_glad.extend(datasets);
        return with_active(with_glad);
    }
    with_active(datasets)
}

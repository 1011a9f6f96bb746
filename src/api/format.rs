use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A JSON:API resource object: `{ id, type, attributes }`.
///
/// Members other than those three (e.g. `teams` or `reportTemplate` added to a
/// single-area response) are kept in `extra` and serialized at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type Area = Resource;
pub type Team = Resource;

impl Resource {
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    /// Geostore id the area points at, if any
    pub fn geostore_id(&self) -> Option<&str> {
        self.attribute("geostore")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn user_id(&self) -> Option<String> {
        self.attribute("userId").and_then(id_string)
    }

    pub fn name(&self) -> Option<&str> {
        self.attribute("name").and_then(Value::as_str)
    }

    /// Protected-area (WDPA) subscriptions are not forest watcher areas
    pub fn is_wdpa(&self) -> bool {
        self.attribute("wdpaid").map_or(false, is_truthy)
    }

    /// Administrative-boundary (GADM) areas carry an `admin` object with at least one value
    pub fn is_gadm(&self) -> bool {
        match self.attribute("admin") {
            Some(Value::Object(admin)) => {
                !admin.is_empty() && !admin.values().all(Value::is_null)
            }
            _ => false,
        }
    }

    /// Template ids recorded on the area by the legacy single-template model
    pub fn legacy_template_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for key in ["reportTemplate", "templateId"] {
            let value = self.extra.get(key).or_else(|| self.attributes.get(key));
            if let Some(id) = value.and_then(id_string).filter(|id| !id.is_empty()) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }
}

/// Flatten a JSON:API document into plain objects: `{data: {id, attributes}}`
/// becomes `{id, ...attributes}`; arrays are flattened element-wise.
/// A document without `data` yields `null`.
pub fn deserialize(document: Value) -> Value {
    match document {
        Value::Object(mut doc) => match doc.remove("data") {
            Some(Value::Array(items)) => {
                Value::Array(items.into_iter().map(flatten_resource).collect())
            }
            Some(data) => flatten_resource(data),
            None => Value::Null,
        },
        _ => Value::Null,
    }
}

fn flatten_resource(resource: Value) -> Value {
    match resource {
        Value::Object(mut resource) => {
            let mut out = match resource.remove("attributes") {
                Some(Value::Object(attributes)) => attributes,
                _ => Map::new(),
            };
            if let Some(id) = resource.remove("id") {
                out.insert("id".to_string(), id);
            }
            Value::Object(out)
        }
        other => other,
    }
}

/// `id` of a flattened object as a string
pub fn object_id(value: &Value) -> Option<String> {
    value.get("id").and_then(id_string)
}

/// Remote ids arrive as strings or numbers depending on the service
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_string(&value).ok_or_else(|| serde::de::Error::custom("id must be a string or a number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn area(attributes: Value) -> Area {
        serde_json::from_value(json!({ "id": "a1", "type": "area", "attributes": attributes }))
            .unwrap()
    }

    #[test]
    fn deserialize_merges_id_into_attributes() {
        let doc = json!({
            "data": {
                "type": "geoStore",
                "id": "713899292fc118a915741728ef84a2a7",
                "attributes": { "areaHa": 10.5, "bbox": [1, 2, 3, 4] }
            }
        });
        assert_eq!(
            deserialize(doc),
            json!({ "id": "713899292fc118a915741728ef84a2a7", "areaHa": 10.5, "bbox": [1, 2, 3, 4] })
        );
    }

    #[test]
    fn deserialize_handles_lists_and_missing_data() {
        let doc = json!({ "data": [ { "id": 1, "attributes": { "name": "a" } }, { "id": 2 } ] });
        assert_eq!(deserialize(doc), json!([ { "id": 1, "name": "a" }, { "id": 2 } ]));
        assert_eq!(deserialize(json!({ "errors": [] })), Value::Null);
        assert_eq!(deserialize(json!("nope")), Value::Null);
    }

    #[test]
    fn coverage_without_id_keeps_layers() {
        let doc = json!({ "data": { "type": "coverages", "attributes": { "layers": ["umd_as_it_happens"] } } });
        assert_eq!(deserialize(doc), json!({ "layers": ["umd_as_it_happens"] }));
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let team: Team = serde_json::from_value(json!({ "id": 7, "attributes": { "name": "t" } })).unwrap();
        assert_eq!(team.id, "7");
        assert_eq!(team.name(), Some("t"));
    }

    #[test]
    fn extra_members_round_trip_at_top_level() {
        let mut a = area(json!({ "name": "Brazil" }));
        a.extra.insert("teams".into(), json!([{ "id": "t1", "name": "team" }]));
        let value = serde_json::to_value(&a).unwrap();
        assert_eq!(value["teams"][0]["id"], "t1");
        assert_eq!(value["attributes"]["name"], "Brazil");
        assert_eq!(value["type"], "area");
    }

    #[test]
    fn wdpa_and_gadm_detection() {
        assert!(area(json!({ "wdpaid": 555 })).is_wdpa());
        assert!(!area(json!({ "wdpaid": null })).is_wdpa());
        assert!(!area(json!({ "wdpaid": 0 })).is_wdpa());

        assert!(area(json!({ "admin": { "adm0": "BRA", "adm1": null } })).is_gadm());
        assert!(!area(json!({ "admin": { "adm0": null, "adm1": null } })).is_gadm());
        assert!(!area(json!({ "admin": {} })).is_gadm());
        assert!(!area(json!({})).is_gadm());
    }

    #[test]
    fn geostore_and_user_ids() {
        let a = area(json!({ "geostore": "abc", "userId": "u1" }));
        assert_eq!(a.geostore_id(), Some("abc"));
        assert_eq!(a.user_id().as_deref(), Some("u1"));
        assert_eq!(area(json!({ "geostore": "" })).geostore_id(), None);
        assert_eq!(area(json!({ "geostore": null })).geostore_id(), None);
    }

    #[test]
    fn legacy_template_ids_are_collected_once() {
        let mut a = area(json!({ "templateId": "tpl-2" }));
        a.extra.insert("reportTemplate".into(), json!("tpl-1"));
        assert_eq!(a.legacy_template_ids(), vec!["tpl-1", "tpl-2"]);

        let same = area(json!({ "templateId": "tpl-1", "reportTemplate": "tpl-1" }));
        assert_eq!(same.legacy_template_ids(), vec!["tpl-1"]);
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::upstream::{Upstream, UpstreamError};

const SERVICE: &str = "control-tower";

/// The caller, as resolved from their token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedUser {
    #[serde(deserialize_with = "crate::api::format::deserialize_id")]
    pub id: String,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

/// GET /auth/user/me with the caller's Authorization header
pub async fn current_user(upstream: &Upstream) -> Result<LoggedUser, UpstreamError> {
    let base = &upstream.config().upstream.control_tower_url;
    let url = upstream.url(SERVICE, base, &["auth", "user", "me"])?;
    let profile = upstream.get_json(SERVICE, url).await?;

    // some deployments wrap the profile in `data`
    let profile = match profile {
        Value::Object(mut map) if map.contains_key("data") && !map.contains_key("id") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    let user: LoggedUser = serde_json::from_value(profile)
        .map_err(|e| UpstreamError::payload(SERVICE, e.to_string()))?;
    if user.id.is_empty() {
        return Err(UpstreamError::payload(SERVICE, "user profile has an empty id"));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_keeps_extra_fields() {
        let user: LoggedUser = serde_json::from_value(json!({
            "id": "1a10d7c6e0a37126611fd7a5",
            "role": "USER",
            "email": "user@example.org"
        }))
        .unwrap();
        assert_eq!(user.id, "1a10d7c6e0a37126611fd7a5");
        assert_eq!(user.profile.get("role"), Some(&json!("USER")));
    }
}

use serde_json::Value;
use tracing::{info, warn};

use super::upstream::Upstream;
use crate::api::Team;

const SERVICE: &str = "teams";

/// GET /teams/user/:userId. Failures are logged and treated as "no teams".
pub async fn user_teams(upstream: &Upstream, user_id: &str) -> Vec<Team> {
    info!("Getting teams for user {}", user_id);
    let base = &upstream.config().upstream.teams_api_url;
    let result = match upstream.url(SERVICE, base, &["teams", "user", user_id]) {
        Ok(url) => upstream.get_json(SERVICE, url).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(document) => {
            let teams = parse_teams(document);
            info!("Got {} teams for user {}", teams.len(), user_id);
            teams
        }
        Err(e) => {
            warn!("Error while fetching teams for user {}: {}", user_id, e);
            Vec::new()
        }
    }
}

/// GET /teams/:id. Failures are logged and reported as `None`.
pub async fn team(upstream: &Upstream, team_id: &str) -> Option<Team> {
    info!("Getting team with id {}", team_id);
    let base = &upstream.config().upstream.teams_api_url;
    let result = match upstream.url(SERVICE, base, &["teams", team_id]) {
        Ok(url) => upstream.get_json(SERVICE, url).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(mut document) => match document.get_mut("data").map(Value::take) {
            Some(data) if !data.is_null() => serde_json::from_value(data)
                .map_err(|e| warn!("Unreadable team {}: {}", team_id, e))
                .ok(),
            _ => None,
        },
        Err(e) => {
            warn!("Error while fetching team {}: {}", team_id, e);
            None
        }
    }
}

/// Teams arrive either as `{data: [...]}` or as a bare array
fn parse_teams(document: Value) -> Vec<Team> {
    let items = match document {
        Value::Object(mut doc) => match doc.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Value::Array(items) => items,
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Team>(item) {
            Ok(team) => Some(team),
            Err(e) => {
                warn!("Skipping unreadable team: {}", e);
                None
            }
        })
        .collect()
}

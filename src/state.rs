use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::RelationStores;
use crate::services::upstream::{build_http_client, Upstream};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
    pub relations: RelationStores,
}

impl AppState {
    pub fn new(config: AppConfig, relations: RelationStores) -> reqwest::Result<Self> {
        let http = build_http_client(&config.upstream)?;
        Ok(Self {
            config: Arc::new(config),
            http,
            relations,
        })
    }

    /// Upstream context carrying the given caller token
    pub fn upstream(&self, authorization: Option<String>) -> Upstream {
        Upstream::new(self.http.clone(), self.config.clone(), authorization)
    }
}

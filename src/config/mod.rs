use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub service: ServiceConfig,
    pub upstream: UpstreamConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub port: u16,
    /// Areas whose geostore reports this many hectares or more are left out of list responses
    pub area_max_size_ha: f64,
    /// Alert layer slugs sent to the coverage service
    pub alerts_supported: Vec<String>,
    /// Request body limit, sized for area images
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub control_tower_url: String,
    /// User-facing areas API (requests carry the caller's token)
    pub rw_areas_api_url: String,
    /// Areas microservice (requests carry the service token)
    pub areas_api_url: String,
    pub geostore_api_url: String,
    pub forms_api_url: String,
    pub teams_api_url: String,
    pub service_token: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL for the relation store; the in-memory store is used when absent
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let base = match env::var("CONFIG_FILE") {
            Ok(path) => Self::from_yaml_file(&path).unwrap_or_else(|e| {
                tracing::error!("{}; falling back to {:?} defaults", e, environment);
                Self::preset(environment)
            }),
            Err(_) => Self::preset(environment),
        };

        base.with_env_overrides()
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    pub fn preset(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    fn with_env_overrides(mut self) -> Self {
        // Service overrides
        if let Ok(v) = env::var("PORT") {
            self.service.port = v.parse().unwrap_or(self.service.port);
        }
        if let Ok(v) = env::var("AREA_MAX_SIZE_HA") {
            self.service.area_max_size_ha = v.parse().unwrap_or(self.service.area_max_size_ha);
        }
        if let Ok(v) = env::var("ALERTS_SUPPORTED") {
            self.service.alerts_supported = split_list(&v);
        }
        if let Ok(v) = env::var("MAX_UPLOAD_BYTES") {
            self.service.max_upload_bytes = v.parse().unwrap_or(self.service.max_upload_bytes);
        }

        // Upstream overrides
        if let Ok(v) = env::var("CONTROL_TOWER_URL") {
            self.upstream.control_tower_url = v;
        }
        if let Ok(v) = env::var("RW_AREAS_API_URL") {
            self.upstream.rw_areas_api_url = v;
        }
        if let Ok(v) = env::var("AREAS_API_URL") {
            self.upstream.areas_api_url = v;
        }
        if let Ok(v) = env::var("GEOSTORE_API_URL") {
            self.upstream.geostore_api_url = v;
        }
        if let Ok(v) = env::var("FORMS_API_URL") {
            self.upstream.forms_api_url = v;
        }
        if let Ok(v) = env::var("TEAMS_API_URL") {
            self.upstream.teams_api_url = v;
        }
        if let Ok(v) = env::var("MICROSERVICE_TOKEN") {
            self.upstream.service_token = v;
        }
        if let Ok(v) = env::var("UPSTREAM_TIMEOUT_SECS") {
            self.upstream.timeout_secs = v.parse().unwrap_or(self.upstream.timeout_secs);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = if v.trim().is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            service: ServiceConfig {
                port: 4400,
                area_max_size_ha: 2_000_000.0,
                alerts_supported: vec!["umd_as_it_happens".to_string()],
                max_upload_bytes: 50 * 1024 * 1024,
            },
            upstream: UpstreamConfig {
                control_tower_url: "http://localhost:9000".to_string(),
                rw_areas_api_url: "http://localhost:9000/v2".to_string(),
                areas_api_url: "http://localhost:9000/v2".to_string(),
                geostore_api_url: "http://localhost:9000/v1".to_string(),
                forms_api_url: "http://localhost:9000/v3".to_string(),
                teams_api_url: "http://localhost:9000/v3".to_string(),
                service_token: String::new(),
                timeout_secs: 30,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["*".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            service: ServiceConfig {
                port: 4400,
                area_max_size_ha: 2_000_000.0,
                alerts_supported: vec!["umd_as_it_happens".to_string()],
                max_upload_bytes: 50 * 1024 * 1024,
            },
            upstream: UpstreamConfig {
                control_tower_url: "https://staging-api.resourcewatch.org".to_string(),
                rw_areas_api_url: "https://staging-api.resourcewatch.org/v2".to_string(),
                areas_api_url: "https://staging-api.resourcewatch.org/v2".to_string(),
                geostore_api_url: "https://staging-api.resourcewatch.org/v1".to_string(),
                forms_api_url: "https://staging-api.resourcewatch.org/v3".to_string(),
                teams_api_url: "https://staging-api.resourcewatch.org/v3".to_string(),
                service_token: String::new(),
                timeout_secs: 15,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["*".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            service: ServiceConfig {
                port: 4400,
                area_max_size_ha: 2_000_000.0,
                alerts_supported: vec!["umd_as_it_happens".to_string()],
                max_upload_bytes: 50 * 1024 * 1024,
            },
            upstream: UpstreamConfig {
                control_tower_url: "https://api.resourcewatch.org".to_string(),
                rw_areas_api_url: "https://api.resourcewatch.org/v2".to_string(),
                areas_api_url: "https://api.resourcewatch.org/v2".to_string(),
                geostore_api_url: "https://api.resourcewatch.org/v1".to_string(),
                forms_api_url: "https://api.resourcewatch.org/v3".to_string(),
                teams_api_url: "https://api.resourcewatch.org/v3".to_string(),
                service_token: String::new(),
                timeout_secs: 10,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["*".to_string()],
            },
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

pub mod manager;
pub mod memory;
pub mod models;
pub mod relations;

use std::sync::Arc;

use thiserror::Error;

use crate::config::DatabaseConfig;

pub use manager::DatabaseManager;
pub use memory::MemoryRelationStore;
pub use models::relation::{Relation, RelationFilter, RelationKind};
pub use relations::{PgRelationStore, RelationStore};

/// Errors from the relation store
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("{0}")]
    Conflict(String),

    #[error("Refusing to delete relations without an area or related id")]
    EmptyFilter,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// The two relation tables, behind whichever backend was configured
#[derive(Clone)]
pub struct RelationStores {
    pub teams: Arc<dyn RelationStore>,
    pub templates: Arc<dyn RelationStore>,
}

impl RelationStores {
    pub fn in_memory() -> Self {
        Self {
            teams: Arc::new(MemoryRelationStore::new(RelationKind::Team)),
            templates: Arc::new(MemoryRelationStore::new(RelationKind::Template)),
        }
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            teams: Arc::new(PgRelationStore::new(pool.clone(), RelationKind::Team)),
            templates: Arc::new(PgRelationStore::new(pool, RelationKind::Template)),
        }
    }

    /// Connect to Postgres when a URL is configured, otherwise keep relations in memory
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if config.url.is_none() {
            tracing::warn!("DATABASE_URL not set; relations are kept in memory and lost on restart");
            return Ok(Self::in_memory());
        }

        let pool = DatabaseManager::connect(config).await?;
        DatabaseManager::migrate(&pool).await?;
        Ok(Self::postgres(pool))
    }

    pub fn for_kind(&self, kind: RelationKind) -> &Arc<dyn RelationStore> {
        match kind {
            RelationKind::Team => &self.teams,
            RelationKind::Template => &self.templates,
        }
    }

    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        self.teams.health_check().await?;
        self.templates.health_check().await
    }
}

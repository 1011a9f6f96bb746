use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use super::{DatabaseError, DatabaseManager, Relation, RelationFilter, RelationKind};

/// Persistence for one area link table (area↔team or area↔template)
#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Link an area to a team/template. Fails with `Conflict` if the pair already exists.
    async fn create(&self, area_id: &str, related_id: &str) -> Result<Relation, DatabaseError>;

    /// Related ids for an area, in insertion order
    async fn related_for_area(&self, area_id: &str) -> Result<Vec<String>, DatabaseError>;

    /// Area ids linked to a team/template, in insertion order
    async fn areas_for_related(&self, related_id: &str) -> Result<Vec<String>, DatabaseError>;

    /// Remove one link, returning it if it existed
    async fn delete(
        &self,
        area_id: &str,
        related_id: &str,
    ) -> Result<Option<Relation>, DatabaseError>;

    /// Remove every link matching the filter. An empty filter is rejected.
    async fn delete_all(&self, filter: &RelationFilter) -> Result<u64, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

pub struct PgRelationStore {
    pool: PgPool,
    kind: RelationKind,
}

impl PgRelationStore {
    pub fn new(pool: PgPool, kind: RelationKind) -> Self {
        Self { pool, kind }
    }

    fn returning(&self) -> String {
        format!(
            "id, area_id, {} AS related_id, created_at",
            self.kind.related_column()
        )
    }
}

#[async_trait]
impl RelationStore for PgRelationStore {
    async fn create(&self, area_id: &str, related_id: &str) -> Result<Relation, DatabaseError> {
        let table = self.kind.table();
        let column = self.kind.related_column();

        let existing: Option<(uuid::Uuid,)> = sqlx::query_as(&format!(
            "SELECT id FROM {table} WHERE area_id = $1 AND {column} = $2 LIMIT 1"
        ))
        .bind(area_id)
        .bind(related_id)
        .fetch_optional(&self.pool)
        .await?;
        if existing.is_some() {
            return Err(DatabaseError::Conflict(self.kind.duplicate_message()));
        }

        let relation = Relation::new(area_id, related_id);
        let sql = format!(
            "INSERT INTO {table} (id, area_id, {column}, created_at) VALUES ($1, $2, $3, $4) RETURNING {}",
            self.returning()
        );
        let saved = sqlx::query_as::<_, Relation>(&sql)
            .bind(relation.id)
            .bind(&relation.area_id)
            .bind(&relation.related_id)
            .bind(relation.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent insert of the same pair
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    DatabaseError::Conflict(self.kind.duplicate_message())
                }
                other => DatabaseError::Sqlx(other),
            })?;

        info!("Linked area {} to {} {}", area_id, self.kind.label(), related_id);
        Ok(saved)
    }

    async fn related_for_area(&self, area_id: &str) -> Result<Vec<String>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE area_id = $1 ORDER BY seq",
            self.kind.related_column(),
            self.kind.table()
        );
        let ids = sqlx::query_scalar::<_, String>(&sql)
            .bind(area_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn areas_for_related(&self, related_id: &str) -> Result<Vec<String>, DatabaseError> {
        let sql = format!(
            "SELECT area_id FROM {} WHERE {} = $1 ORDER BY seq",
            self.kind.table(),
            self.kind.related_column()
        );
        let ids = sqlx::query_scalar::<_, String>(&sql)
            .bind(related_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn delete(
        &self,
        area_id: &str,
        related_id: &str,
    ) -> Result<Option<Relation>, DatabaseError> {
        let table = self.kind.table();
        let column = self.kind.related_column();
        let sql = format!(
            "DELETE FROM {table} WHERE id = (
                SELECT id FROM {table} WHERE area_id = $1 AND {column} = $2 ORDER BY seq LIMIT 1
             ) RETURNING {}",
            self.returning()
        );
        let removed = sqlx::query_as::<_, Relation>(&sql)
            .bind(area_id)
            .bind(related_id)
            .fetch_optional(&self.pool)
            .await?;

        if removed.is_some() {
            info!("Unlinked area {} from {} {}", area_id, self.kind.label(), related_id);
        }
        Ok(removed)
    }

    async fn delete_all(&self, filter: &RelationFilter) -> Result<u64, DatabaseError> {
        let table = self.kind.table();
        let column = self.kind.related_column();

        let result = match (&filter.area_id, &filter.related_id) {
            (Some(area_id), Some(related_id)) => {
                sqlx::query(&format!(
                    "DELETE FROM {table} WHERE area_id = $1 AND {column} = $2"
                ))
                .bind(area_id)
                .bind(related_id)
                .execute(&self.pool)
                .await?
            }
            (Some(area_id), None) => {
                sqlx::query(&format!("DELETE FROM {table} WHERE area_id = $1"))
                    .bind(area_id)
                    .execute(&self.pool)
                    .await?
            }
            (None, Some(related_id)) => {
                sqlx::query(&format!("DELETE FROM {table} WHERE {column} = $1"))
                    .bind(related_id)
                    .execute(&self.pool)
                    .await?
            }
            (None, None) => return Err(DatabaseError::EmptyFilter),
        };

        info!(
            "Removed {} {} relations matching {:?}",
            result.rows_affected(),
            self.kind.label(),
            filter
        );
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}

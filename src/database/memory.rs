//! In-memory relation store, used when no database is configured and in tests.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DatabaseError, Relation, RelationFilter, RelationKind, RelationStore};

pub struct MemoryRelationStore {
    kind: RelationKind,
    rows: RwLock<Vec<Relation>>,
}

impl MemoryRelationStore {
    pub fn new(kind: RelationKind) -> Self {
        Self {
            kind,
            rows: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl RelationStore for MemoryRelationStore {
    async fn create(&self, area_id: &str, related_id: &str) -> Result<Relation, DatabaseError> {
        let mut rows = self.rows.write().await;
        if rows
            .iter()
            .any(|r| r.area_id == area_id && r.related_id == related_id)
        {
            return Err(DatabaseError::Conflict(self.kind.duplicate_message()));
        }
        let relation = Relation::new(area_id, related_id);
        rows.push(relation.clone());
        Ok(relation)
    }

    async fn related_for_area(&self, area_id: &str) -> Result<Vec<String>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|r| r.area_id == area_id)
            .map(|r| r.related_id.clone())
            .collect())
    }

    async fn areas_for_related(&self, related_id: &str) -> Result<Vec<String>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|r| r.related_id == related_id)
            .map(|r| r.area_id.clone())
            .collect())
    }

    async fn delete(
        &self,
        area_id: &str,
        related_id: &str,
    ) -> Result<Option<Relation>, DatabaseError> {
        let mut rows = self.rows.write().await;
        let position = rows
            .iter()
            .position(|r| r.area_id == area_id && r.related_id == related_id);
        Ok(position.map(|i| rows.remove(i)))
    }

    async fn delete_all(&self, filter: &RelationFilter) -> Result<u64, DatabaseError> {
        if filter.is_empty() {
            return Err(DatabaseError::EmptyFilter);
        }
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| !filter.matches(r));
        Ok((before - rows.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

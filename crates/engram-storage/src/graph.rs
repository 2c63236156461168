//! Graph memory operations
//!
//! Typed entities and typed relationships. Edges always reference resolved
//! entity record ids; endpoint strings are resolved id-first, then by the
//! indexed `name` field. The dynamic per-type edge tables of earlier designs
//! collapse into one `relationships` table with a `relationship_type` column.

use crate::client::Storage;
use crate::error::{StorageError, StorageResult};
use crate::ids::record_key;
use crate::models::{Entity, Relationship, TraversalStep};
use serde::Deserialize;
use std::collections::HashSet;
use surrealdb::RecordId;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct IdRow {
    id: RecordId,
}

#[derive(Debug, Deserialize)]
struct NameRow {
    name: String,
}

impl Storage {
    /// Create a graph node; returns the generated id
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the write fails.
    pub async fn create_entity(
        &self,
        entity_type: &str,
        name: &str,
        properties: Option<serde_json::Value>,
    ) -> StorageResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.db()
            .query(
                "CREATE type::thing('entities', $id) CONTENT { \
                 entity_type: $entity_type, name: $name, properties: $properties, \
                 created_at: time::now() } RETURN NONE",
            )
            .bind(("id", id.clone()))
            .bind(("entity_type", entity_type.to_string()))
            .bind(("name", name.to_string()))
            .bind(("properties", properties))
            .await?
            .check()?;
        self.refresh_graph_stats().await?;
        Ok(id)
    }

    /// Read an entity by record id or by name
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn get_entity(&self, entity_ref: &str) -> StorageResult<Option<Entity>> {
        let Some(record) = self.resolve_entity(entity_ref).await? else {
            return Ok(None);
        };
        let mut response = self
            .db()
            .query("SELECT * FROM entities WHERE id = $record LIMIT 1")
            .bind(("record", record))
            .await?
            .check()?;
        let mut rows: Vec<Entity> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.pop())
    }

    /// Delete an entity and every edge touching it; returns whether it existed
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the delete fails.
    pub async fn delete_entity(&self, entity_ref: &str) -> StorageResult<bool> {
        let Some(record) = self.resolve_entity(entity_ref).await? else {
            return Ok(false);
        };
        self.db()
            .query(
                "DELETE relationships WHERE from_entity = $record OR to_entity = $record; \
                 DELETE $record",
            )
            .bind(("record", record))
            .await?
            .check()?;
        self.refresh_graph_stats().await?;
        Ok(true)
    }

    /// Create a typed edge between two resolved endpoints; returns its id
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Resolution` naming the endpoint that could not
    /// be resolved.
    pub async fn create_relationship(
        &self,
        from_ref: &str,
        to_ref: &str,
        relationship_type: &str,
        properties: Option<serde_json::Value>,
    ) -> StorageResult<String> {
        let from = self
            .resolve_entity(from_ref)
            .await?
            .ok_or_else(|| StorageError::Resolution(from_ref.to_string()))?;
        let to = self
            .resolve_entity(to_ref)
            .await?
            .ok_or_else(|| StorageError::Resolution(to_ref.to_string()))?;

        let id = Uuid::new_v4().simple().to_string();
        self.db()
            .query(
                "CREATE type::thing('relationships', $id) CONTENT { \
                 from_entity: $from, to_entity: $to, relationship_type: $relationship_type, \
                 properties: $properties, created_at: time::now() } RETURN NONE",
            )
            .bind(("id", id.clone()))
            .bind(("from", from))
            .bind(("to", to))
            .bind(("relationship_type", relationship_type.to_string()))
            .bind(("properties", properties))
            .await?
            .check()?;
        self.refresh_graph_stats().await?;
        Ok(id)
    }

    /// Breadth-first traversal from a start entity up to `max_depth` hops
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Resolution` when the start entity is unknown.
    pub async fn traverse(
        &self,
        start_ref: &str,
        relationship_type: Option<&str>,
        max_depth: usize,
    ) -> StorageResult<Vec<TraversalStep>> {
        const STEP_CAP: usize = 200;

        let start = self
            .resolve_entity(start_ref)
            .await?
            .ok_or_else(|| StorageError::Resolution(start_ref.to_string()))?;

        let mut visited: HashSet<String> = HashSet::from([start.to_string()]);
        let mut frontier = vec![start];
        let mut steps = Vec::new();

        for depth in 1..=max_depth.max(1) {
            if frontier.is_empty() || steps.len() >= STEP_CAP {
                break;
            }
            let edges = self
                .outgoing_edges(&frontier, relationship_type)
                .await?;
            let mut next = Vec::new();
            for edge in edges {
                let target_key = edge.to_entity.to_string();
                if !visited.insert(target_key) {
                    continue;
                }
                if let Some(entity) = self.entity_by_record(&edge.to_entity).await? {
                    steps.push(TraversalStep {
                        depth,
                        relationship_type: edge.relationship_type.clone(),
                        entity_id: entity.id.key().to_string(),
                        entity_name: entity.name,
                        entity_type: entity.entity_type,
                    });
                }
                next.push(edge.to_entity);
                if steps.len() >= STEP_CAP {
                    break;
                }
            }
            frontier = next;
        }
        Ok(steps)
    }

    /// Distinct entity names, for "did you mean" on empty reads
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` when the read fails.
    pub async fn list_entity_names(&self) -> StorageResult<Vec<String>> {
        let mut response = self
            .db()
            .query("SELECT name FROM entities GROUP BY name")
            .await?
            .check()?;
        let rows: Vec<NameRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    /// Resolve an endpoint string: record id first, then indexed name lookup
    async fn resolve_entity(&self, entity_ref: &str) -> StorageResult<Option<RecordId>> {
        let key = record_key(entity_ref, "entities").to_string();
        let mut response = self
            .db()
            .query("SELECT id FROM type::thing('entities', $key)")
            .bind(("key", key))
            .await?
            .check()?;
        let by_id: Option<IdRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        if let Some(row) = by_id {
            return Ok(Some(row.id));
        }

        let mut response = self
            .db()
            .query("SELECT id FROM entities WHERE name = $name LIMIT 1")
            .bind(("name", entity_ref.to_string()))
            .await?
            .check()?;
        let rows: Vec<IdRow> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.into_iter().next().map(|r| r.id))
    }

    async fn entity_by_record(&self, record: &RecordId) -> StorageResult<Option<Entity>> {
        let mut response = self
            .db()
            .query("SELECT * FROM entities WHERE id = $record LIMIT 1")
            .bind(("record", record.clone()))
            .await?
            .check()?;
        let mut rows: Vec<Entity> = response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(rows.pop())
    }

    async fn outgoing_edges(
        &self,
        from: &[RecordId],
        relationship_type: Option<&str>,
    ) -> StorageResult<Vec<Relationship>> {
        let sql = if relationship_type.is_some() {
            "SELECT * FROM relationships WHERE from_entity INSIDE $from \
             AND relationship_type = $relationship_type"
        } else {
            "SELECT * FROM relationships WHERE from_entity INSIDE $from"
        };
        let mut query = self.db().query(sql).bind(("from", from.to_vec()));
        if let Some(rel_type) = relationship_type {
            query = query.bind(("relationship_type", rel_type.to_string()));
        }
        let mut response = query.await?.check()?;
        response
            .take(0)
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::{Storage, StorageError};

    async fn storage() -> Storage {
        let storage = Storage::connect_memory(4).await.unwrap();
        storage.initialize_schema().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn entities_resolve_by_id_and_name() {
        let storage = storage().await;
        let id = storage
            .create_entity("person", "ada", None)
            .await
            .unwrap();

        let by_id = storage.get_entity(&id).await.unwrap().unwrap();
        assert_eq!(by_id.name, "ada");

        let by_name = storage.get_entity("ada").await.unwrap().unwrap();
        assert_eq!(by_name.entity_type, "person");

        assert!(storage.get_entity("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn relationships_require_resolved_endpoints() {
        let storage = storage().await;
        storage.create_entity("person", "ada", None).await.unwrap();

        let err = storage
            .create_relationship("ada", "charles", "knows", None)
            .await
            .unwrap_err();
        match err {
            StorageError::Resolution(name) => assert_eq!(name, "charles"),
            other => panic!("expected resolution error, got {other:?}"),
        }

        storage
            .create_entity("person", "charles", None)
            .await
            .unwrap();
        storage
            .create_relationship("ada", "charles", "knows", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn traversal_walks_typed_edges_breadth_first() {
        let storage = storage().await;
        storage.create_entity("person", "a", None).await.unwrap();
        storage.create_entity("person", "b", None).await.unwrap();
        storage.create_entity("person", "c", None).await.unwrap();
        storage
            .create_relationship("a", "b", "knows", None)
            .await
            .unwrap();
        storage
            .create_relationship("b", "c", "knows", None)
            .await
            .unwrap();
        storage
            .create_relationship("a", "c", "ignores", None)
            .await
            .unwrap();

        let steps = storage.traverse("a", Some("knows"), 2).await.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].entity_name, "b");
        assert_eq!(steps[0].depth, 1);
        assert_eq!(steps[1].entity_name, "c");
        assert_eq!(steps[1].depth, 2);

        let one_hop = storage.traverse("a", None, 1).await.unwrap();
        assert_eq!(one_hop.len(), 2); // b via knows, c via ignores
    }

    #[tokio::test]
    async fn deleting_an_entity_removes_its_edges() {
        let storage = storage().await;
        storage.create_entity("person", "a", None).await.unwrap();
        storage.create_entity("person", "b", None).await.unwrap();
        storage
            .create_relationship("a", "b", "knows", None)
            .await
            .unwrap();

        assert!(storage.delete_entity("b").await.unwrap());
        let steps = storage.traverse("a", None, 1).await.unwrap();
        assert!(steps.is_empty());
        assert!(!storage.delete_entity("b").await.unwrap());
    }
}

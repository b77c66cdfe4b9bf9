//! The index backend collaborator.
//!
//! The manager depends only on this trait; a concrete Elasticsearch/OpenSearch
//! (or other document store) client is an integration concern layered on top,
//! not part of this crate's design — see §6 of the design document.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Cluster/index health, as reported by [`IndexBackend::health`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexHealth {
    Green,
    Yellow,
    Red,
    /// The index does not exist.
    Missing,
}

impl IndexHealth {
    /// Whether this health is acceptable for bootstrap to proceed.
    pub fn is_usable(self) -> bool {
        matches!(self, IndexHealth::Green | IndexHealth::Yellow)
    }
}

/// A field mapping for a dedicated index, as created by [`IndexBackend::create_index`].
#[derive(Debug, Clone)]
pub struct IndexDescriptor {
    /// Document type name hosted in this index.
    pub document_type: String,
    /// Field name -> field type (e.g. `"keyword"`, `"int"`, `"date"`, `"text"`).
    pub fields: Vec<(String, String)>,
}

impl IndexDescriptor {
    /// The fixed mapping for the migration state index (§4.3): id (keyword),
    /// version (int), migrationType (keyword), startedUtc/completedUtc
    /// (date), errorMessage (text).
    pub fn migration_state() -> Self {
        IndexDescriptor {
            document_type: "migrations".to_string(),
            fields: vec![
                ("id".to_string(), "keyword".to_string()),
                ("version".to_string(), "int".to_string()),
                ("migrationType".to_string(), "keyword".to_string()),
                ("startedUtc".to_string(), "date".to_string()),
                ("completedUtc".to_string(), "date".to_string()),
                ("errorMessage".to_string(), "text".to_string()),
            ],
        }
    }
}

/// What the manager needs from the index subsystem: index lifecycle plus the
/// document CRUD primitives the state repository is built on.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Idempotent index creation. Must verify the index is `Green`/`Yellow`
    /// after creation (or immediately, if it already existed) and fail
    /// otherwise.
    async fn create_index(&self, name: &str, descriptor: &IndexDescriptor) -> Result<()>;

    /// Idempotent index deletion.
    async fn delete_index(&self, name: &str) -> Result<()>;

    /// Whether the named index exists.
    async fn index_exists(&self, name: &str) -> Result<bool>;

    /// Report the health of the named index.
    async fn health(&self, name: &str) -> Result<IndexHealth>;

    /// Make previously-written documents visible to subsequent reads.
    async fn refresh(&self, name: &str) -> Result<()>;

    /// Upsert a document by id.
    async fn upsert_document(&self, index: &str, id: &str, document: Value) -> Result<()>;

    /// Return every document in the index.
    async fn get_all_documents(&self, index: &str) -> Result<Vec<Value>>;

    /// Return a single document by id, or `None` if absent.
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>>;
}

/// An in-memory [`IndexBackend`].
///
/// Used as this crate's test double, and as a reference implementation for
/// integrators exercising the manager before wiring up a real cluster.
#[derive(Default)]
pub struct MemoryIndexBackend {
    indices: tokio::sync::Mutex<std::collections::HashMap<String, std::collections::HashMap<String, Value>>>,
}

impl MemoryIndexBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexBackend for MemoryIndexBackend {
    async fn create_index(&self, name: &str, _descriptor: &IndexDescriptor) -> Result<()> {
        self.indices
            .lock()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        self.indices.lock().await.remove(name);
        Ok(())
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(self.indices.lock().await.contains_key(name))
    }

    async fn health(&self, name: &str) -> Result<IndexHealth> {
        Ok(if self.indices.lock().await.contains_key(name) {
            IndexHealth::Green
        } else {
            IndexHealth::Missing
        })
    }

    async fn refresh(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn upsert_document(&self, index: &str, id: &str, document: Value) -> Result<()> {
        self.indices
            .lock()
            .await
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn get_all_documents(&self, index: &str) -> Result<Vec<Value>> {
        Ok(self
            .indices
            .lock()
            .await
            .get(index)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .indices
            .lock()
            .await
            .get(index)
            .and_then(|docs| docs.get(id).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_exists() {
        let backend = MemoryIndexBackend::new();
        assert!(!backend.index_exists("migrations").await.unwrap());
        backend
            .create_index("migrations", &IndexDescriptor::migration_state())
            .await
            .unwrap();
        assert!(backend.index_exists("migrations").await.unwrap());
        assert_eq!(backend.health("migrations").await.unwrap(), IndexHealth::Green);
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let backend = MemoryIndexBackend::new();
        backend
            .create_index("migrations", &IndexDescriptor::migration_state())
            .await
            .unwrap();
        backend
            .upsert_document("migrations", "3", serde_json::json!({"version": 3}))
            .await
            .unwrap();
        backend
            .upsert_document("migrations", "3", serde_json::json!({"version": 3, "done": true}))
            .await
            .unwrap();
        let all = backend.get_all_documents("migrations").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["done"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn delete_then_missing() {
        let backend = MemoryIndexBackend::new();
        backend
            .create_index("migrations", &IndexDescriptor::migration_state())
            .await
            .unwrap();
        backend.delete_index("migrations").await.unwrap();
        assert!(!backend.index_exists("migrations").await.unwrap());
        assert_eq!(backend.health("migrations").await.unwrap(), IndexHealth::Missing);
    }
}

//! The durable per-migration state record, and the repository over it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::IndexBackend;
use crate::error::{Result, WaymarkError};
use crate::migration::MigrationType;

/// The durable document written to the state index after every migration
/// attempt. Always reflects the *latest* attempt for its id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrationStateRecord {
    /// Identity string: `str(version)` for Versioned/VersionedAndResumable,
    /// or the migration's name for Repeatable.
    pub id: String,
    /// Version number; 0 for a Repeatable migration with no version on record.
    pub version: u64,
    #[serde(rename = "migrationType")]
    pub migration_type: MigrationType,
    #[serde(rename = "startedUtc")]
    pub started_utc: DateTime<Utc>,
    #[serde(rename = "completedUtc", skip_serializing_if = "Option::is_none")]
    pub completed_utc: Option<DateTime<Utc>>,
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl MigrationStateRecord {
    /// Whether this record reflects a successful attempt.
    pub fn is_completed(&self) -> bool {
        self.completed_utc.is_some()
    }
}

/// Thin typed interface over the state index: add/list/lookup.
///
/// No transactional semantics beyond single-document upsert; reads
/// immediately following a write in the same process see it only after an
/// explicit [`IndexBackend::refresh`] (issued by the manager, not here).
pub struct StateRepository<'a, B: IndexBackend> {
    backend: &'a B,
    index: String,
}

impl<'a, B: IndexBackend> StateRepository<'a, B> {
    pub fn new(backend: &'a B, index: impl Into<String>) -> Self {
        Self {
            backend,
            index: index.into(),
        }
    }

    /// Upsert a state record by id.
    pub async fn add(&self, state: &MigrationStateRecord) -> Result<()> {
        let doc = serde_json::to_value(state)
            .map_err(|e| WaymarkError::Storage(format!("failed to encode state record: {e}")))?;
        self.backend.upsert_document(&self.index, &state.id, doc).await
    }

    /// Return every record in the state index.
    pub async fn get_all(&self) -> Result<Vec<MigrationStateRecord>> {
        let docs = self.backend.get_all_documents(&self.index).await?;
        docs.into_iter()
            .map(|doc| {
                serde_json::from_value(doc)
                    .map_err(|e| WaymarkError::Storage(format!("failed to decode state record: {e}")))
            })
            .collect()
    }

    /// Return a single record by id, or `None` if absent.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<MigrationStateRecord>> {
        match self.backend.get_document(&self.index, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc).map_err(|e| {
                WaymarkError::Storage(format!("failed to decode state record: {e}"))
            })?)),
            None => Ok(None),
        }
    }
}

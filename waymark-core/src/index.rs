//! Migration index lifecycle (§4.3): a dedicated index hosting state records.

use crate::backend::{IndexBackend, IndexDescriptor};
use crate::error::{Result, WaymarkError};

/// Create the migration state index if it does not already exist.
///
/// Idempotent: if the index is already present this is a no-op, after a
/// health check confirms it is `Green`/`Yellow`. Fails with `Storage` if the
/// index is unhealthy.
pub async fn ensure_migration_index<B: IndexBackend>(backend: &B, name: &str) -> Result<()> {
    if !backend.index_exists(name).await? {
        log::info!("Creating migration index '{}'", name);
        backend
            .create_index(name, &IndexDescriptor::migration_state())
            .await?;
    }

    let health = backend.health(name).await?;
    if !health.is_usable() {
        return Err(WaymarkError::Storage(format!(
            "migration index '{}' is unhealthy: {:?}",
            name, health
        )));
    }

    Ok(())
}

/// Delete the migration state index as a whole, destroying every state record.
pub async fn drop_migration_index<B: IndexBackend>(backend: &B, name: &str) -> Result<()> {
    log::info!("Deleting migration index '{}'", name);
    backend.delete_index(name).await
}

//! Pure status computation (§4.4) and the one-time bootstrap policy (§4.5).

use chrono::Utc;

use crate::backend::IndexBackend;
use crate::migration::{Migration, MigrationType};
use crate::state::{MigrationStateRecord, StateRepository};
use crate::error::Result;

/// A registered migration that status computation has determined needs to run.
#[derive(Debug, Clone)]
pub struct PendingMigration {
    /// Index into the manager's registered-migration list.
    pub index: usize,
    /// The migration's identity (state record primary key).
    pub identity: String,
    pub migration_type: MigrationType,
    /// The version to run at (the migration's own declared version).
    pub version: u64,
}

/// The result of a status query: which migrations need to run, whether any
/// do, and the highest successfully-completed versioned migration.
#[derive(Debug, Clone, Default)]
pub struct MigrationStatus {
    pub pending_migrations: Vec<PendingMigration>,
    pub needs_migration: bool,
    pub current_version: u64,
}

/// Registered migrations, filtered per §4.4 step 1: drop
/// Versioned/VersionedAndResumable migrations with no version (they are
/// ignored entirely).
fn filtered_migrations<'a>(
    migrations: &'a [Box<dyn Migration>],
) -> Vec<(usize, &'a dyn Migration)> {
    migrations
        .iter()
        .enumerate()
        .filter(|(_, m)| !m.migration_type().is_versioned() || m.version().is_some())
        .map(|(i, m)| (i, m.as_ref()))
        .collect()
}

/// Pure §4.4 algorithm (steps 2-5) over an already-filtered migration list
/// and the persisted state records.
fn compute(filtered: &[(usize, &dyn Migration)], records: &[MigrationStateRecord]) -> MigrationStatus {
    // Step 2: current_version.
    let current_version = records
        .iter()
        .filter(|r| {
            matches!(
                r.migration_type,
                MigrationType::Versioned | MigrationType::VersionedAndResumable
            ) && r.is_completed()
        })
        .map(|r| r.version)
        .max()
        .unwrap_or(0);

    // Step 3: pending predicate, per migration.
    let mut versioned_pending = Vec::new();
    let mut repeatable_pending = Vec::new();

    for (index, m) in filtered {
        match m.migration_type() {
            MigrationType::Versioned | MigrationType::VersionedAndResumable => {
                let version = m.version().expect("filtered migrations always have a version");
                let id = version.to_string();
                let completed = records.iter().any(|r| r.id == id && r.is_completed());
                if !completed {
                    versioned_pending.push(PendingMigration {
                        index: *index,
                        identity: id,
                        migration_type: m.migration_type(),
                        version,
                    });
                }
            }
            MigrationType::Repeatable => {
                let Some(version) = m.version() else {
                    continue;
                };
                let identity = m.name().to_string();
                let existing = records.iter().find(|r| r.id == identity);
                let pending = match existing {
                    None => true,
                    Some(r) => r.version < version,
                };
                if pending {
                    repeatable_pending.push(PendingMigration {
                        index: *index,
                        identity,
                        migration_type: MigrationType::Repeatable,
                        version,
                    });
                }
            }
        }
    }

    // Step 4: order — versioned ascending by version (registration order breaks
    // ties), then repeatable in registration order (already in that order
    // since `filtered` preserves registration order and we pushed in a single pass).
    versioned_pending.sort_by(|a, b| a.version.cmp(&b.version).then(a.index.cmp(&b.index)));

    let mut pending_migrations = versioned_pending;
    pending_migrations.extend(repeatable_pending);

    MigrationStatus {
        needs_migration: !pending_migrations.is_empty(),
        pending_migrations,
        current_version,
    }
}

/// Highest version among registered Versioned/VersionedAndResumable migrations.
fn max_registered_version(filtered: &[(usize, &dyn Migration)]) -> Option<u64> {
    filtered
        .iter()
        .filter(|(_, m)| m.migration_type().is_versioned())
        .filter_map(|(_, m)| m.version())
        .max()
}

/// Compute the current [`MigrationStatus`], performing the one-time
/// bootstrap write (§4.5) first if this is a fresh installation.
pub async fn compute_status<B: IndexBackend>(
    migrations: &[Box<dyn Migration>],
    repo: &StateRepository<'_, B>,
) -> Result<MigrationStatus> {
    let filtered = filtered_migrations(migrations);
    let mut records = repo.get_all().await?;

    if records.is_empty() {
        if let Some(max_version) = max_registered_version(&filtered) {
            let now = Utc::now();
            let bootstrap = MigrationStateRecord {
                id: max_version.to_string(),
                version: max_version,
                migration_type: MigrationType::Versioned,
                started_utc: now,
                completed_utc: Some(now),
                error_message: None,
            };
            log::info!(
                "Bootstrapping fresh installation: recording versions up to {} as already applied",
                max_version
            );
            repo.add(&bootstrap).await?;
            records.push(bootstrap);
        }
    }

    Ok(compute(&filtered, &records))
}

//! Manager-level integration tests, covering the six end-to-end scenarios
//! against the crate's in-memory reference collaborators: an ignored
//! version-less migration, bootstrap at latest, a pending upgrade, a
//! repeatable migration re-running on a version bump, a non-resumable
//! failure, and a resumable migration recovering within its retry budget.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use waymark_core::backend::MemoryIndexBackend;
use waymark_core::lock::LocalLockProvider;
use waymark_core::migration::{Migration, MigrationType};
use waymark_core::{
    Manager, MigrationResult, MigrationStateRecord, Result, StateRepository, WaymarkError,
};

struct ScriptedMigration {
    kind: MigrationType,
    version: Option<u64>,
    name: &'static str,
    fail_until_attempt: u32,
    attempts: Arc<AtomicU32>,
}

impl ScriptedMigration {
    fn versioned(version: u64) -> Self {
        Self {
            kind: MigrationType::Versioned,
            version: Some(version),
            name: "versioned",
            fail_until_attempt: 0,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl Migration for ScriptedMigration {
    fn migration_type(&self) -> MigrationType {
        self.kind
    }
    fn version(&self) -> Option<u64> {
        self.version
    }
    fn name(&self) -> &str {
        self.name
    }
    async fn run(&self) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_until_attempt {
            return Err(WaymarkError::Migration {
                id: self.name.to_string(),
                message: format!("attempt {attempt} failed"),
            });
        }
        Ok(())
    }
}

/// A repeatable migration whose reported version can be bumped externally,
/// to exercise re-runs without re-registering against a fresh manager.
struct RepeatableMigration {
    name: &'static str,
    version: Arc<AtomicU64>,
    attempts: Arc<AtomicU32>,
}

#[async_trait]
impl Migration for RepeatableMigration {
    fn migration_type(&self) -> MigrationType {
        MigrationType::Repeatable
    }
    fn version(&self) -> Option<u64> {
        Some(self.version.load(Ordering::SeqCst))
    }
    fn name(&self) -> &str {
        self.name
    }
    async fn run(&self) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn manager() -> Manager<MemoryIndexBackend, LocalLockProvider> {
    Manager::new(MemoryIndexBackend::new(), LocalLockProvider::new())
}

/// A Versioned migration with no version is ignored entirely: never pending,
/// never run, and contributes nothing to `current_version`.
#[tokio::test]
async fn ignored_version_less_migration_is_never_applied() {
    let manager = manager();
    manager
        .register(Box::new(ScriptedMigration {
            kind: MigrationType::Versioned,
            version: None,
            name: "no_version",
            fail_until_attempt: 0,
            attempts: Arc::new(AtomicU32::new(0)),
        }))
        .unwrap();

    let status = manager.get_migration_status().await.unwrap();
    assert!(!status.needs_migration);
    assert_eq!(status.current_version, 0);

    let result = manager.run_migrations_async().await.unwrap();
    assert_eq!(result, MigrationResult::Success);
}

/// A fresh installation bootstraps to the highest registered version: the
/// one-time bootstrap write marks it as already applied, so no run is needed.
#[tokio::test]
async fn fresh_installation_bootstraps_to_latest_registered_version() {
    let manager = manager();
    manager.register(Box::new(ScriptedMigration::versioned(1))).unwrap();
    manager.register(Box::new(ScriptedMigration::versioned(2))).unwrap();

    let status = manager.get_migration_status().await.unwrap();
    assert!(!status.needs_migration);
    assert_eq!(status.current_version, 2);

    let result = manager.run_migrations_async().await.unwrap();
    assert_eq!(result, MigrationResult::Success);
}

/// An installation behind the registered set applies every pending versioned
/// migration, in ascending order, and ends up at the new current version.
#[tokio::test]
async fn pending_versioned_migrations_run_in_ascending_order() {
    let backend = MemoryIndexBackend::new();

    // Seed the state index as if version 1 was applied by a prior install.
    let repo = StateRepository::new(&backend, "migrations");
    repo.add(&MigrationStateRecord {
        id: "1".to_string(),
        version: 1,
        migration_type: MigrationType::Versioned,
        started_utc: Utc::now(),
        completed_utc: Some(Utc::now()),
        error_message: None,
    })
    .await
    .unwrap();

    let manager = Manager::new(backend, LocalLockProvider::new());
    manager.register(Box::new(ScriptedMigration::versioned(1))).unwrap();
    manager.register(Box::new(ScriptedMigration::versioned(3))).unwrap();
    manager.register(Box::new(ScriptedMigration::versioned(2))).unwrap();

    let status = manager.get_migration_status().await.unwrap();
    assert!(status.needs_migration);
    assert_eq!(status.current_version, 1);
    let pending_versions: Vec<u64> = status.pending_migrations.iter().map(|p| p.version).collect();
    assert_eq!(pending_versions, vec![2, 3]);

    let result = manager.run_migrations_async().await.unwrap();
    assert_eq!(result, MigrationResult::Success);

    let status_after = manager.get_migration_status().await.unwrap();
    assert!(!status_after.needs_migration);
    assert_eq!(status_after.current_version, 3);
}

/// A repeatable migration re-runs whenever its declared version advances
/// past the last recorded version, and is skipped otherwise.
#[tokio::test]
async fn repeatable_migration_reruns_only_on_version_bump() {
    let manager = manager();
    let version = Arc::new(AtomicU64::new(1));
    let attempts = Arc::new(AtomicU32::new(0));
    manager
        .register(Box::new(RepeatableMigration {
            name: "reindex",
            version: version.clone(),
            attempts: attempts.clone(),
        }))
        .unwrap();

    let result = manager.run_migrations_async().await.unwrap();
    assert_eq!(result, MigrationResult::Success);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    // Re-querying at the same version finds nothing pending.
    let status = manager.get_migration_status().await.unwrap();
    assert!(!status.needs_migration);
    manager.run_migrations_async().await.unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    // Bumping the version triggers exactly one more run.
    version.store(2, Ordering::SeqCst);
    let status2 = manager.get_migration_status().await.unwrap();
    assert!(status2.needs_migration);
    let result2 = manager.run_migrations_async().await.unwrap();
    assert_eq!(result2, MigrationResult::Success);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

/// Seed a completed record for `version` as if a prior install already
/// applied it, so a freshly-registered migration at a later version is
/// exercised for real instead of being swallowed by the bootstrap path.
async fn seed_completed(backend: &MemoryIndexBackend, version: u64) {
    let repo = StateRepository::new(backend, "migrations");
    repo.add(&MigrationStateRecord {
        id: version.to_string(),
        version,
        migration_type: MigrationType::Versioned,
        started_utc: Utc::now(),
        completed_utc: Some(Utc::now()),
        error_message: None,
    })
    .await
    .unwrap();
}

/// A non-resumable migration's failure is terminal: the run stops
/// immediately and is reported as failed.
#[tokio::test]
async fn non_resumable_migration_failure_halts_the_run() {
    let backend = MemoryIndexBackend::new();
    seed_completed(&backend, 1).await;
    let manager = Manager::new(backend, LocalLockProvider::new());
    manager
        .register(Box::new(ScriptedMigration {
            kind: MigrationType::Versioned,
            version: Some(2),
            name: "flaky",
            fail_until_attempt: u32::MAX,
            attempts: Arc::new(AtomicU32::new(0)),
        }))
        .unwrap();

    let result = manager.run_migrations_async().await.unwrap();
    assert_eq!(result, MigrationResult::Failed);
}

/// A resumable migration that fails on its first attempts but succeeds
/// within its 3-attempt retry budget leaves the run as a whole successful.
#[tokio::test]
async fn resumable_migration_recovers_within_retry_budget() {
    let backend = MemoryIndexBackend::new();
    seed_completed(&backend, 1).await;
    let manager = Manager::new(backend, LocalLockProvider::new());
    let attempts = Arc::new(AtomicU32::new(0));
    manager
        .register(Box::new(ScriptedMigration {
            kind: MigrationType::VersionedAndResumable,
            version: Some(2),
            name: "resumable",
            fail_until_attempt: 2,
            attempts: attempts.clone(),
        }))
        .unwrap();

    let result = manager.run_migrations_async().await.unwrap();
    assert_eq!(result, MigrationResult::Success);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

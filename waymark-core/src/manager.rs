//! The migration manager: registration, status, and the run loop (§4.6).

use std::sync::Mutex as SyncMutex;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::backend::IndexBackend;
use crate::error::{Result, WaymarkError};
use crate::index;
use crate::lock::LockProvider;
use crate::migration::Migration;
use crate::state::{MigrationStateRecord, StateRepository};
use crate::status::{self, MigrationStatus};

/// The well-known key gating the entire `run_migrations_async` body.
const RUN_LOCK_KEY: &str = "migrations";

/// Acquire/lease timeouts for a [`LockProvider::try_using`] call.
#[derive(Debug, Clone, Copy)]
pub struct LockTimeouts {
    pub acquire: Duration,
    pub lease: Duration,
}

impl LockTimeouts {
    /// Defaults for the index-creation lock: both on the order of a minute.
    pub fn bootstrap_defaults() -> Self {
        LockTimeouts {
            acquire: Duration::from_secs(60),
            lease: Duration::from_secs(60),
        }
    }

    /// Defaults for the run lock: a generous bound, since a run may apply
    /// several long-running migrations.
    pub fn run_defaults() -> Self {
        LockTimeouts {
            acquire: Duration::from_secs(30 * 60),
            lease: Duration::from_secs(30 * 60),
        }
    }
}

/// The outcome of a [`Manager::run_migrations_async`] call. No partial
/// result: a run aggregates over every migration it attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MigrationResult {
    Success,
    Failed,
}

/// Registers migrations, computes status, and runs pending migrations under
/// the global migration lock.
///
/// Holds its collaborators (state/lock backends) by value, injected at
/// construction rather than looked up from a singleton. The registered
/// migration list is mutable only until the first `get_migration_status`/
/// `run_migrations_async` call "freezes" it.
pub struct Manager<B: IndexBackend, L: LockProvider> {
    backend: B,
    lock: L,
    index_name: String,
    staged: SyncMutex<Vec<Box<dyn Migration>>>,
    frozen: OnceLock<Vec<Box<dyn Migration>>>,
    bootstrap_lock_timeouts: LockTimeouts,
    run_lock_timeouts: LockTimeouts,
}

impl<B: IndexBackend, L: LockProvider> Manager<B, L> {
    /// Create a manager over the given index backend and lock provider. The
    /// state index defaults to `migrations` unless overridden by
    /// [`Manager::with_index_name`].
    pub fn new(backend: B, lock: L) -> Self {
        Manager {
            backend,
            lock,
            index_name: "migrations".to_string(),
            staged: SyncMutex::new(Vec::new()),
            frozen: OnceLock::new(),
            bootstrap_lock_timeouts: LockTimeouts::bootstrap_defaults(),
            run_lock_timeouts: LockTimeouts::run_defaults(),
        }
    }

    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    pub fn with_run_lock_timeouts(mut self, timeouts: LockTimeouts) -> Self {
        self.run_lock_timeouts = timeouts;
        self
    }

    pub fn with_bootstrap_lock_timeouts(mut self, timeouts: LockTimeouts) -> Self {
        self.bootstrap_lock_timeouts = timeouts;
        self
    }

    /// Append a migration to the registered-migration list. Order of
    /// registration matters only for tie-breaking within §4.4's ordering.
    ///
    /// Fails with `Configuration` if the manager has already started serving
    /// status/run requests, or if the migration's identity duplicates an
    /// already-registered one (a versioned migration with no version has no
    /// identity and is exempt from the duplicate check — it is ignored
    /// entirely, per §3).
    pub fn register(&self, migration: Box<dyn Migration>) -> Result<()> {
        if self.frozen.get().is_some() {
            return Err(WaymarkError::Configuration(
                "cannot register a migration after the manager has started serving requests"
                    .to_string(),
            ));
        }

        let mut staged = self.staged.lock().expect("migration list poisoned");
        if let Some(identity) = migration.identity() {
            if staged.iter().filter_map(|m| m.identity()).any(|existing| existing == identity) {
                return Err(WaymarkError::Configuration(format!(
                    "duplicate migration identity '{}'",
                    identity
                )));
            }
        }
        staged.push(migration);
        Ok(())
    }

    /// Freeze the registered-migration list on first use and return a
    /// reference to it, valid for the lifetime of `&self`.
    fn freeze(&self) -> &Vec<Box<dyn Migration>> {
        if let Some(migrations) = self.frozen.get() {
            return migrations;
        }
        let migrations = std::mem::take(&mut *self.staged.lock().expect("migration list poisoned"));
        let _ = self.frozen.set(migrations);
        self.frozen.get().expect("just set")
    }

    fn repo(&self) -> StateRepository<'_, B> {
        StateRepository::new(&self.backend, self.index_name.clone())
    }

    /// Create the migration index if missing, gated by a lock keyed on the
    /// index name so two processes never race on bootstrap (§5).
    async fn ensure_index(&self) -> Result<()> {
        let key = format!("create-index:{}", self.index_name);
        let acquired = self
            .lock
            .try_using(
                &key,
                self.bootstrap_lock_timeouts.acquire,
                self.bootstrap_lock_timeouts.lease,
                || async { index::ensure_migration_index(&self.backend, &self.index_name).await },
            )
            .await?;

        match acquired {
            Some(()) => Ok(()),
            None => Err(WaymarkError::Lock {
                key,
                timeout_secs: self.bootstrap_lock_timeouts.acquire.as_secs(),
            }),
        }
    }

    /// Pure read (plus the one-time bootstrap write, §4.5) — never acquires
    /// the global migration lock.
    pub async fn get_migration_status(&self) -> Result<MigrationStatus> {
        self.ensure_index().await?;
        let migrations = self.freeze();
        status::compute_status(migrations, &self.repo()).await
    }

    /// Execute every pending migration, in order, under the global
    /// migration lock. See §4.6.
    pub async fn run_migrations_async(&self) -> Result<MigrationResult> {
        self.ensure_index().await?;
        let migrations = self.freeze();
        let repo = self.repo();

        let status = status::compute_status(migrations, &repo).await?;
        if !status.needs_migration {
            return Ok(MigrationResult::Success);
        }

        let acquired = self
            .lock
            .try_using(
                RUN_LOCK_KEY,
                self.run_lock_timeouts.acquire,
                self.run_lock_timeouts.lease,
                || self.run_pending_migrations(migrations, &repo),
            )
            .await?;

        match acquired {
            Some(result) => Ok(result),
            None => {
                log::error!(
                    "Failed to acquire migration lock '{}'; no migrations were run",
                    RUN_LOCK_KEY
                );
                Ok(MigrationResult::Failed)
            }
        }
    }

    /// Runs with the global lock held: recompute status (another process may
    /// have advanced it since the unlocked check above), then attempt each
    /// pending migration in order, stopping at the first terminal failure.
    async fn run_pending_migrations(
        &self,
        migrations: &[Box<dyn Migration>],
        repo: &StateRepository<'_, B>,
    ) -> Result<MigrationResult> {
        let status = status::compute_status(migrations, repo).await?;

        for pending in &status.pending_migrations {
            let migration = &migrations[pending.index];
            let now = Utc::now();
            let mut record = MigrationStateRecord {
                id: pending.identity.clone(),
                version: pending.version,
                migration_type: pending.migration_type,
                started_utc: now,
                completed_utc: None,
                error_message: None,
            };
            repo.add(&record).await?;

            let max_attempts = if pending.migration_type.is_resumable() { 3 } else { 1 };
            let mut last_error: Option<String> = None;

            let succeeded = 'attempts: {
                for attempt in 1..=max_attempts {
                    log::info!(
                        "Running migration '{}' (attempt {}/{})",
                        pending.identity,
                        attempt,
                        max_attempts
                    );
                    match migration.run().await {
                        Ok(()) => break 'attempts true,
                        Err(e) => {
                            log::warn!(
                                "Migration '{}' attempt {}/{} failed: {}",
                                pending.identity,
                                attempt,
                                max_attempts,
                                e
                            );
                            last_error = Some(match e {
                                WaymarkError::Migration { message, .. } => message,
                                other => other.to_string(),
                            });
                        }
                    }
                }
                false
            };

            if succeeded {
                record.completed_utc = Some(Utc::now());
                record.error_message = None;
                repo.add(&record).await?;
                self.backend.refresh(&self.index_name).await?;
            } else {
                let message = last_error.unwrap_or_default();
                record.error_message = Some(message.clone());
                repo.add(&record).await?;
                self.backend.refresh(&self.index_name).await?;
                log::error!("Migration '{}' failed terminally: {}", pending.identity, message);
                return Ok(MigrationResult::Failed);
            }
        }

        Ok(MigrationResult::Success)
    }
}

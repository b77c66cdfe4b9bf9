//! Migration orchestrator for document-oriented search-index backends.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use waymark_core::backend::MemoryIndexBackend;
//! use waymark_core::lock::LocalLockProvider;
//! use waymark_core::Manager;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = Manager::new(MemoryIndexBackend::new(), LocalLockProvider::new());
//! let status = manager.get_migration_status().await?;
//! println!("{} migrations pending", status.pending_migrations.len());
//! let result = manager.run_migrations_async().await?;
//! println!("{:?}", result);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`migration`] — The `Migration` trait applications implement, and `MigrationType`
//! - [`backend`] — The `IndexBackend` collaborator and its in-memory reference implementation
//! - [`lock`] — The `LockProvider` collaborator and its in-process reference implementation
//! - [`state`] — The durable `MigrationStateRecord` and the repository over it
//! - [`status`] — Pure status computation plus the one-time bootstrap policy
//! - [`index`] — Migration index lifecycle (create/drop, idempotently)
//! - [`manager`] — `Manager`: registration, status, and the locked run loop
//! - [`error`] — Error types

pub mod backend;
pub mod error;
pub mod index;
pub mod lock;
pub mod manager;
pub mod migration;
pub mod state;
pub mod status;

pub use backend::{IndexBackend, IndexDescriptor, IndexHealth, MemoryIndexBackend};
pub use error::{Result, WaymarkError};
pub use lock::{LocalLockProvider, LockProvider};
pub use manager::{LockTimeouts, Manager, MigrationResult};
pub use migration::{Migration, MigrationType};
pub use state::{MigrationStateRecord, StateRepository};
pub use status::{MigrationStatus, PendingMigration};

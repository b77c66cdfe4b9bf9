//! Error types for waymark operations.

use thiserror::Error;

/// All error kinds that the migration manager can produce.
///
/// Maps directly onto the four error kinds the manager distinguishes: a
/// misuse of the registration API, a backend failure, a lock-contention
/// failure, and a failure raised from inside a user migration's `run`.
#[derive(Error, Debug)]
pub enum WaymarkError {
    /// Misuse at registration time: a duplicate migration identity, or an
    /// attempt to register a migration after the manager has started
    /// serving status/run requests.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A backend failure: index create/delete, document upsert, health
    /// check, or refresh against the migration index.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The global migration lock could not be acquired within the
    /// configured acquisition timeout.
    #[error("Failed to acquire migration lock '{key}' within {timeout_secs}s")]
    Lock { key: String, timeout_secs: u64 },

    /// A migration's `run` failed. The message is captured verbatim and
    /// persisted to the migration's state record.
    #[error("Migration '{id}' failed: {message}")]
    Migration { id: String, message: String },
}

/// Convenience type alias for `Result<T, WaymarkError>`.
pub type Result<T> = std::result::Result<T, WaymarkError>;

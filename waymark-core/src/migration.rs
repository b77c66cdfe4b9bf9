//! The migration abstraction supplied by applications.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;

/// How a migration is identified, ordered, and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationType {
    /// Identified by an integer version; runs at most once successfully;
    /// a failed attempt is not retried in-process.
    Versioned,
    /// As [`MigrationType::Versioned`], but a failed attempt is retried
    /// in-process up to 3 total attempts.
    VersionedAndResumable,
    /// Identified by its implementation's name; re-runs whenever its
    /// declared version advances past the last recorded version.
    Repeatable,
}

impl MigrationType {
    /// Whether this type is identified by an integer version rather than a name.
    pub fn is_versioned(self) -> bool {
        matches!(self, MigrationType::Versioned | MigrationType::VersionedAndResumable)
    }

    /// Whether a failed `run` should be retried in-process within the same
    /// `run_migrations_async` call.
    pub fn is_resumable(self) -> bool {
        matches!(self, MigrationType::VersionedAndResumable)
    }
}

impl std::fmt::Display for MigrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationType::Versioned => write!(f, "Versioned"),
            MigrationType::VersionedAndResumable => write!(f, "VersionedAndResumable"),
            MigrationType::Repeatable => write!(f, "Repeatable"),
        }
    }
}

impl serde::Serialize for MigrationType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for MigrationType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "Versioned" => Ok(MigrationType::Versioned),
            "VersionedAndResumable" => Ok(MigrationType::VersionedAndResumable),
            "Repeatable" => Ok(MigrationType::Repeatable),
            other => Err(serde::de::Error::custom(format!(
                "unknown migration type '{}'",
                other
            ))),
        }
    }
}

/// A unit of application-defined work that transforms persisted state.
///
/// The manager never inspects a migration beyond these three members: its
/// classification, its optional version, and its `run` operation. Identity
/// (the primary key of its state record) is derived from the two former —
/// see [`Migration::identity`].
#[async_trait]
pub trait Migration: Send + Sync {
    /// The migration's classification. See [`MigrationType`].
    fn migration_type(&self) -> MigrationType;

    /// The migration's version.
    ///
    /// Required (`Some`) for `Versioned`/`VersionedAndResumable` — a `None`
    /// here means the migration is ignored entirely (never pending, never
    /// run). For `Repeatable` this is the *current desired* version; `None`
    /// means "do not run yet".
    fn version(&self) -> Option<u64>;

    /// A stable name identifying this migration implementation.
    ///
    /// Used as the identity for `Repeatable` migrations. Irrelevant for
    /// `Versioned`/`VersionedAndResumable`, whose identity is always
    /// `str(version)`.
    fn name(&self) -> &str;

    /// Perform the migration's work. Any failure is captured verbatim into
    /// the migration's state record.
    async fn run(&self) -> Result<()>;

    /// The state record primary key for this migration, or `None` if the
    /// migration is ignored (a versioned migration with no version).
    fn identity(&self) -> Option<String> {
        match self.migration_type() {
            MigrationType::Versioned | MigrationType::VersionedAndResumable => {
                self.version().map(|v| v.to_string())
            }
            MigrationType::Repeatable => Some(self.name().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop {
        kind: MigrationType,
        version: Option<u64>,
        name: &'static str,
    }

    #[async_trait]
    impl Migration for Noop {
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
            Ok(())
        }
    }

    #[test]
    fn versioned_identity_is_version_string() {
        let m = Noop {
            kind: MigrationType::Versioned,
            version: Some(3),
            name: "ignored",
        };
        assert_eq!(m.identity(), Some("3".to_string()));
    }

    #[test]
    fn versioned_without_version_has_no_identity() {
        let m = Noop {
            kind: MigrationType::Versioned,
            version: None,
            name: "ignored",
        };
        assert_eq!(m.identity(), None);
    }

    #[test]
    fn repeatable_identity_is_name() {
        let m = Noop {
            kind: MigrationType::Repeatable,
            version: Some(1),
            name: "reindex_customers",
        };
        assert_eq!(m.identity(), Some("reindex_customers".to_string()));
    }

    #[test]
    fn resumability_matches_type() {
        assert!(!MigrationType::Versioned.is_resumable());
        assert!(MigrationType::VersionedAndResumable.is_resumable());
        assert!(!MigrationType::Repeatable.is_resumable());
    }
}

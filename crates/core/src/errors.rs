//! Error types for the post forking core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Merge conflicts and duplicate forks have no variant here: a conflict
//! is a normal merge outcome and a duplicate fork request resolves to the
//! existing fork.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fork(#[from] ForkError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Errors from the document store (SQLite persistence layer).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(rusqlite::Error),

    /// A uniqueness or check constraint rejected the write.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed {
        version: u32,
        detail: String,
    },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref code, ref msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(msg.clone().unwrap_or_else(|| code.to_string()))
            }
            other => Self::SqliteError(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Fork errors
// ---------------------------------------------------------------------------

/// Errors from the fork lifecycle manager.
#[derive(Debug, Error)]
pub enum ForkError {
    /// The document to fork does not exist.
    #[error("document to fork not found: {0}")]
    ParentNotFound(i64),

    /// The document's type cannot be forked (disabled type, fork or revision).
    #[error("document {id} of type '{post_type}' cannot be forked")]
    NotForkable {
        id: i64,
        post_type: String,
    },

    /// The parent has no revision to record as the fork's merge base.
    #[error("document {0} has no revision to fork from")]
    NoBaseRevision(i64),

    /// No author was supplied and the identity provider has no acting author.
    #[error("no current author to own the fork")]
    NoCurrentAuthor,

    /// The store rejected the fork insert or its metadata write.
    #[error("fork store error: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Merge errors
// ---------------------------------------------------------------------------

/// Errors from the merge orchestrator.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The fork, its parent, or its base revision could not be loaded.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// The fork still conflicts with its parent; nothing was written.
    #[error("fork {fork_id} has {conflicts} unresolved conflict(s)")]
    Conflicted { fork_id: i64, conflicts: usize },

    /// The store failed while reading inputs or writing the merged parent.
    #[error("merge store error: {0}")]
    Store(#[from] StoreError),
}

impl MergeError {
    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Identity errors
// ---------------------------------------------------------------------------

/// Errors from the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The mapping file could not be loaded.
    #[error("identity mapping file error at '{path}': {detail}")]
    MappingFileError {
        path: String,
        detail: String,
    },

    /// TOML parse error when reading the mapping file.
    #[error("identity mapping parse error: {0}")]
    ParseError(String),

    /// Generic I/O error.
    #[error("identity I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ForkError::ParentNotFound(42);
        assert_eq!(err.to_string(), "document to fork not found: 42");

        let err = ForkError::NotForkable {
            id: 7,
            post_type: "fork".into(),
        };
        assert_eq!(err.to_string(), "document 7 of type 'fork' cannot be forked");

        let err = MergeError::not_found("base revision", 12);
        assert_eq!(err.to_string(), "base revision not found: 12");

        let err = MergeError::Conflicted { fork_id: 4, conflicts: 2 };
        assert_eq!(err.to_string(), "fork 4 has 2 unresolved conflict(s)");

        let err = ForkError::NoBaseRevision(9);
        assert_eq!(err.to_string(), "document 9 has no revision to fork from");

        let err = ConfigError::InvalidValue {
            field: "merge.fork_label".into(),
            detail: "must not be empty".into(),
        };
        assert!(err.to_string().contains("merge.fork_label"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let store_err = StoreError::NotFound {
            entity: "document".into(),
            id: "3".into(),
        };
        let core_err: CoreError = store_err.into();
        assert!(matches!(core_err, CoreError::Store(_)));

        let merge_err = MergeError::Store(StoreError::Constraint("unique".into()));
        let core_err: CoreError = merge_err.into();
        assert!(matches!(core_err, CoreError::Merge(MergeError::Store(_))));
    }
}

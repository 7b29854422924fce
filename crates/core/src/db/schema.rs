//! Database schema definitions and migration runner.
//!
//! Migrations are simple SQL strings applied in order. The `schema_version`
//! user-version pragma tracks which migrations have already been applied.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::StoreError;

/// All migrations, in order. Each entry is `(version, description, sql)`.
/// Versions start at 1. The current schema version is stored in the SQLite
/// `user_version` pragma.
static MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "initial schema",
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            post_type    TEXT    NOT NULL,
            title        TEXT    NOT NULL DEFAULT '',
            content      TEXT    NOT NULL DEFAULT '',
            excerpt      TEXT    NOT NULL DEFAULT '',
            parent_id    INTEGER,
            author_id    INTEGER NOT NULL,
            status       TEXT    NOT NULL,
            created_at   TEXT    NOT NULL,
            modified_at  TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_type_author ON documents (post_type, author_id);
        CREATE INDEX IF NOT EXISTS idx_documents_parent ON documents (parent_id);

        CREATE TABLE IF NOT EXISTS revisions (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id  INTEGER NOT NULL REFERENCES documents (id) ON DELETE CASCADE,
            title        TEXT    NOT NULL,
            content      TEXT    NOT NULL,
            created_at   TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_revisions_document ON revisions (document_id);

        CREATE TABLE IF NOT EXISTS document_meta (
            document_id  INTEGER NOT NULL REFERENCES documents (id) ON DELETE CASCADE,
            meta_key     TEXT    NOT NULL,
            meta_value   TEXT    NOT NULL,
            PRIMARY KEY (document_id, meta_key)
        );
        "#,
    ),
    (
        2,
        "one open fork per parent and author",
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_open_fork
            ON documents (parent_id, author_id)
            WHERE post_type = 'fork' AND status IN ('draft', 'pending');
        "#,
    ),
];

/// Run all pending migrations against `conn`.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;
    info!(
        current_version,
        target_version = MIGRATIONS.last().map(|m| m.0).unwrap_or(0),
        "checking database migrations"
    );

    for &(version, description, sql) in MIGRATIONS {
        if version > current_version {
            info!(version, description, "applying migration");
            conn.execute_batch(sql)
                .map_err(|e| StoreError::MigrationFailed {
                    version,
                    detail: e.to_string(),
                })?;
            set_schema_version(conn, version)?;
            debug!(version, "migration applied successfully");
        }
    }

    Ok(())
}

/// Read the current schema version from the SQLite `user_version` pragma.
fn get_schema_version(conn: &Connection) -> Result<u32, StoreError> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version via the SQLite `user_version` pragma.
fn set_schema_version(conn: &Connection, version: u32) -> Result<(), StoreError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

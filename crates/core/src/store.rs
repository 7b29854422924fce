//! Document store contract.
//!
//! The fork manager and merge orchestrator only ever talk to documents
//! through [`DocumentStore`]. [`Database`](crate::db::Database) is the
//! SQLite implementation shipped with this crate; hosts with their own
//! content storage implement the trait instead.

use crate::errors::StoreError;
use crate::models::{
    Document, DocumentChanges, DocumentId, DocumentQuery, NewDocument, Revision, RevisionId,
};

/// Persistent document storage with revision history and string metadata.
///
/// Implementations must satisfy:
/// - `create` and every text-changing `update` record a revision snapshot
///   of the resulting title/content, so the newest revision always mirrors
///   the document's current text.
/// - `get_revisions` returns snapshots newest first.
/// - Lookups of missing records return `Ok(None)` / `Ok(false)`, never an
///   error.
/// - Write failures are returned, never retried.
pub trait DocumentStore: Send + Sync {
    /// Load a document with its metadata.
    fn get(&self, id: DocumentId) -> Result<Option<Document>, StoreError>;

    /// Insert a document and return its id.
    fn create(&self, doc: &NewDocument) -> Result<DocumentId, StoreError>;

    /// Apply a partial update and return the document's id.
    fn update(&self, id: DocumentId, changes: &DocumentChanges) -> Result<DocumentId, StoreError>;

    /// Delete a document with its revisions and metadata. Returns `true` if
    /// the document existed.
    fn delete(&self, id: DocumentId) -> Result<bool, StoreError>;

    /// Return all documents matching the filters, ordered by id.
    fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, StoreError>;

    /// Revision history of a document, newest first.
    fn get_revisions(&self, id: DocumentId) -> Result<Vec<Revision>, StoreError>;

    /// Load one revision snapshot.
    fn get_revision(&self, id: RevisionId) -> Result<Option<Revision>, StoreError>;

    /// Read one metadata value.
    fn get_meta(&self, id: DocumentId, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or replace one metadata value.
    fn set_meta(&self, id: DocumentId, key: &str, value: &str) -> Result<(), StoreError>;

    /// The newest revision of a document, if it has any.
    fn latest_revision(&self, id: DocumentId) -> Result<Option<Revision>, StoreError> {
        Ok(self.get_revisions(id)?.into_iter().next())
    }
}

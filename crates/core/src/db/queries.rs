//! Typed query helpers for the document tables, and the
//! [`DocumentStore`] implementation built on them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, Row};
use tracing::debug;

use super::Database;
use crate::errors::StoreError;
use crate::models::{
    AuthorId, Document, DocumentChanges, DocumentId, DocumentQuery, DocumentStatus, NewDocument,
    Revision, RevisionId,
};
use crate::store::DocumentStore;

const DOCUMENT_COLUMNS: &str = "id, post_type, title, content, excerpt, parent_id, author_id,
     status, created_at, modified_at";

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let status: String = row.get(7)?;
    Ok(Document {
        id: DocumentId(row.get(0)?),
        post_type: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        excerpt: row.get(4)?,
        parent_id: row.get::<_, Option<i64>>(5)?.map(DocumentId),
        author_id: AuthorId(row.get(6)?),
        status: DocumentStatus::from_str_val(&status),
        created_at: parse_timestamp(8, row.get(8)?)?,
        modified_at: parse_timestamp(9, row.get(9)?)?,
        meta: BTreeMap::new(),
    })
}

fn revision_from_row(row: &Row<'_>) -> rusqlite::Result<Revision> {
    Ok(Revision {
        id: RevisionId(row.get(0)?),
        document_id: DocumentId(row.get(1)?),
        title: row.get(2)?,
        content: row.get(3)?,
        created_at: parse_timestamp(4, row.get(4)?)?,
    })
}

fn load_meta(conn: &Connection, id: DocumentId) -> Result<BTreeMap<String, String>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT meta_key, meta_value FROM document_meta WHERE document_id = ?1")?;
    let meta = stmt
        .query_map(params![id.0], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(meta)
}

/// Snapshot the current title/content of `id` into `revisions`.
fn record_revision(conn: &Connection, id: DocumentId, now: &str) -> Result<RevisionId, StoreError> {
    conn.execute(
        "INSERT INTO revisions (document_id, title, content, created_at)
         SELECT id, title, content, ?2 FROM documents WHERE id = ?1",
        params![id.0, now],
    )?;
    let rev = RevisionId(conn.last_insert_rowid());
    debug!(document_id = %id, revision_id = %rev, "recorded revision");
    Ok(rev)
}

// ---------------------------------------------------------------------------
// Query implementations
// ---------------------------------------------------------------------------

impl Database {
    // -- documents ----------------------------------------------------------

    /// Insert a document and its first revision snapshot.
    pub fn insert_document(&self, doc: &NewDocument) -> Result<DocumentId, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.transaction(|conn| {
            conn.execute(
                "INSERT INTO documents (post_type, title, content, excerpt, parent_id, author_id,
                 status, created_at, modified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    doc.post_type,
                    doc.title,
                    doc.content,
                    doc.excerpt,
                    doc.parent_id.map(|p| p.0),
                    doc.author_id.0,
                    doc.status.to_string(),
                    now
                ],
            )?;
            let id = DocumentId(conn.last_insert_rowid());
            for (key, value) in &doc.meta {
                conn.execute(
                    "INSERT INTO document_meta (document_id, meta_key, meta_value) VALUES (?1, ?2, ?3)",
                    params![id.0, key, value],
                )?;
            }
            record_revision(conn, id, &now)?;
            debug!(id = %id, post_type = %doc.post_type, status = %doc.status, "inserted document");
            Ok(id)
        })
    }

    /// Get a document by ID (returns an error if not found).
    pub fn get_document_entry(&self, id: DocumentId) -> Result<Document, StoreError> {
        let conn = self.conn();
        let mut doc = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id.0],
                document_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                    entity: "document".into(),
                    id: id.to_string(),
                },
                other => other.into(),
            })?;
        doc.meta = load_meta(&conn, id)?;
        Ok(doc)
    }

    /// Get a document by ID, returning `Option` instead of an error on not-found.
    pub fn get_document(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        match self.get_document_entry(id) {
            Ok(doc) => Ok(Some(doc)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Apply a partial update, recording a revision when text changes.
    pub fn update_document(
        &self,
        id: DocumentId,
        changes: &DocumentChanges,
    ) -> Result<DocumentId, StoreError> {
        let now = Utc::now().to_rfc3339();
        let mut sets = vec!["modified_at = ?1".to_string()];
        let mut bound: Vec<Box<dyn ToSql>> = vec![Box::new(now.clone())];

        let mut push = |column: &str, value: Box<dyn ToSql>| {
            bound.push(value);
            sets.push(format!("{} = ?{}", column, bound.len()));
        };
        if let Some(ref title) = changes.title {
            push("title", Box::new(title.clone()));
        }
        if let Some(ref content) = changes.content {
            push("content", Box::new(content.clone()));
        }
        if let Some(ref excerpt) = changes.excerpt {
            push("excerpt", Box::new(excerpt.clone()));
        }
        if let Some(ref status) = changes.status {
            push("status", Box::new(status.to_string()));
        }
        bound.push(Box::new(id.0));
        let sql = format!(
            "UPDATE documents SET {} WHERE id = ?{}",
            sets.join(", "),
            bound.len()
        );

        self.transaction(|conn| {
            let param_refs: Vec<&dyn ToSql> = bound.iter().map(|p| p.as_ref()).collect();
            let changed = conn.execute(&sql, param_refs.as_slice())?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    entity: "document".into(),
                    id: id.to_string(),
                });
            }
            if changes.touches_text() {
                record_revision(conn, id, &now)?;
            }
            debug!(id = %id, "updated document");
            Ok(id)
        })
    }

    /// Delete a document; revisions and metadata cascade.
    pub fn delete_document(&self, id: DocumentId) -> Result<bool, StoreError> {
        let conn = self.conn();
        let changed = conn.execute("DELETE FROM documents WHERE id = ?1", params![id.0])?;
        debug!(id = %id, deleted = changed > 0, "deleted document");
        Ok(changed > 0)
    }

    /// List documents matching `query`, ordered by id ascending.
    pub fn list_documents(&self, query: &DocumentQuery) -> Result<Vec<Document>, StoreError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut bound: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref post_type) = query.post_type {
            bound.push(Box::new(post_type.clone()));
            clauses.push(format!("post_type = ?{}", bound.len()));
        }
        if let Some(author) = query.author_id {
            bound.push(Box::new(author.0));
            clauses.push(format!("author_id = ?{}", bound.len()));
        }
        if let Some(parent) = query.parent_id {
            bound.push(Box::new(parent.0));
            clauses.push(format!("parent_id = ?{}", bound.len()));
        }
        if !query.statuses.is_empty() {
            let mut placeholders = Vec::new();
            for status in &query.statuses {
                bound.push(Box::new(status.to_string()));
                placeholders.push(format!("?{}", bound.len()));
            }
            clauses.push(format!("status IN ({})", placeholders.join(", ")));
        }

        let mut sql = format!("SELECT {} FROM documents", DOCUMENT_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id ASC");
        if let Some(limit) = query.limit {
            bound.push(Box::new(limit));
            sql.push_str(&format!(" LIMIT ?{}", bound.len()));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = bound.iter().map(|p| p.as_ref()).collect();
        let mut docs = stmt
            .query_map(param_refs.as_slice(), document_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for doc in &mut docs {
            doc.meta = load_meta(&conn, doc.id)?;
        }
        Ok(docs)
    }

    // -- revisions ----------------------------------------------------------

    /// Revision history of a document, newest first.
    pub fn list_revisions(&self, id: DocumentId) -> Result<Vec<Revision>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, document_id, title, content, created_at
             FROM revisions WHERE document_id = ?1 ORDER BY id DESC",
        )?;
        let revisions = stmt
            .query_map(params![id.0], revision_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(revisions)
    }

    /// Look up a single revision.
    pub fn find_revision(&self, id: RevisionId) -> Result<Option<Revision>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, document_id, title, content, created_at FROM revisions WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id.0], revision_from_row)?;
        match rows.next() {
            Some(Ok(rev)) => Ok(Some(rev)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    // -- metadata -----------------------------------------------------------

    /// Read one metadata value.
    pub fn read_meta(&self, id: DocumentId, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT meta_value FROM document_meta WHERE document_id = ?1 AND meta_key = ?2",
        )?;
        let mut rows = stmt.query_map(params![id.0, key], |row| row.get(0))?;
        match rows.next() {
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Insert or replace one metadata value.
    pub fn write_meta(&self, id: DocumentId, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO document_meta (document_id, meta_key, meta_value) VALUES (?1, ?2, ?3)
             ON CONFLICT (document_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value",
            params![id.0, key, value],
        )?;
        debug!(id = %id, key, "wrote document meta");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

impl DocumentStore for Database {
    fn get(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        self.get_document(id)
    }

    fn create(&self, doc: &NewDocument) -> Result<DocumentId, StoreError> {
        self.insert_document(doc)
    }

    fn update(&self, id: DocumentId, changes: &DocumentChanges) -> Result<DocumentId, StoreError> {
        self.update_document(id, changes)
    }

    fn delete(&self, id: DocumentId) -> Result<bool, StoreError> {
        self.delete_document(id)
    }

    fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, StoreError> {
        self.list_documents(query)
    }

    fn get_revisions(&self, id: DocumentId) -> Result<Vec<Revision>, StoreError> {
        self.list_revisions(id)
    }

    fn get_revision(&self, id: RevisionId) -> Result<Option<Revision>, StoreError> {
        self.find_revision(id)
    }

    fn get_meta(&self, id: DocumentId, key: &str) -> Result<Option<String>, StoreError> {
        self.read_meta(id, key)
    }

    fn set_meta(&self, id: DocumentId, key: &str, value: &str) -> Result<(), StoreError> {
        self.write_meta(id, key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BASE_REVISION_META_KEY, FORK_POST_TYPE};

    fn setup_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn post(author: i64, content: &str) -> NewDocument {
        NewDocument::draft("post", AuthorId(author))
            .title("Title")
            .content(content)
            .status(DocumentStatus::Published)
    }

    #[test]
    fn test_insert_and_get_document() {
        let db = setup_db();
        let id = db.create(&post(1, "Hello world\n")).unwrap();

        let doc = db.get(id).unwrap().unwrap();
        assert_eq!(doc.post_type, "post");
        assert_eq!(doc.content, "Hello world\n");
        assert_eq!(doc.status, DocumentStatus::Published);
        assert_eq!(doc.author_id, AuthorId(1));
        assert!(doc.parent_id.is_none());
    }

    #[test]
    fn test_insert_writes_meta_in_same_transaction() {
        let db = setup_db();
        let parent = db.create(&post(1, "body")).unwrap();
        let fork = NewDocument::draft(FORK_POST_TYPE, AuthorId(2))
            .parent(parent)
            .meta(BASE_REVISION_META_KEY, "7");

        let id = db.create(&fork).unwrap();
        let doc = db.get(id).unwrap().unwrap();
        assert_eq!(doc.meta.get(BASE_REVISION_META_KEY).map(String::as_str), Some("7"));

        // A rejected insert leaves no meta rows behind.
        assert!(matches!(db.create(&fork), Err(StoreError::Constraint(_))));
        let rows: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM document_meta", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_get_missing_document() {
        let db = setup_db();
        assert!(db.get(DocumentId(404)).unwrap().is_none());
        assert!(matches!(
            db.get_document_entry(DocumentId(404)),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_records_revision() {
        let db = setup_db();
        let id = db.create(&post(1, "v1")).unwrap();
        assert_eq!(db.get_revisions(id).unwrap().len(), 1);

        db.update(id, &DocumentChanges::content("v2")).unwrap();
        let revisions = db.get_revisions(id).unwrap();
        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0].content, "v2");
        assert_eq!(revisions[1].content, "v1");
        assert_eq!(db.latest_revision(id).unwrap().unwrap().content, "v2");

        // Status-only changes do not snapshot.
        db.update(id, &DocumentChanges::status(DocumentStatus::Draft))
            .unwrap();
        assert_eq!(db.get_revisions(id).unwrap().len(), 2);
        assert_eq!(db.get(id).unwrap().unwrap().status, DocumentStatus::Draft);
    }

    #[test]
    fn test_update_missing_document() {
        let db = setup_db();
        let result = db.update(DocumentId(5), &DocumentChanges::content("x"));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_get_revision_by_id() {
        let db = setup_db();
        let id = db.create(&post(1, "snapshot")).unwrap();
        let rev = db.latest_revision(id).unwrap().unwrap();
        let fetched = db.get_revision(rev.id).unwrap().unwrap();
        assert_eq!(fetched.document_id, id);
        assert_eq!(fetched.content, "snapshot");
        assert!(db.get_revision(RevisionId(999)).unwrap().is_none());
    }

    #[test]
    fn test_meta_round_trip() {
        let db = setup_db();
        let id = db.create(&post(1, "x")).unwrap();
        assert!(db.get_meta(id, "k").unwrap().is_none());

        db.set_meta(id, "k", "1").unwrap();
        db.set_meta(id, "k", "2").unwrap();
        assert_eq!(db.get_meta(id, "k").unwrap().as_deref(), Some("2"));
        assert_eq!(db.get(id).unwrap().unwrap().meta.get("k").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_delete_cascades_revisions_and_meta() {
        let db = setup_db();
        let id = db.create(&post(1, "x")).unwrap();
        db.set_meta(id, "k", "v").unwrap();

        assert!(db.delete(id).unwrap());
        assert!(!db.delete(id).unwrap());
        assert!(db.get_revisions(id).unwrap().is_empty());
        assert!(db.get_meta(id, "k").unwrap().is_none());
    }

    #[test]
    fn test_query_filters() {
        let db = setup_db();
        let parent = db.create(&post(1, "parent")).unwrap();
        let other = db.create(&post(1, "other")).unwrap();

        let fork = |author: i64, parent: DocumentId, status: DocumentStatus| {
            NewDocument::draft(FORK_POST_TYPE, AuthorId(author))
                .parent(parent)
                .status(status)
        };
        let a = db.create(&fork(2, parent, DocumentStatus::Draft)).unwrap();
        let b = db.create(&fork(3, parent, DocumentStatus::Pending)).unwrap();
        db.create(&fork(2, parent, DocumentStatus::Published)).unwrap();
        db.create(&fork(2, other, DocumentStatus::Draft)).unwrap();

        let open_on_parent = db
            .query(&DocumentQuery {
                post_type: Some(FORK_POST_TYPE.into()),
                parent_id: Some(parent),
                statuses: vec![DocumentStatus::Draft, DocumentStatus::Pending],
                ..DocumentQuery::default()
            })
            .unwrap();
        let ids: Vec<_> = open_on_parent.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![a, b]);

        let by_author = db
            .query(&DocumentQuery {
                post_type: Some(FORK_POST_TYPE.into()),
                author_id: Some(AuthorId(2)),
                limit: Some(2),
                ..DocumentQuery::default()
            })
            .unwrap();
        assert_eq!(by_author.len(), 2);
        assert_eq!(by_author[0].id, a);

        assert_eq!(db.query(&DocumentQuery::default()).unwrap().len(), 6);
    }

    #[test]
    fn test_open_fork_uniqueness_surfaces_as_constraint() {
        let db = setup_db();
        let parent = db.create(&post(1, "parent")).unwrap();
        let fork = NewDocument::draft(FORK_POST_TYPE, AuthorId(2)).parent(parent);

        db.create(&fork).unwrap();
        assert!(matches!(db.create(&fork), Err(StoreError::Constraint(_))));
    }
}

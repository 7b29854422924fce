//! Domain model types shared by the store, fork manager, and merge layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post type of fork documents.
pub const FORK_POST_TYPE: &str = "fork";

/// Post type of revision documents.
pub const REVISION_POST_TYPE: &str = "revision";

/// Metadata key holding a fork's base revision pointer.
pub const BASE_REVISION_META_KEY: &str = "_fork_base_revision";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

/// Author (user) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub i64);

/// Revision snapshot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(pub i64);

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_id!(DocumentId, AuthorId, RevisionId);

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Publication status of a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Pending,
    Published,
    Other(String),
}

impl DocumentStatus {
    /// Parse a stored status string into a `DocumentStatus`.
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "draft" => Self::Draft,
            "pending" => Self::Pending,
            "publish" | "published" => Self::Published,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether a fork in this status still awaits publication.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Draft | Self::Pending)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Pending => write!(f, "pending"),
            Self::Published => write!(f, "published"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// A persisted document as returned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub post_type: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub parent_id: Option<DocumentId>,
    pub author_id: AuthorId,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// String metadata attached to the document.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl Document {
    pub fn is_fork(&self) -> bool {
        self.post_type == FORK_POST_TYPE
    }

    pub fn is_revision(&self) -> bool {
        self.post_type == REVISION_POST_TYPE
    }

    /// The base revision pointer recorded when this fork was created.
    pub fn base_revision(&self) -> Option<RevisionId> {
        self.meta
            .get(BASE_REVISION_META_KEY)
            .and_then(|v| v.parse().ok())
            .map(RevisionId)
    }
}

/// Fields for a document about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub post_type: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub parent_id: Option<DocumentId>,
    pub author_id: AuthorId,
    pub status: DocumentStatus,
    /// Meta rows written together with the document.
    pub meta: BTreeMap<String, String>,
}

impl NewDocument {
    /// A draft document of `post_type` with empty text fields.
    pub fn draft(post_type: impl Into<String>, author_id: AuthorId) -> Self {
        Self {
            post_type: post_type.into(),
            title: String::new(),
            content: String::new(),
            excerpt: String::new(),
            parent_id: None,
            author_id,
            status: DocumentStatus::Draft,
            meta: BTreeMap::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn status(mut self, status: DocumentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn parent(mut self, parent_id: DocumentId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// A partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<DocumentStatus>,
}

impl DocumentChanges {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn status(status: DocumentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Whether the update touches versioned text (and so needs a revision).
    pub fn touches_text(&self) -> bool {
        self.title.is_some() || self.content.is_some() || self.excerpt.is_some()
    }
}

/// Filters for [`DocumentStore::query`](crate::store::DocumentStore::query).
/// Unset filters match everything; results are ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    pub post_type: Option<String>,
    pub author_id: Option<AuthorId>,
    pub parent_id: Option<DocumentId>,
    /// Match any of these statuses; empty matches all.
    pub statuses: Vec<DocumentStatus>,
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Revisions
// ---------------------------------------------------------------------------

/// A historical snapshot of a document's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Revision {
    pub id: RevisionId,
    pub document_id: DocumentId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            DocumentStatus::Draft,
            DocumentStatus::Pending,
            DocumentStatus::Published,
            DocumentStatus::Other("trash".into()),
        ] {
            assert_eq!(DocumentStatus::from_str_val(&status.to_string()), status);
        }
        assert_eq!(DocumentStatus::from_str_val("publish"), DocumentStatus::Published);
    }

    #[test]
    fn test_open_statuses() {
        assert!(DocumentStatus::Draft.is_open());
        assert!(DocumentStatus::Pending.is_open());
        assert!(!DocumentStatus::Published.is_open());
        assert!(!DocumentStatus::Other("trash".into()).is_open());
    }

    #[test]
    fn test_base_revision_parses_meta() {
        let now = Utc::now();
        let mut doc = Document {
            id: DocumentId(2),
            post_type: FORK_POST_TYPE.into(),
            title: String::new(),
            content: String::new(),
            excerpt: String::new(),
            parent_id: Some(DocumentId(1)),
            author_id: AuthorId(9),
            status: DocumentStatus::Draft,
            created_at: now,
            modified_at: now,
            meta: BTreeMap::new(),
        };
        assert!(doc.is_fork());
        assert_eq!(doc.base_revision(), None);

        doc.meta.insert(BASE_REVISION_META_KEY.into(), "17".into());
        assert_eq!(doc.base_revision(), Some(RevisionId(17)));
    }

    #[test]
    fn test_changes_touch_text() {
        assert!(DocumentChanges::content("x").touches_text());
        assert!(!DocumentChanges::status(DocumentStatus::Draft).touches_text());
    }
}

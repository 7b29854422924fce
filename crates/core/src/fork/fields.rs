//! Which parent fields a new fork starts with.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Document, NewDocument};

/// A document field copied from a parent into its fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkField {
    Title,
    Content,
    Excerpt,
}

impl ForkField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Content => "content",
            Self::Excerpt => "excerpt",
        }
    }

    /// The field's value on `doc`.
    pub fn read<'d>(&self, doc: &'d Document) -> &'d str {
        match self {
            Self::Title => &doc.title,
            Self::Content => &doc.content,
            Self::Excerpt => &doc.excerpt,
        }
    }

    /// Set the field on a document about to be inserted.
    pub fn write(&self, target: &mut NewDocument, value: &str) {
        let slot = match self {
            Self::Title => &mut target.title,
            Self::Content => &mut target.content,
            Self::Excerpt => &mut target.excerpt,
        };
        *slot = value.to_string();
    }
}

impl std::fmt::Display for ForkField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback that may add, remove, or reorder copied fields.
pub type FieldFilter = Box<dyn Fn(&mut Vec<ForkField>) + Send + Sync>;

/// The configured field list plus any registered filters.
pub struct ForkFields {
    base: Vec<ForkField>,
    filters: Vec<FieldFilter>,
}

impl ForkFields {
    pub fn new(base: Vec<ForkField>) -> Self {
        Self {
            base,
            filters: Vec::new(),
        }
    }

    /// Register a filter; filters run in registration order.
    pub fn register<F>(&mut self, filter: F)
    where
        F: Fn(&mut Vec<ForkField>) + Send + Sync + 'static,
    {
        self.filters.push(Box::new(filter));
    }

    /// The effective field list, duplicates removed.
    pub fn resolve(&self) -> Vec<ForkField> {
        let mut fields = self.base.clone();
        for filter in &self.filters {
            filter(&mut fields);
        }
        let mut seen = Vec::with_capacity(fields.len());
        fields.retain(|f| {
            if seen.contains(f) {
                false
            } else {
                seen.push(*f);
                true
            }
        });
        fields
    }

    /// Copy every effective field from `parent` onto `target`.
    pub fn copy_into(&self, parent: &Document, target: &mut NewDocument) {
        let fields = self.resolve();
        debug!(
            parent_id = %parent.id,
            fields = ?fields.iter().map(ForkField::as_str).collect::<Vec<_>>(),
            "copying fork fields"
        );
        for field in fields {
            field.write(target, field.read(parent));
        }
    }
}

impl Default for ForkFields {
    fn default() -> Self {
        Self::new(vec![ForkField::Title, ForkField::Content])
    }
}

impl std::fmt::Debug for ForkFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForkFields")
            .field("base", &self.base)
            .field("filters", &self.filters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::models::{AuthorId, DocumentId, DocumentStatus, FORK_POST_TYPE};

    fn parent() -> Document {
        let now = Utc::now();
        Document {
            id: DocumentId(1),
            post_type: "post".into(),
            title: "Title".into(),
            content: "Body".into(),
            excerpt: "Short".into(),
            parent_id: None,
            author_id: AuthorId(1),
            status: DocumentStatus::Published,
            created_at: now,
            modified_at: now,
            meta: BTreeMap::new(),
        }
    }

    #[test]
    fn test_default_copies_title_and_content() {
        let mut fork = NewDocument::draft(FORK_POST_TYPE, AuthorId(2));
        ForkFields::default().copy_into(&parent(), &mut fork);
        assert_eq!(fork.title, "Title");
        assert_eq!(fork.content, "Body");
        assert_eq!(fork.excerpt, "");
    }

    #[test]
    fn test_filters_extend_and_dedup() {
        let mut fields = ForkFields::default();
        fields.register(|f| f.push(ForkField::Excerpt));
        fields.register(|f| f.push(ForkField::Title));
        assert_eq!(
            fields.resolve(),
            vec![ForkField::Title, ForkField::Content, ForkField::Excerpt]
        );

        let mut fork = NewDocument::draft(FORK_POST_TYPE, AuthorId(2));
        fields.copy_into(&parent(), &mut fork);
        assert_eq!(fork.excerpt, "Short");
    }

    #[test]
    fn test_filters_can_remove_fields() {
        let mut fields = ForkFields::default();
        fields.register(|f| f.retain(|field| *field != ForkField::Content));
        let mut fork = NewDocument::draft(FORK_POST_TYPE, AuthorId(2));
        fields.copy_into(&parent(), &mut fork);
        assert_eq!(fork.title, "Title");
        assert_eq!(fork.content, "");
    }

    #[test]
    fn test_field_names() {
        assert_eq!(ForkField::Excerpt.to_string(), "excerpt");
        let parsed: Vec<ForkField> = serde_json::from_str(r#"["title","excerpt"]"#).unwrap();
        assert_eq!(parsed, vec![ForkField::Title, ForkField::Excerpt]);
    }
}

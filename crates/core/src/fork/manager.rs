//! Fork lifecycle: creation, lookup, listing, and cleanup when a parent
//! goes away.

use tracing::{debug, info, warn};

use super::fields::ForkFields;
use crate::config::ForkingConfig;
use crate::errors::{ForkError, StoreError};
use crate::identity::IdentityProvider;
use crate::models::{
    AuthorId, Document, DocumentId, DocumentQuery, DocumentStatus, NewDocument, Revision,
    RevisionId, BASE_REVISION_META_KEY, FORK_POST_TYPE,
};
use crate::store::DocumentStore;

/// Separator between author name and parent title in fork names.
const NAME_SEPARATOR: &str = " » ";

/// Optional filters for [`ForkManager::list_forks`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForkFilter {
    pub parent_id: Option<DocumentId>,
    pub author_id: Option<AuthorId>,
    pub statuses: Vec<DocumentStatus>,
}

impl ForkFilter {
    pub fn parent(mut self, parent_id: DocumentId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn author(mut self, author_id: AuthorId) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn status(mut self, status: DocumentStatus) -> Self {
        self.statuses.push(status);
        self
    }

    fn to_query(&self) -> DocumentQuery {
        DocumentQuery {
            post_type: Some(FORK_POST_TYPE.to_string()),
            author_id: self.author_id,
            parent_id: self.parent_id,
            statuses: self.statuses.clone(),
            limit: None,
        }
    }
}

/// Creates and tracks forks on top of a [`DocumentStore`].
pub struct ForkManager<'a> {
    store: &'a dyn DocumentStore,
    identity: &'a dyn IdentityProvider,
    config: &'a ForkingConfig,
    fields: &'a ForkFields,
}

impl<'a> ForkManager<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        identity: &'a dyn IdentityProvider,
        config: &'a ForkingConfig,
        fields: &'a ForkFields,
    ) -> Self {
        Self {
            store,
            identity,
            config,
            fields,
        }
    }

    /// Fork `document` for `author`, or return the author's open fork of
    /// it if one already exists.
    ///
    /// The fork starts as a draft holding the configured parent fields and
    /// remembers the parent's newest revision as its merge base. Fork and
    /// base pointer are written in one transaction; a parent without any
    /// revision is refused.
    pub fn create_fork(&self, document: DocumentId, author: AuthorId) -> Result<DocumentId, ForkError> {
        let parent = self
            .store
            .get(document)?
            .ok_or(ForkError::ParentNotFound(document.0))?;
        if !self.is_forkable(&parent) {
            return Err(ForkError::NotForkable {
                id: parent.id.0,
                post_type: parent.post_type,
            });
        }
        let base = self
            .store
            .latest_revision(parent.id)?
            .ok_or(ForkError::NoBaseRevision(parent.id.0))?;

        if let Some(existing) = self.find_fork(Some(parent.id), author)? {
            debug!(parent_id = %parent.id, author = %author, fork_id = %existing, "reusing open fork");
            return self.reuse(existing, &base);
        }

        let mut fork = NewDocument::draft(FORK_POST_TYPE, author)
            .parent(parent.id)
            .meta(BASE_REVISION_META_KEY, base.id.to_string());
        self.fields.copy_into(&parent, &mut fork);

        let fork_id = match self.store.create(&fork) {
            Ok(id) => id,
            Err(StoreError::Constraint(detail)) => {
                // Another request opened the fork between lookup and insert.
                return match self.find_fork(Some(parent.id), author)? {
                    Some(existing) => {
                        debug!(parent_id = %parent.id, fork_id = %existing, "fork created concurrently");
                        self.reuse(existing, &base)
                    }
                    None => Err(StoreError::Constraint(detail).into()),
                };
            }
            Err(e) => return Err(e.into()),
        };

        info!(parent_id = %parent.id, author = %author, fork_id = %fork_id, base = %base.id, "created fork");
        Ok(fork_id)
    }

    /// Hand back an open fork, pointing it at `base` if its own merge base
    /// no longer resolves.
    fn reuse(&self, fork_id: DocumentId, base: &Revision) -> Result<DocumentId, ForkError> {
        let pointer = self
            .store
            .get_meta(fork_id, BASE_REVISION_META_KEY)?
            .and_then(|v| v.parse().ok())
            .map(RevisionId);
        let resolves = match pointer {
            Some(id) => self.store.get_revision(id)?.is_some(),
            None => false,
        };
        if !resolves {
            warn!(fork_id = %fork_id, base = %base.id, "open fork has no usable merge base, resetting it");
            self.store
                .set_meta(fork_id, BASE_REVISION_META_KEY, &base.id.to_string())?;
        }
        Ok(fork_id)
    }

    /// [`create_fork`](Self::create_fork) on behalf of the acting author.
    pub fn create_fork_as_current(&self, document: DocumentId) -> Result<DocumentId, ForkError> {
        let author = self
            .identity
            .current_author()
            .ok_or(ForkError::NoCurrentAuthor)?;
        self.create_fork(document, author)
    }

    /// The author's open (draft or pending) fork, optionally restricted to
    /// one parent. Lowest id wins when several match.
    pub fn find_fork(
        &self,
        parent: Option<DocumentId>,
        author: AuthorId,
    ) -> Result<Option<DocumentId>, ForkError> {
        let query = DocumentQuery {
            post_type: Some(FORK_POST_TYPE.to_string()),
            author_id: Some(author),
            parent_id: parent,
            statuses: vec![DocumentStatus::Draft, DocumentStatus::Pending],
            limit: Some(1),
        };
        Ok(self.store.query(&query)?.first().map(|doc| doc.id))
    }

    /// All forks matching `filter`, oldest first.
    pub fn list_forks(&self, filter: &ForkFilter) -> Result<Vec<Document>, ForkError> {
        Ok(self.store.query(&filter.to_query())?)
    }

    /// Delete every fork of `document`; returns how many were removed.
    ///
    /// Meant to run before the document itself is deleted, but also clears
    /// forks left behind by a parent that is already gone.
    pub fn on_parent_deleted(&self, document: DocumentId) -> Result<usize, ForkError> {
        let forks = self.list_forks(&ForkFilter::default().parent(document))?;
        let mut deleted = 0;
        for fork in &forks {
            if self.store.delete(fork.id)? {
                deleted += 1;
            }
        }

        info!(parent_id = %document, deleted, "deleted forks of parent");
        Ok(deleted)
    }

    /// "`<fork author> » <parent title>`".
    pub fn fork_name(&self, fork: &Document) -> Result<String, ForkError> {
        let title = match fork.parent_id {
            Some(parent_id) => self
                .store
                .get(parent_id)?
                .map(|parent| parent.title)
                .unwrap_or_else(|| fork.title.clone()),
            None => fork.title.clone(),
        };
        Ok(format!("{}{}{}", self.author_name(fork.author_id), NAME_SEPARATOR, title))
    }

    /// "`<parent author> » <parent title>`".
    pub fn parent_name(&self, fork: &Document) -> Result<String, ForkError> {
        let parent_id = fork
            .parent_id
            .ok_or(ForkError::ParentNotFound(fork.id.0))?;
        let parent = self
            .store
            .get(parent_id)?
            .ok_or(ForkError::ParentNotFound(parent_id.0))?;
        Ok(format!(
            "{}{}{}",
            self.author_name(parent.author_id),
            NAME_SEPARATOR,
            parent.title
        ))
    }

    /// Title to show for any document: the fork name for forks, the
    /// document's own title otherwise.
    pub fn display_title(&self, doc: &Document) -> Result<String, ForkError> {
        if doc.is_fork() {
            self.fork_name(doc)
        } else {
            Ok(doc.title.clone())
        }
    }

    fn is_forkable(&self, doc: &Document) -> bool {
        !doc.is_fork()
            && !doc.is_revision()
            && self.config.post_types.iter().any(|t| *t == doc.post_type)
    }

    fn author_name(&self, author: AuthorId) -> String {
        self.identity
            .display_name(author)
            .unwrap_or_else(|| format!("Author {}", author))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::db::Database;
    use crate::identity::{AuthorEntry, MappedIdentity};
    use crate::models::{DocumentChanges, REVISION_POST_TYPE};

    struct Fixture {
        db: Database,
        identity: MappedIdentity,
        config: ForkingConfig,
        fields: ForkFields,
    }

    impl Fixture {
        fn new() -> Self {
            let mut authors = HashMap::new();
            authors.insert(
                AuthorId(1),
                AuthorEntry { name: "Alice".into() },
            );
            authors.insert(
                AuthorId(2),
                AuthorEntry { name: "Bob".into() },
            );
            Self {
                db: Database::in_memory().unwrap(),
                identity: MappedIdentity::new(authors, Some(AuthorId(2))),
                config: ForkingConfig::default(),
                fields: ForkFields::default(),
            }
        }

        fn forks(&self) -> ForkManager<'_> {
            ForkManager::new(&self.db, &self.identity, &self.config, &self.fields)
        }

        fn post(&self, title: &str, content: &str) -> DocumentId {
            self.db
                .create(
                    &NewDocument::draft("post", AuthorId(1))
                        .title(title)
                        .content(content)
                        .status(DocumentStatus::Published),
                )
                .unwrap()
        }
    }

    #[test]
    fn test_create_fork_copies_fields_and_base() {
        let fx = Fixture::new();
        let parent = fx.post("Hello", "Hello world\n");
        let fork_id = fx.forks().create_fork(parent, AuthorId(2)).unwrap();

        let fork = fx.db.get(fork_id).unwrap().unwrap();
        assert!(fork.is_fork());
        assert_eq!(fork.parent_id, Some(parent));
        assert_eq!(fork.author_id, AuthorId(2));
        assert_eq!(fork.status, DocumentStatus::Draft);
        assert_eq!(fork.title, "Hello");
        assert_eq!(fork.content, "Hello world\n");

        let latest = fx.db.latest_revision(parent).unwrap().unwrap();
        assert_eq!(fork.base_revision(), Some(latest.id));
    }

    #[test]
    fn test_create_fork_is_idempotent() {
        let fx = Fixture::new();
        let parent = fx.post("Hello", "body");
        let forks = fx.forks();
        let first = forks.create_fork(parent, AuthorId(2)).unwrap();
        let second = forks.create_fork(parent, AuthorId(2)).unwrap();
        assert_eq!(first, second);
        assert_eq!(forks.list_forks(&ForkFilter::default()).unwrap().len(), 1);

        // A different author gets their own fork.
        let other = forks.create_fork(parent, AuthorId(1)).unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_published_fork_allows_a_new_one() {
        let fx = Fixture::new();
        let parent = fx.post("Hello", "body");
        let forks = fx.forks();
        let first = forks.create_fork(parent, AuthorId(2)).unwrap();
        fx.db
            .update(first, &DocumentChanges::status(DocumentStatus::Published))
            .unwrap();

        assert_eq!(forks.find_fork(Some(parent), AuthorId(2)).unwrap(), None);
        let second = forks.create_fork(parent, AuthorId(2)).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_create_fork_errors() {
        let fx = Fixture::new();
        let forks = fx.forks();

        assert!(matches!(
            forks.create_fork(DocumentId(404), AuthorId(2)),
            Err(ForkError::ParentNotFound(404))
        ));

        let parent = fx.post("Hello", "body");
        let fork = forks.create_fork(parent, AuthorId(2)).unwrap();
        assert!(matches!(
            forks.create_fork(fork, AuthorId(1)),
            Err(ForkError::NotForkable { .. })
        ));

        let revision = fx
            .db
            .create(&NewDocument::draft(REVISION_POST_TYPE, AuthorId(1)))
            .unwrap();
        assert!(matches!(
            forks.create_fork(revision, AuthorId(1)),
            Err(ForkError::NotForkable { .. })
        ));

        let attachment = fx
            .db
            .create(&NewDocument::draft("attachment", AuthorId(1)))
            .unwrap();
        let err = forks.create_fork(attachment, AuthorId(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("document {} of type 'attachment' cannot be forked", attachment)
        );
    }

    #[test]
    fn test_create_fork_as_current() {
        let fx = Fixture::new();
        let parent = fx.post("Hello", "body");
        let fork_id = fx.forks().create_fork_as_current(parent).unwrap();
        assert_eq!(fx.db.get(fork_id).unwrap().unwrap().author_id, AuthorId(2));

        fx.identity.set_current_author(None);
        assert!(matches!(
            fx.forks().create_fork_as_current(parent),
            Err(ForkError::NoCurrentAuthor)
        ));
    }

    #[test]
    fn test_find_fork_without_parent_filter() {
        let fx = Fixture::new();
        let forks = fx.forks();
        assert_eq!(forks.find_fork(None, AuthorId(2)).unwrap(), None);

        let a = fx.post("A", "a");
        let b = fx.post("B", "b");
        let fork_a = forks.create_fork(a, AuthorId(2)).unwrap();
        forks.create_fork(b, AuthorId(2)).unwrap();
        assert_eq!(forks.find_fork(None, AuthorId(2)).unwrap(), Some(fork_a));
    }

    #[test]
    fn test_list_forks_filters() {
        let fx = Fixture::new();
        let forks = fx.forks();
        let a = fx.post("A", "a");
        let b = fx.post("B", "b");
        forks.create_fork(a, AuthorId(1)).unwrap();
        let bob_a = forks.create_fork(a, AuthorId(2)).unwrap();
        forks.create_fork(b, AuthorId(2)).unwrap();
        fx.db
            .update(bob_a, &DocumentChanges::status(DocumentStatus::Pending))
            .unwrap();

        assert_eq!(forks.list_forks(&ForkFilter::default().parent(a)).unwrap().len(), 2);
        assert_eq!(
            forks
                .list_forks(&ForkFilter::default().author(AuthorId(2)))
                .unwrap()
                .len(),
            2
        );
        let pending = forks
            .list_forks(&ForkFilter::default().status(DocumentStatus::Pending))
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, bob_a);
    }

    #[test]
    fn test_on_parent_deleted_removes_only_its_forks() {
        let fx = Fixture::new();
        let forks = fx.forks();
        let a = fx.post("A", "a");
        let b = fx.post("B", "b");
        forks.create_fork(a, AuthorId(1)).unwrap();
        forks.create_fork(a, AuthorId(2)).unwrap();
        let survivor = forks.create_fork(b, AuthorId(2)).unwrap();

        assert_eq!(forks.on_parent_deleted(a).unwrap(), 2);
        assert!(forks.list_forks(&ForkFilter::default().parent(a)).unwrap().is_empty());
        assert!(fx.db.get(survivor).unwrap().is_some());

        fx.db.delete(a).unwrap();
        assert_eq!(forks.on_parent_deleted(a).unwrap(), 0);
    }

    #[test]
    fn test_forks_of_an_already_deleted_parent_are_cleared() {
        let fx = Fixture::new();
        let forks = fx.forks();
        let parent = fx.post("A", "a");
        forks.create_fork(parent, AuthorId(2)).unwrap();

        fx.db.delete(parent).unwrap();
        assert_eq!(forks.on_parent_deleted(parent).unwrap(), 1);
        assert!(forks.list_forks(&ForkFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_parent_without_revision_is_not_forked() {
        let fx = Fixture::new();
        let parent = fx.post("Hello", "body");
        fx.db
            .conn()
            .execute("DELETE FROM revisions WHERE document_id = ?1", [parent.0])
            .unwrap();

        let forks = fx.forks();
        assert!(matches!(
            forks.create_fork(parent, AuthorId(2)),
            Err(ForkError::NoBaseRevision(id)) if id == parent.0
        ));
        assert!(forks.list_forks(&ForkFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_reused_fork_with_dangling_base_is_repointed() {
        let fx = Fixture::new();
        let parent = fx.post("Hello", "body");
        let forks = fx.forks();
        let fork = forks.create_fork(parent, AuthorId(2)).unwrap();
        fx.db.set_meta(fork, BASE_REVISION_META_KEY, "999999").unwrap();

        assert_eq!(forks.create_fork(parent, AuthorId(2)).unwrap(), fork);
        let latest = fx.db.latest_revision(parent).unwrap().unwrap();
        assert_eq!(fx.db.get(fork).unwrap().unwrap().base_revision(), Some(latest.id));
    }

    #[test]
    fn test_names() {
        let fx = Fixture::new();
        let forks = fx.forks();
        let parent = fx.post("Launch notes", "body");
        let fork_id = forks.create_fork(parent, AuthorId(2)).unwrap();
        let fork = fx.db.get(fork_id).unwrap().unwrap();
        let parent_doc = fx.db.get(parent).unwrap().unwrap();

        assert_eq!(forks.fork_name(&fork).unwrap(), "Bob » Launch notes");
        assert_eq!(forks.parent_name(&fork).unwrap(), "Alice » Launch notes");
        assert_eq!(forks.display_title(&fork).unwrap(), "Bob » Launch notes");
        assert_eq!(forks.display_title(&parent_doc).unwrap(), "Launch notes");

        let stranger = forks.create_fork(parent, AuthorId(9)).unwrap();
        let stranger = fx.db.get(stranger).unwrap().unwrap();
        assert_eq!(forks.fork_name(&stranger).unwrap(), "Author 9 » Launch notes");
    }
}

//! Publish interception for forks.
//!
//! A host persisting documents calls [`PublishPipeline::before_save`] on
//! every pending save and [`PublishPipeline::after_status_change`] once the
//! save has landed. Publishing a fork that merges cleanly folds it into its
//! parent; publishing a conflicted fork is turned back into a draft whose
//! content carries conflict markers.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::orchestrator::{render_merged, ConflictNotice, ForkRef, MergeOrchestrator};
use crate::errors::MergeError;
use crate::models::{
    Document, DocumentChanges, DocumentId, DocumentStatus, NewDocument, FORK_POST_TYPE,
};
use crate::store::DocumentStore;

/// A save about to be persisted by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    /// `None` for inserts.
    pub id: Option<DocumentId>,
    pub post_type: String,
    pub title: String,
    pub content: String,
    pub status: DocumentStatus,
}

impl PendingSave {
    /// An update of an existing document.
    pub fn update(doc: &Document) -> Self {
        Self {
            id: Some(doc.id),
            post_type: doc.post_type.clone(),
            title: doc.title.clone(),
            content: doc.content.clone(),
            status: doc.status.clone(),
        }
    }

    /// An insert of a new document.
    pub fn insert(doc: &NewDocument) -> Self {
        Self {
            id: None,
            post_type: doc.post_type.clone(),
            title: doc.title.clone(),
            content: doc.content.clone(),
            status: doc.status.clone(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = status;
        self
    }

    /// The changes a host applies to persist this save.
    pub fn changes(&self) -> DocumentChanges {
        DocumentChanges {
            title: Some(self.title.clone()),
            content: Some(self.content.clone()),
            excerpt: None,
            status: Some(self.status.clone()),
        }
    }
}

/// What [`PublishPipeline::before_save`] did to a pending save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveDecision {
    /// Not a fork being published; left alone.
    Ignored,
    /// A fork being published that merges cleanly; left unchanged.
    Allowed,
    /// A conflicted fork: content replaced by the marked-up merge and
    /// status forced back to draft.
    RejectedWithMarkers(ConflictNotice),
}

/// Where a host sends the editor after a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub document_id: DocumentId,
    pub notice: String,
}

impl Redirect {
    fn published(document_id: DocumentId) -> Self {
        Self {
            document_id,
            notice: "published".to_string(),
        }
    }

    /// Relative location of the document's edit screen.
    pub fn location(&self) -> String {
        format!("documents/{}/edit?notice={}", self.document_id, self.notice)
    }
}

/// Result of a fork merged on publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub parent_id: DocumentId,
    pub redirect: Redirect,
}

/// Two-stage publish hooks driven by the host's save path.
pub struct PublishPipeline<'a> {
    store: &'a dyn DocumentStore,
    orchestrator: MergeOrchestrator<'a>,
}

impl<'a> PublishPipeline<'a> {
    pub fn new(store: &'a dyn DocumentStore, orchestrator: MergeOrchestrator<'a>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Run before the host persists `save`.
    ///
    /// Only updates of forks heading to published status are examined. A
    /// conflicted fork is rewritten in place: content becomes the merged
    /// text with conflict markers and status becomes draft.
    pub fn before_save(&self, save: &mut PendingSave) -> Result<SaveDecision, MergeError> {
        let Some(id) = save.id else {
            return Ok(SaveDecision::Ignored);
        };
        if save.post_type != FORK_POST_TYPE || save.status != DocumentStatus::Published {
            return Ok(SaveDecision::Ignored);
        }

        // Overlay the pending text on the stored fork so parent and base
        // revision pointer come from the store.
        let mut fork = self
            .store
            .get(id)?
            .ok_or_else(|| MergeError::not_found("fork", id))?;
        fork.title = save.title.clone();
        fork.content = save.content.clone();

        debug!(fork_id = %id, "checking fork for conflicts before publish");
        let result = self.orchestrator.get_diff(ForkRef::Pending(&fork))?;
        if !result.is_conflicted() {
            return Ok(SaveDecision::Allowed);
        }

        let parent_id = fork
            .parent_id
            .ok_or_else(|| MergeError::not_found("parent of fork", id))?;
        let conflicts = result.conflict_count();
        save.content = render_merged(&result, &save.content);
        save.status = DocumentStatus::Draft;

        warn!(
            fork_id = %id,
            parent_id = %parent_id,
            conflicts,
            "publish rejected, fork conflicts with the current version"
        );
        Ok(SaveDecision::RejectedWithMarkers(ConflictNotice::new(
            id, parent_id, conflicts,
        )))
    }

    /// Run after the host persisted a status change of `doc` from `old` to
    /// `new`. A fork entering published status is merged into its parent.
    ///
    /// A fork that conflicts by now (the parent moved after `before_save`)
    /// fails with [`MergeError::Conflicted`] and the parent is left as is.
    pub fn after_status_change(
        &self,
        new: &DocumentStatus,
        old: &DocumentStatus,
        doc: &Document,
    ) -> Result<Option<PublishOutcome>, MergeError> {
        if doc.is_revision() || !doc.is_fork() {
            return Ok(None);
        }
        if *new != DocumentStatus::Published || *old == DocumentStatus::Published {
            return Ok(None);
        }

        let parent_id = self.orchestrator.merge(doc.id)?;
        info!(fork_id = %doc.id, parent_id = %parent_id, "fork published");
        Ok(Some(PublishOutcome {
            parent_id,
            redirect: Redirect::published(parent_id),
        }))
    }

    pub fn orchestrator(&self) -> &MergeOrchestrator<'a> {
        &self.orchestrator
    }
}

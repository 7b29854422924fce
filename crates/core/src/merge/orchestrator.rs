//! Fork-aware merging: loads the three inputs for a fork, runs the
//! three-way merge, and writes merged content back into the parent.

use std::borrow::Cow;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::diff3::Merger;
use super::result::MergeResult;
use crate::cache::Cache;
use crate::config::MergeConfig;
use crate::diff::{split_lines, unified_preview};
use crate::errors::MergeError;
use crate::models::{Document, DocumentChanges, DocumentId, RevisionId, BASE_REVISION_META_KEY};
use crate::store::DocumentStore;

/// Cache namespace holding per-fork merge results.
pub const DIFF_CACHE_NAMESPACE: &str = "fork_diff";

/// User-facing message attached to a conflicted fork.
pub const CONFLICT_MESSAGE: &str = "This fork conflicts with the current version";

/// The fork a merge operation works on.
#[derive(Debug, Clone, Copy)]
pub enum ForkRef<'d> {
    /// A fork as currently persisted.
    Stored(DocumentId),
    /// An in-memory fork, e.g. one about to be saved. Never read from cache.
    Pending(&'d Document),
}

/// Signal shown to an editor whose fork cannot be merged cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictNotice {
    pub fork_id: DocumentId,
    pub parent_id: DocumentId,
    pub conflicts: usize,
    pub message: String,
}

impl ConflictNotice {
    pub(crate) fn new(fork_id: DocumentId, parent_id: DocumentId, conflicts: usize) -> Self {
        Self {
            fork_id,
            parent_id,
            conflicts,
            message: CONFLICT_MESSAGE.to_string(),
        }
    }
}

/// Computes and applies fork merges against a [`DocumentStore`], caching
/// results for the lifetime of one request.
pub struct MergeOrchestrator<'a> {
    store: &'a dyn DocumentStore,
    cache: &'a dyn Cache<MergeResult>,
    merger: Merger,
    ttl: Duration,
}

impl<'a> MergeOrchestrator<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        cache: &'a dyn Cache<MergeResult>,
        config: &MergeConfig,
    ) -> Self {
        Self {
            store,
            cache,
            merger: Merger::new(&config.fork_label, &config.current_label),
            ttl: Duration::from_millis(config.cache_ttl_ms),
        }
    }

    /// Three-way merge of the fork's base revision, the fork, and the
    /// parent's current content.
    pub fn get_diff(&self, fork: ForkRef<'_>) -> Result<MergeResult, MergeError> {
        if let ForkRef::Stored(id) = fork {
            if let Some(cached) = self.cache.get(DIFF_CACHE_NAMESPACE, &id.to_string()) {
                debug!(fork_id = %id, "using cached merge result");
                return Ok(cached);
            }
        }
        let doc = self.load(fork)?;
        self.compute(&doc, matches!(fork, ForkRef::Stored(_)))
    }

    /// Whether merging the fork would produce conflicts.
    pub fn is_conflicted(&self, fork: ForkRef<'_>) -> Result<bool, MergeError> {
        Ok(self.get_diff(fork)?.is_conflicted())
    }

    /// The merged text, with conflict markers where the merge is not clean.
    pub fn get_merged(&self, fork: ForkRef<'_>) -> Result<String, MergeError> {
        let doc = self.load(fork)?;
        let result = match fork {
            ForkRef::Stored(_) => self.get_diff(fork)?,
            ForkRef::Pending(_) => self.compute(&doc, false)?,
        };
        Ok(render_merged(&result, &doc.content))
    }

    /// Merge a stored fork into its parent, overwriting the parent's content.
    ///
    /// Inputs are read fresh; a cached result for this fork is discarded.
    /// Returns the parent's id, or [`MergeError::Conflicted`] with the parent
    /// untouched when the fork does not merge cleanly.
    pub fn merge(&self, fork_id: DocumentId) -> Result<DocumentId, MergeError> {
        self.cache.delete(DIFF_CACHE_NAMESPACE, &fork_id.to_string());

        let doc = self.load(ForkRef::Stored(fork_id))?;
        let parent_id = doc
            .parent_id
            .ok_or_else(|| MergeError::not_found("parent of fork", fork_id))?;
        let result = self.compute(&doc, false)?;
        if result.is_conflicted() {
            warn!(
                fork_id = %fork_id,
                parent_id = %parent_id,
                conflicts = result.conflict_count(),
                "refusing to merge fork with unresolved conflicts"
            );
            return Err(MergeError::Conflicted {
                fork_id: fork_id.0,
                conflicts: result.conflict_count(),
            });
        }

        let merged = render_merged(&result, &doc.content);
        self.store
            .update(parent_id, &DocumentChanges::content(merged))?;

        info!(fork_id = %fork_id, parent_id = %parent_id, "merged fork into parent");
        Ok(parent_id)
    }

    /// A [`ConflictNotice`] when the stored fork conflicts with its parent.
    pub fn conflict_notice(&self, fork_id: DocumentId) -> Result<Option<ConflictNotice>, MergeError> {
        let doc = self.load(ForkRef::Stored(fork_id))?;
        let result = self.get_diff(ForkRef::Stored(fork_id))?;
        if !result.is_conflicted() {
            return Ok(None);
        }
        let parent_id = doc
            .parent_id
            .ok_or_else(|| MergeError::not_found("parent of fork", fork_id))?;
        Ok(Some(ConflictNotice::new(
            fork_id,
            parent_id,
            result.conflict_count(),
        )))
    }

    /// Unified patch from the parent's current content to the merged text.
    pub fn preview(&self, fork: ForkRef<'_>, context: usize) -> Result<String, MergeError> {
        let doc = self.load(fork)?;
        let parent = self.parent_of(&doc)?;
        let merged = self.get_merged(ForkRef::Pending(doc.as_ref()))?;
        Ok(unified_preview(&parent.content, &merged, context))
    }

    fn load<'d>(&self, fork: ForkRef<'d>) -> Result<Cow<'d, Document>, MergeError> {
        let doc = match fork {
            ForkRef::Pending(doc) => Cow::Borrowed(doc),
            ForkRef::Stored(id) => Cow::Owned(
                self.store
                    .get(id)?
                    .ok_or_else(|| MergeError::not_found("fork", id))?,
            ),
        };
        if !doc.is_fork() {
            return Err(MergeError::not_found("fork", doc.id));
        }
        Ok(doc)
    }

    fn parent_of(&self, fork: &Document) -> Result<Document, MergeError> {
        let parent_id = fork
            .parent_id
            .ok_or_else(|| MergeError::not_found("parent of fork", fork.id))?;
        self.store
            .get(parent_id)?
            .ok_or_else(|| MergeError::not_found("parent", parent_id))
    }

    fn compute(&self, fork: &Document, cache: bool) -> Result<MergeResult, MergeError> {
        let parent = self.parent_of(fork)?;
        let base_id = match fork.base_revision() {
            Some(id) => id,
            None => self
                .store
                .get_meta(fork.id, BASE_REVISION_META_KEY)?
                .and_then(|v| v.parse().ok())
                .map(RevisionId)
                .ok_or_else(|| MergeError::not_found("base revision of fork", fork.id))?,
        };
        let base = self
            .store
            .get_revision(base_id)?
            .ok_or_else(|| MergeError::not_found("base revision", base_id))?;

        debug!(
            fork_id = %fork.id,
            parent_id = %parent.id,
            base_revision = %base_id,
            "computing fork diff"
        );
        let result = self.merger.merge(
            &split_lines(&base.content),
            &split_lines(&fork.content),
            &split_lines(&parent.content),
        );

        if cache {
            self.cache
                .set(DIFF_CACHE_NAMESPACE, &fork.id.to_string(), result.clone(), self.ttl);
        }
        Ok(result)
    }
}

/// Merged text, keeping a trailing newline when the fork's content had one.
pub(crate) fn render_merged(result: &MergeResult, fork_content: &str) -> String {
    let mut text = result.merged_text();
    if !text.is_empty() && fork_content.ends_with('\n') {
        text.push('\n');
    }
    text
}

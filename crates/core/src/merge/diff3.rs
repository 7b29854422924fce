//! Three-way merge engine.
//!
//! Diffs a common base against the fork and against the current version,
//! then walks both edit scripts over base positions. Edits that touch the
//! same base region are grouped; a group changed by one side only, or by
//! both sides identically, merges cleanly, anything else is a conflict.

use tracing::{debug, info};

use super::result::{MergeRegion, MergeResult, DEFAULT_CURRENT_LABEL, DEFAULT_FORK_LABEL};
use crate::diff::{edit_script, Edit};

/// Three-way merge engine carrying the conflict-marker labels it stamps on
/// every result.
#[derive(Debug, Clone)]
pub struct Merger {
    fork_label: String,
    current_label: String,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new(DEFAULT_FORK_LABEL, DEFAULT_CURRENT_LABEL)
    }
}

impl Merger {
    pub fn new(fork_label: impl Into<String>, current_label: impl Into<String>) -> Self {
        Self {
            fork_label: fork_label.into(),
            current_label: current_label.into(),
        }
    }

    /// Merge `fork` and `current`, both descended from `base`.
    ///
    /// Lines are compared exactly; callers normalize whitespace beforehand.
    /// Never fails: empty sequences are valid input.
    pub fn merge(&self, base: &[String], fork: &[String], current: &[String]) -> MergeResult {
        info!(
            base_lines = base.len(),
            fork_lines = fork.len(),
            current_lines = current.len(),
            "performing three-way merge"
        );

        // Fast path: if either side is identical to base, the other side wins cleanly.
        let regions = if fork == base {
            debug!("fork == base, current wins cleanly");
            clean(current)
        } else if current == base {
            debug!("current == base, fork wins cleanly");
            clean(fork)
        } else if fork == current {
            debug!("fork == current, identical changes");
            clean(fork)
        } else {
            merge_regions(base, fork, current)
        };

        let result = MergeResult::new(regions).with_labels(&self.fork_label, &self.current_label);
        debug!(conflicts = result.conflict_count(), "three-way merge complete");
        result
    }

    /// Whether `result` holds any conflict region.
    pub fn is_conflicted(result: &MergeResult) -> bool {
        result.is_conflicted()
    }
}

fn clean(lines: &[String]) -> Vec<MergeRegion> {
    let mut regions = Vec::new();
    push_clean(&mut regions, lines);
    regions
}

/// Append clean lines, coalescing with a preceding clean region.
fn push_clean(regions: &mut Vec<MergeRegion>, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    if let Some(MergeRegion::Clean { lines: last }) = regions.last_mut() {
        last.extend_from_slice(lines);
        return;
    }
    regions.push(MergeRegion::Clean {
        lines: lines.to_vec(),
    });
}

/// Whether `edit` belongs to the group spanning `start..end`. Overlapping
/// ranges join; so does an insertion touching the group's end, or any edit
/// starting where an empty group sits.
fn joins(edit: &Edit, start: usize, end: usize) -> bool {
    edit.range.start < end || (edit.range.start == end && (edit.is_insertion() || start == end))
}

/// Apply one side's edits to `base[start..end]`.
fn apply(base: &[String], edits: &[Edit], start: usize, end: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = start;
    for edit in edits {
        debug_assert!(edit.range.start >= cursor, "edits out of base order");
        out.extend_from_slice(&base[cursor..edit.range.start]);
        out.extend_from_slice(&edit.replacement);
        cursor = edit.range.end;
    }
    out.extend_from_slice(&base[cursor..end]);
    out
}

fn merge_regions(base: &[String], fork: &[String], current: &[String]) -> Vec<MergeRegion> {
    let fork_edits = edit_script(base, fork);
    let current_edits = edit_script(base, current);

    let mut regions = Vec::new();
    let (mut fi, mut ci, mut pos) = (0, 0, 0);

    loop {
        let start = match (fork_edits.get(fi), current_edits.get(ci)) {
            (None, None) => break,
            (Some(f), None) => f.range.start,
            (None, Some(c)) => c.range.start,
            (Some(f), Some(c)) => f.range.start.min(c.range.start),
        };
        push_clean(&mut regions, &base[pos..start]);

        // Grow the group until neither side has another edit touching it.
        let (fork_first, current_first) = (fi, ci);
        let mut end = start;
        loop {
            let mut grew = false;
            while let Some(edit) = fork_edits.get(fi).filter(|e| joins(e, start, end)) {
                end = end.max(edit.range.end);
                fi += 1;
                grew = true;
            }
            while let Some(edit) = current_edits.get(ci).filter(|e| joins(e, start, end)) {
                end = end.max(edit.range.end);
                ci += 1;
                grew = true;
            }
            if !grew {
                break;
            }
        }

        let fork_group = &fork_edits[fork_first..fi];
        let current_group = &current_edits[current_first..ci];
        if current_group.is_empty() {
            push_clean(&mut regions, &apply(base, fork_group, start, end));
        } else if fork_group.is_empty() {
            push_clean(&mut regions, &apply(base, current_group, start, end));
        } else {
            let fork_text = apply(base, fork_group, start, end);
            let current_text = apply(base, current_group, start, end);
            if fork_text == current_text {
                push_clean(&mut regions, &fork_text);
            } else {
                debug!(base_start = start, base_end = end, "conflicting region");
                regions.push(MergeRegion::Conflict {
                    fork: fork_text,
                    base: base[start..end].to_vec(),
                    current: current_text,
                });
            }
        }
        pos = end;
    }

    push_clean(&mut regions, &base[pos..]);
    regions
}

//! Edit scripts between two line sequences.
//!
//! Uses the `similar` crate (Myers diff algorithm). Edits are read off the
//! gaps between matched runs, so each one replaces one contiguous base range
//! and the script is ordered by base position.

use std::convert::Infallible;
use std::ops::Range;

use similar::algorithms::{myers, Capture};
use similar::DiffTag;

/// One contiguous change: `base[range]` is replaced by `replacement`.
///
/// An empty `range` is a pure insertion before `range.start`; an empty
/// `replacement` is a pure deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: Vec<String>,
}

impl Edit {
    pub fn is_insertion(&self) -> bool {
        self.range.is_empty()
    }
}

/// Compute the edits that turn `old` into `new`, ordered by base position.
///
/// Edits never overlap: each starts at or after the previous one's end.
pub fn edit_script(old: &[String], new: &[String]) -> Vec<Edit> {
    let mut capture = Capture::new();
    myers::diff(&mut capture, old, 0..old.len(), new, 0..new.len())
        .unwrap_or_else(|never: Infallible| match never {});

    let mut edits: Vec<Edit> = Vec::new();
    let (mut old_cursor, mut new_cursor) = (0, 0);
    let push = |edits: &mut Vec<Edit>, old_range: Range<usize>, new_range: Range<usize>| {
        if old_range.is_empty() && new_range.is_empty() {
            return;
        }
        debug_assert!(edits.last().map_or(true, |e| e.range.end <= old_range.start));
        edits.push(Edit {
            range: old_range,
            replacement: new[new_range].to_vec(),
        });
    };

    // Matched runs advance both cursors together; whatever lies between two
    // runs on either side is one edit.
    for op in capture.into_ops() {
        if op.tag() != DiffTag::Equal {
            continue;
        }
        let (matched_old, matched_new) = (op.old_range(), op.new_range());
        push(
            &mut edits,
            old_cursor..matched_old.start,
            new_cursor..matched_new.start,
        );
        old_cursor = matched_old.end;
        new_cursor = matched_new.end;
    }
    push(&mut edits, old_cursor..old.len(), new_cursor..new.len());

    edits
}

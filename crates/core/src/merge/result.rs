//! Merge results and conflict-marker rendering.

use serde::{Deserialize, Serialize};

/// Default label on the fork side of conflict markers.
pub const DEFAULT_FORK_LABEL: &str = "Fork";

/// Default label on the current-version side of conflict markers.
pub const DEFAULT_CURRENT_LABEL: &str = "Current Version";

/// One region of merged output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeRegion {
    /// Lines both sides agree on (or only one side touched).
    Clean { lines: Vec<String> },
    /// A base region both sides changed differently.
    Conflict {
        fork: Vec<String>,
        base: Vec<String>,
        current: Vec<String>,
    },
}

impl MergeRegion {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Location of a rendered conflict block within merged output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictMarker {
    /// Line number (1-indexed) of the `<<<<<<<` line.
    pub start_line: usize,
    /// Line number (1-indexed) of the `>>>>>>>` line.
    pub end_line: usize,
}

/// The outcome of a three-way merge: ordered regions plus the labels used
/// when rendering conflict markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    pub regions: Vec<MergeRegion>,
    pub fork_label: String,
    pub current_label: String,
}

impl MergeResult {
    pub fn new(regions: Vec<MergeRegion>) -> Self {
        Self {
            regions,
            fork_label: DEFAULT_FORK_LABEL.to_string(),
            current_label: DEFAULT_CURRENT_LABEL.to_string(),
        }
    }

    /// Replace the conflict-marker labels.
    pub fn with_labels(mut self, fork_label: impl Into<String>, current_label: impl Into<String>) -> Self {
        self.fork_label = fork_label.into();
        self.current_label = current_label.into();
        self
    }

    /// True iff any region is a conflict.
    pub fn is_conflicted(&self) -> bool {
        self.regions.iter().any(MergeRegion::is_conflict)
    }

    pub fn conflict_count(&self) -> usize {
        self.regions.iter().filter(|r| r.is_conflict()).count()
    }

    /// Render the merged lines, with standard conflict markers around every
    /// conflict region.
    pub fn merged_lines(&self) -> Vec<String> {
        self.render().0
    }

    /// [`merged_lines`](Self::merged_lines) joined with `\n`.
    pub fn merged_text(&self) -> String {
        self.merged_lines().join("\n")
    }

    /// Where each conflict block sits in [`merged_lines`](Self::merged_lines).
    pub fn conflict_markers(&self) -> Vec<ConflictMarker> {
        self.render().1
    }

    fn render(&self) -> (Vec<String>, Vec<ConflictMarker>) {
        let mut output = Vec::new();
        let mut markers = Vec::new();

        for region in &self.regions {
            match region {
                MergeRegion::Clean { lines } => output.extend(lines.iter().cloned()),
                MergeRegion::Conflict { fork, current, .. } => {
                    let start_line = output.len() + 1;
                    output.push(format!("<<<<<<< {}", self.fork_label));
                    output.extend(fork.iter().cloned());
                    output.push("=======".to_string());
                    output.extend(current.iter().cloned());
                    output.push(format!(">>>>>>> {}", self.current_label));
                    markers.push(ConflictMarker {
                        start_line,
                        end_line: output.len(),
                    });
                }
            }
        }

        (output, markers)
    }
}

//! Unified patch preview of a fork against its parent.

use diffy::DiffOptions;

/// Render the unified diff from `old` to `new` with `context` lines around
/// each hunk. Identical inputs produce a header-only patch.
pub fn unified_preview(old: &str, new: &str, context: usize) -> String {
    let mut options = DiffOptions::new();
    options.set_context_len(context);
    options.create_patch(old, new).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_shows_changed_lines() {
        let patch = unified_preview("a\nb\nc\n", "a\nB\nc\n", 1);
        assert!(patch.contains("-b\n"));
        assert!(patch.contains("+B\n"));
        assert!(patch.contains("@@"));
    }

    #[test]
    fn test_preview_of_identical_text_has_no_hunks() {
        let patch = unified_preview("same\n", "same\n", 3);
        assert!(!patch.contains("@@"));
    }
}

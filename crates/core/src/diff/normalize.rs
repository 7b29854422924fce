//! Whitespace normalization.
//!
//! All three merge inputs pass through [`split_lines`] so that incidental
//! whitespace drift (trailing spaces, CRLF line endings, doubled blank
//! lines) never shows up as an edit.

/// Canonicalize whitespace in `text`.
///
/// - `\r\n` and lone `\r` become `\n`
/// - every line is trimmed at both ends
/// - runs of spaces/tabs inside a line collapse to one space
/// - runs of blank lines collapse to one blank line
/// - leading and trailing blank lines are removed
pub fn normalize_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out: Vec<String> = Vec::new();
    let mut previous_blank = true;
    for raw in unified.split('\n') {
        let line = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            if !previous_blank {
                out.push(line);
            }
            previous_blank = true;
        } else {
            out.push(line);
            previous_blank = false;
        }
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }

    out.join("\n")
}

/// Normalize `text` and split it into lines. Empty (or all-whitespace)
/// text yields no lines.
pub fn split_lines(text: &str) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }
    normalized.split('\n').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_lines_and_trailing_newline() {
        assert_eq!(normalize_whitespace("Hello world \n"), "Hello world");
        assert_eq!(normalize_whitespace("  a\t\n b  "), "a\nb");
    }

    #[test]
    fn test_collapses_inner_runs() {
        assert_eq!(normalize_whitespace("a  \t b"), "a b");
    }

    #[test]
    fn test_collapses_blank_line_runs() {
        assert_eq!(normalize_whitespace("\n\npara one\n\n\n  \npara two\n\n"), "para one\n\npara two");
    }

    #[test]
    fn test_line_endings() {
        assert_eq!(normalize_whitespace("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("x\ny\n"), vec!["x", "y"]);
        assert!(split_lines("").is_empty());
        assert!(split_lines(" \n\t\n").is_empty());
    }
}

//! Splitting a unified diff into per-file sections

use regex::Regex;
use std::sync::OnceLock;

/// Header that opens every file section of a git diff
pub const DIFF_MARKER: &str = "diff --git";

fn header_re() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| Regex::new(r"^diff --git a/(.*?) b/(.*?)$").expect("valid header regex"))
}

/// A contiguous slice of a diff: one file section, or the text before the
/// first file section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSegment<'a> {
    text: &'a str,
}

impl<'a> FileSegment<'a> {
    pub fn as_str(&self) -> &'a str {
        self.text
    }

    /// Whether the segment opens with a file header (false for a preamble)
    pub fn is_file_section(&self) -> bool {
        self.text.starts_with(DIFF_MARKER)
    }

    /// Path named by the file header, preferring the new side.
    pub fn path(&self) -> Option<&'a str> {
        if !self.is_file_section() {
            return None;
        }
        let header = self.text.lines().next()?;
        let captures = header_re().captures(header)?;
        captures
            .get(2)
            .or_else(|| captures.get(1))
            .map(|m| m.as_str())
            .filter(|path| !path.is_empty())
    }
}

/// Split `diff` at every line that starts with [`DIFF_MARKER`].
///
/// Segments keep diff order and their concatenation is exactly `diff`.
/// Non-empty text before the first header becomes a leading segment.
pub fn split_file_segments(diff: &str) -> Vec<FileSegment<'_>> {
    let mut starts: Vec<usize> = diff
        .match_indices(DIFF_MARKER)
        .map(|(idx, _)| idx)
        .filter(|&idx| idx == 0 || diff.as_bytes()[idx - 1] == b'\n')
        .collect();

    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    let mut segments = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(diff.len());
        if start < end {
            segments.push(FileSegment {
                text: &diff[start..end],
            });
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "diff --git a/src/lib.rs b/src/lib.rs
index 1234567..89abcde 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,2 +1,2 @@
-old
+new
diff --git a/README.md b/README.md
index 1111111..2222222 100644
--- a/README.md
+++ b/README.md
@@ -1 +1 @@
-Hello
+Hello, world
";

    #[test]
    fn test_split_two_files() {
        let segments = split_file_segments(TWO_FILES);
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.is_file_section()));
        assert_eq!(segments[0].path(), Some("src/lib.rs"));
        assert_eq!(segments[1].path(), Some("README.md"));
        assert!(segments[0].as_str().ends_with("+new\n"));
    }

    #[test]
    fn test_concatenation_reconstructs_input() {
        let input = format!("staged changes\n\n{}\n\n{}", TWO_FILES, TWO_FILES);
        let segments = split_file_segments(&input);
        assert_eq!(segments.len(), 5);
        assert!(!segments[0].is_file_section());
        assert_eq!(segments[0].path(), None);

        let rebuilt: String = segments.iter().map(|s| s.as_str()).collect();
        assert_eq!(rebuilt, input);
    }

    #[test]
    fn test_marker_inside_line_does_not_split() {
        let diff = "diff --git a/notes.md b/notes.md
--- a/notes.md
+++ b/notes.md
@@ -0,0 +1 @@
+run `git diff --git` to compare
+diff --git a/fake b/fake
";
        // the added lines start with '+', so neither is a header
        let segments = split_file_segments(diff);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].as_str(), diff);
    }

    #[test]
    fn test_no_structure() {
        assert!(split_file_segments("").is_empty());

        let segments = split_file_segments("just some text");
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].is_file_section());
    }

    #[test]
    fn test_renamed_file_path() {
        let diff = "diff --git a/old_name.txt b/new_name.txt
similarity index 100%
rename from old_name.txt
rename to new_name.txt
";
        let segments = split_file_segments(diff);
        assert_eq!(segments[0].path(), Some("new_name.txt"));
    }
}

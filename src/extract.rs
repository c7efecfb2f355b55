//! Task extraction from source text.
//!
//! This module scans line-oriented document text for `TODO` markers and
//! turns each match into a [`Task`] record carrying a stable content-address
//! (see [`crate::hash`]). Lines are processed one at a time with a bounded
//! lookahead window, so extraction never needs the whole document as a
//! single buffer.
//!
//! # Marker grammar
//!
//! ```text
//! TODO: message            tag defaults to "general"
//! TODO(bug): message       explicit tag
//! ```
//!
//! Non-matching lines are skipped; a marker whose message trims to empty
//! emits nothing. Extraction never fails on malformed input.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::task_hash;

/// Regex for the marker grammar: `TODO(tag)?: message`.
const MARKER_PATTERN: &str = r"TODO(?:\((?P<tag>[^)]*)\))?:\s*(?P<title>.*)";

/// Tag assigned to markers that carry no explicit tag.
pub const DEFAULT_TAG: &str = "general";

/// Extra lines the snippet lookahead may scan past the capture cap before
/// giving up on finding a non-blank line.
const LOOKAHEAD_SLACK: usize = 20;

/// Characters stripped when deciding whether a marker line carries code
/// before the `TODO` token. These cover the comment delimiters of the
/// languages the scanner is pointed at in practice.
const COMMENT_DELIMITERS: &[char] = &['/', '#', '*', '-', ';', '<', '!', '~', '%'];

// ============================================================================
// Task Record
// ============================================================================

/// One detected task, recomputed on every scan.
///
/// The `hash` field is the task's content-address over `(file, tag, title)`.
/// `line` and `snippet` are presentation data and are excluded from the
/// address, so a task keeps its identity when its code moves within the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// File the marker was found in.
    pub file: PathBuf,
    /// 1-based line number of the marker.
    pub line: u32,
    /// Marker tag, `"general"` when absent.
    pub tag: String,
    /// Trimmed message text.
    pub title: String,
    /// Surrounding-code snippet, possibly empty.
    pub snippet: String,
    /// Content-address of `(file, tag, title)`.
    pub hash: String,
}

// ============================================================================
// Extraction Options
// ============================================================================

/// Configuration for snippet capture during extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Capture a code snippet for each detected task.
    pub snippet_enabled: bool,
    /// Maximum snippet lines captured before truncation.
    pub snippet_max_lines: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            snippet_enabled: true,
            snippet_max_lines: 5,
        }
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// Scans document text for `TODO` markers.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use todosync::extract::{ExtractOptions, Extractor};
///
/// let extractor = Extractor::new(ExtractOptions::default()).unwrap();
/// let tasks = extractor.extract(Path::new("demo.rs"), "// TODO: fix this\n");
/// assert_eq!(tasks.len(), 1);
/// assert_eq!(tasks[0].title, "fix this");
/// assert_eq!(tasks[0].tag, "general");
/// ```
#[derive(Debug, Clone)]
pub struct Extractor {
    marker: Regex,
    options: ExtractOptions,
}

impl Extractor {
    /// Create an extractor with the given snippet options.
    pub fn new(options: ExtractOptions) -> Result<Self> {
        let marker = Regex::new(MARKER_PATTERN).context("Failed to compile marker regex")?;
        Ok(Self { marker, options })
    }

    /// Extract tasks from a full document held in memory.
    ///
    /// Convenience wrapper over [`Extractor::extract_lines`].
    #[must_use]
    pub fn extract(&self, file: &Path, content: &str) -> Vec<Task> {
        self.extract_lines(file, content.lines())
    }

    /// Extract tasks from an iterator of document lines.
    ///
    /// Lines are consumed one at a time; only the bounded snippet lookahead
    /// window is buffered, so memory use stays flat on large files.
    pub fn extract_lines<I, S>(&self, file: &Path, lines: I) -> Vec<Task>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cursor = LineCursor::new(lines.into_iter());
        let mut tasks = Vec::new();
        let mut line_no: u32 = 0;

        while let Some(line) = cursor.advance() {
            line_no += 1;

            let Some(caps) = self.marker.captures(&line) else {
                continue;
            };
            // Marker position is needed for the inline-code check below.
            let marker_start = caps.get(0).map_or(0, |m| m.start());

            let title = caps
                .name("title")
                .map_or("", |m| m.as_str())
                .trim()
                .to_string();
            if title.is_empty() {
                // A bare `TODO:` carries no actionable message.
                continue;
            }

            let tag = caps
                .name("tag")
                .map(|m| m.as_str().trim())
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_TAG)
                .to_string();

            let snippet = self.capture_snippet(&line, marker_start, &mut cursor);
            let hash = task_hash(file, &tag, &title);

            tasks.push(Task {
                file: file.to_path_buf(),
                line: line_no,
                tag,
                title,
                snippet,
                hash,
            });
        }

        tasks
    }

    /// Apply the snippet heuristic for one matched marker line.
    fn capture_snippet<I, S>(
        &self,
        line: &str,
        marker_start: usize,
        cursor: &mut LineCursor<I, S>,
    ) -> String
    where
        I: Iterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.options.snippet_enabled {
            return String::new();
        }

        // Code before the marker means the TODO is inline with code; the
        // whole line is the most useful context.
        if has_code_before_marker(line, marker_start) {
            return line.to_string();
        }

        // Otherwise look ahead: skip blank lines, then capture the next
        // consecutive run of non-blank lines verbatim, capped at
        // snippet_max_lines with a trailing `...` when the run continues.
        let cap = self.options.snippet_max_lines;
        let window = cap + LOOKAHEAD_SLACK;

        let mut offset = 0;
        while offset < window {
            match cursor.peek(offset) {
                Some(peeked) if peeked.trim().is_empty() => offset += 1,
                Some(_) => break,
                None => return String::new(),
            }
        }
        if offset >= window {
            return String::new();
        }

        let mut captured: Vec<String> = Vec::new();
        let mut truncated = false;
        loop {
            match cursor.peek(offset) {
                Some(peeked) if !peeked.trim().is_empty() => {
                    if captured.len() == cap {
                        truncated = true;
                        break;
                    }
                    captured.push(peeked.to_string());
                    offset += 1;
                }
                _ => break,
            }
        }

        if truncated {
            captured.push("...".to_string());
        }
        captured.join("\n")
    }
}

/// Check whether a marker line has code content before the marker token.
///
/// Comment delimiters and whitespace in the prefix do not count as code.
fn has_code_before_marker(line: &str, marker_start: usize) -> bool {
    line[..marker_start]
        .chars()
        .any(|c| !c.is_whitespace() && !COMMENT_DELIMITERS.contains(&c))
}

// ============================================================================
// Line Cursor
// ============================================================================

/// Pull-based line reader with a peekable lookahead buffer.
///
/// `advance` consumes the next line; `peek(n)` inspects the n-th upcoming
/// line without consuming it, so snippet capture never steals lines from
/// marker detection.
struct LineCursor<I, S> {
    iter: I,
    buffer: VecDeque<String>,
    _marker: std::marker::PhantomData<S>,
}

impl<I, S> LineCursor<I, S>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    fn new(iter: I) -> Self {
        Self {
            iter,
            buffer: VecDeque::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Consume and return the next line.
    fn advance(&mut self) -> Option<String> {
        if let Some(line) = self.buffer.pop_front() {
            return Some(line);
        }
        self.iter.next().map(|l| l.as_ref().to_string())
    }

    /// Inspect the n-th upcoming line without consuming it.
    fn peek(&mut self, n: usize) -> Option<&str> {
        while self.buffer.len() <= n {
            let line = self.iter.next()?;
            self.buffer.push_back(line.as_ref().to_string());
        }
        self.buffer.get(n).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor {
        Extractor::new(ExtractOptions::default()).unwrap()
    }

    fn extract(content: &str) -> Vec<Task> {
        extractor().extract(Path::new("test.rs"), content)
    }

    #[test]
    fn test_basic_marker() {
        let tasks = extract("// TODO: fix the bug\n");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "fix the bug");
        assert_eq!(tasks[0].tag, "general");
        assert_eq!(tasks[0].line, 1);
    }

    #[test]
    fn test_tagged_marker() {
        let tasks = extract("# TODO(perf): cache this lookup\n");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].tag, "perf");
        assert_eq!(tasks[0].title, "cache this lookup");
    }

    #[test]
    fn test_empty_tag_falls_back_to_general() {
        let tasks = extract("// TODO(): tidy up\n");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].tag, "general");
    }

    #[test]
    fn test_empty_title_emits_nothing() {
        assert!(extract("// TODO:\n").is_empty());
        assert!(extract("// TODO:    \n").is_empty());
    }

    #[test]
    fn test_non_matching_lines_skipped() {
        let tasks = extract("fn main() {}\nlet todo = 1;\n// TODO: real one\n");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].line, 3);
    }

    #[test]
    fn test_line_numbers_are_one_based() {
        let tasks = extract("\n\n// TODO: third line\n");
        assert_eq!(tasks[0].line, 3);
    }

    #[test]
    fn test_inline_code_snippet_is_whole_line() {
        let tasks = extract("let x = compute(); // TODO: handle overflow\n");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].snippet, "let x = compute(); // TODO: handle overflow");
    }

    #[test]
    fn test_comment_only_prefix_is_not_inline() {
        // Prefix is all comment delimiters, so lookahead applies.
        let tasks = extract("// TODO: alone\nnext_line();\n");
        assert_eq!(tasks[0].snippet, "next_line();");
    }

    #[test]
    fn test_snippet_skips_leading_blank_lines() {
        // Spec scenario: three blank lines, then code.
        let content = "// TODO(bug): race condition\n\n\n\ndoWork();\n";
        let tasks = extract(content);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].snippet, "doWork();");
    }

    #[test]
    fn test_snippet_truncation_marker() {
        let content = "// TODO: big block\nl1\nl2\nl3\nl4\nl5\nl6\nl7\n";
        let tasks = extract(content);
        assert_eq!(tasks[0].snippet, "l1\nl2\nl3\nl4\nl5\n...");
    }

    #[test]
    fn test_snippet_exact_cap_has_no_marker() {
        let content = "// TODO: block\nl1\nl2\nl3\nl4\nl5\n";
        let tasks = extract(content);
        assert_eq!(tasks[0].snippet, "l1\nl2\nl3\nl4\nl5");
    }

    #[test]
    fn test_snippet_stops_at_blank_line() {
        let content = "// TODO: short\nonly_line();\n\nafter_gap();\n";
        let tasks = extract(content);
        assert_eq!(tasks[0].snippet, "only_line();");
    }

    #[test]
    fn test_snippet_preserves_indentation() {
        let content = "// TODO: indent\n    if ok {\n        go();\n";
        let tasks = extract(content);
        assert_eq!(tasks[0].snippet, "    if ok {\n        go();");
    }

    #[test]
    fn test_snippet_empty_when_lookahead_exhausted() {
        let blanks = "\n".repeat(40);
        let content = format!("// TODO: nothing near\n{blanks}far_away();\n");
        let tasks = extract(&content);
        assert_eq!(tasks[0].snippet, "");
    }

    #[test]
    fn test_snippet_disabled() {
        let ex = Extractor::new(ExtractOptions {
            snippet_enabled: false,
            snippet_max_lines: 5,
        })
        .unwrap();
        let tasks = ex.extract(Path::new("t.rs"), "let a = 1; // TODO: x\ncode();\n");
        assert_eq!(tasks[0].snippet, "");
    }

    #[test]
    fn test_lookahead_does_not_consume_markers() {
        // The second marker sits inside the first one's snippet window and
        // must still be extracted in its own right.
        let content = "// TODO: first\ncode();\n// TODO: second\n";
        let tasks = extract(content);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].title, "second");
        assert_eq!(tasks[1].line, 3);
    }

    #[test]
    fn test_hash_stable_under_line_shift() {
        let before = extract("// TODO: fix bug\n");
        let after = extract("\n\n\n\n// TODO: fix bug\n");
        assert_eq!(before[0].hash, after[0].hash);
        assert_ne!(before[0].line, after[0].line);
    }

    #[test]
    fn test_title_edit_changes_hash() {
        let a = extract("// TODO: fix bug\n");
        let b = extract("// TODO: fix bug now\n");
        assert_ne!(a[0].hash, b[0].hash);
    }

    #[test]
    fn test_ordered_output() {
        let content = "// TODO: one\nx();\n// TODO: two\ny();\n// TODO: three\n";
        let titles: Vec<_> = extract(content).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["one", "two", "three"]);
    }
}

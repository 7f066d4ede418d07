//! Capture DSL for creating many issues from one block of text.
//!
//! Each entry is a `- <type>: <title>` line. Indentation nests entries:
//! an entry's parent is the nearest entry above it with a smaller indent.
//! Lines indented deeper than the entry line that follow it form its body.
//!
//! ```text
//! - epic: Parser
//!   One line summary
//!   ---
//!   Longer details
//!   - story: Lexer
//!     - task: Tokens
//! - idea: Pretty errors
//! ```
//!
//! Lines whose first non-blank character is `#` are comments and are
//! dropped everywhere, including inside bodies. Lines that are neither
//! entries, bodies nor comments are ignored.
//!
//! ## Module Structure
//!
//! - `groom` - Backlog rendering and the groom diff
//! - `edit` - Single-issue editor template

pub mod edit;
pub mod groom;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::IssueType;

static ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*)-\s*(epic|story|task|bug|idea):\s*(.+)$").expect("entry pattern is valid")
});

/// One issue requested by capture text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureEntry {
    /// Requested type
    pub issue_type: IssueType,

    /// Title, trimmed
    pub title: String,

    /// Title of the enclosing entry, if nested
    pub parent_title: Option<String>,

    /// De-indented body text
    pub body: Option<String>,
}

/// Parse capture text into entries, in document order.
///
/// Never fails: anything that is not a well-formed entry is skipped.
///
/// # Example
///
/// ```
/// use tw::capture::parse;
///
/// let entries = parse("- epic: Parser\n  - story: Lexer\n");
/// assert_eq!(entries.len(), 2);
/// assert_eq!(entries[1].parent_title.as_deref(), Some("Parser"));
/// ```
pub fn parse(text: &str) -> Vec<CaptureEntry> {
    parse_located(text).into_iter().map(|(_, entry)| entry).collect()
}

/// Like [`parse`], also returning the zero-based line of each entry.
pub(crate) fn parse_located(text: &str) -> Vec<(usize, CaptureEntry)> {
    let lines: Vec<&str> = text.lines().collect();
    let mut entries = Vec::new();
    // indent -> title of the latest entry at that indent
    let mut open: BTreeMap<usize, String> = BTreeMap::new();

    let mut i = 0;
    while i < lines.len() {
        let start = i;
        i += 1;
        let Some((indent, issue_type, title)) = entry_line(lines[start]) else {
            continue;
        };

        open.retain(|&level, _| level < indent);
        let parent_title = open.values().next_back().cloned();

        let (body, next) = collect_body(&lines, i, indent);
        i = next;

        open.insert(indent, title.clone());
        entries.push((
            start,
            CaptureEntry {
                issue_type,
                title,
                parent_title,
                body,
            },
        ));
    }

    entries
}

/// Indent, type and title of an entry line.
fn entry_line(line: &str) -> Option<(usize, IssueType, String)> {
    let caps = ENTRY_PATTERN.captures(line)?;
    let title = caps[3].trim();
    if title.is_empty() {
        return None;
    }
    let issue_type = caps[2].parse().ok()?;
    Some((caps[1].len(), issue_type, title.to_string()))
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Gather the body of the entry at `indent`, starting at line `from`.
///
/// Returns the body and the index of the first line not consumed.
fn collect_body(lines: &[&str], from: usize, indent: usize) -> (Option<String>, usize) {
    let mut body: Vec<String> = Vec::new();
    let mut base: Option<usize> = None;
    let mut i = from;

    while let Some(line) = lines.get(i) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !body.is_empty() {
                body.push(String::new());
            }
            i += 1;
            continue;
        }
        if is_comment(line) {
            i += 1;
            continue;
        }
        if entry_line(line).is_some() {
            break;
        }

        let line_indent = indent_of(line);
        if line_indent <= indent {
            break;
        }

        let base = *base.get_or_insert(line_indent);
        let text = if line_indent >= base {
            line.get(base..).unwrap_or(trimmed)
        } else {
            trimmed
        };
        body.push(text.to_string());
        i += 1;
    }

    while body.last().is_some_and(String::is_empty) {
        body.pop();
    }

    ((!body.is_empty()).then(|| body.join("\n")), i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entry(issue_type: IssueType, title: &str, parent: Option<&str>, body: Option<&str>) -> CaptureEntry {
        CaptureEntry {
            issue_type,
            title: title.into(),
            parent_title: parent.map(Into::into),
            body: body.map(Into::into),
        }
    }

    #[test]
    fn test_hierarchy_and_body() {
        let text = "\
- epic: Parser
  Summary line
  ---
  Details

      nested more

  - story: Lexer
    - task: Tokens
- bug: Crash on empty input
";
        assert_eq!(
            parse(text),
            vec![
                entry(
                    IssueType::Epic,
                    "Parser",
                    None,
                    Some("Summary line\n---\nDetails\n\n    nested more")
                ),
                entry(IssueType::Story, "Lexer", Some("Parser"), None),
                entry(IssueType::Task, "Tokens", Some("Lexer"), None),
                entry(IssueType::Bug, "Crash on empty input", None, None),
            ]
        );
    }

    #[test]
    fn test_comments_are_ignored_everywhere() {
        let text = "\
# a leading comment
- story: Docs
  first
  # not part of the body
  second
";
        assert_eq!(
            parse(text),
            vec![entry(IssueType::Story, "Docs", None, Some("first\nsecond"))]
        );
    }

    #[test]
    fn test_parent_is_nearest_shallower_entry() {
        let text = "\
- epic: A
  - story: B
- epic: C
    - task: D
";
        let entries = parse(text);
        assert_eq!(entries[3].title, "D");
        assert_eq!(entries[3].parent_title.as_deref(), Some("C"));
    }

    #[test]
    fn test_shallower_body_line_is_trimmed() {
        let text = "- idea: Cache\n      deep first\n   shallow  \n";
        assert_eq!(
            parse(text)[0].body.as_deref(),
            Some("deep first\nshallow")
        );
    }

    #[rstest]
    #[case::unknown_type("- chore: sweep")]
    #[case::empty_title("- task:    ")]
    #[case::no_dash("task: nope")]
    #[case::commented("# - task: hidden")]
    #[case::blank("   ")]
    fn test_non_entries_are_skipped(#[case] text: &str) {
        assert!(parse(text).is_empty());
    }

    #[test]
    fn test_body_ends_at_shallower_line() {
        let text = "- epic: A\n  body\nstray text\n  - story: B\n";
        let entries = parse(text);
        assert_eq!(entries[0].body.as_deref(), Some("body"));
        assert_eq!(entries[1].parent_title.as_deref(), Some("A"));
    }

    #[test]
    fn test_located_lines() {
        let located = parse_located("# c\n- epic: A\n  x\n- idea: B\n");
        let starts: Vec<usize> = located.iter().map(|(line, _)| *line).collect();
        assert_eq!(starts, vec![1, 3]);
    }
}

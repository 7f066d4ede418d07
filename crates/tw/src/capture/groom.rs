//! Backlog grooming: render the backlog as capture text, let the user edit
//! it, then diff the edited text against the original backlog.
//!
//! The rendered form tags each entry with its identifier:
//!
//! ```text
//! # P-4 (bug)
//! - bug: Crash on empty input
//!     Steps to reproduce
//!
//! # P-7 (idea)
//! - idea: Pretty errors
//! ```
//!
//! [`diff`] is a pure function of the edited text and the original id set.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{parse_located, CaptureEntry};
use crate::domain::Issue;
use crate::ids::IssueId;

static ID_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#\s*([A-Z]+-\d+(?:-\d+)?(?:[a-z]+)?)\s*\(").expect("id comment pattern is valid")
});

/// Usage notes appended below the rendered backlog in the editor.
pub const INSTRUCTIONS: &str = "\
# Instructions:
# - Change bug/idea to epic/story/task to convert it
# - Remove an entry entirely to resolve it
# - Leave an entry unchanged to keep it in the backlog
# - Add new entries without an ID comment to create them
";

/// What to do with one backlog item or new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroomAction {
    /// Keep the original item as it is
    Unchanged(IssueId),

    /// Mark the original item done
    Resolve(IssueId),

    /// Create a new issue
    Create(CaptureEntry),
}

/// Outcome of applying a list of [`GroomAction`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroomSummary {
    /// Items marked done
    pub resolved: Vec<IssueId>,

    /// Issues created
    pub created: Vec<IssueId>,

    /// Items left alone
    pub unchanged: Vec<IssueId>,
}

/// Render backlog items in the groom editor format.
pub fn render(backlog: &[Issue]) -> String {
    let mut lines = Vec::new();

    for issue in backlog {
        lines.push(format!("# {} ({})", issue.id, issue.issue_type));
        lines.push(format!("- {}: {}", issue.issue_type, issue.title));
        if let Some(body) = &issue.body {
            lines.extend(body.lines().map(|line| format!("    {line}")));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn id_comment(line: &str) -> Option<IssueId> {
    let caps = ID_COMMENT.captures(line)?;
    IssueId::parse(&caps[1]).ok()
}

/// Compare edited groom text against the ids that were rendered.
///
/// - an original id with no entry in the text is resolved
/// - an original id whose entry is still a bug or idea is unchanged
/// - an original id whose entry became epic/story/task is resolved and
///   its entry created
/// - every other entry is created
///
/// An id comment only tags the entry on the line directly below it, and
/// only its first occurrence counts; a repeated id tags nothing.
/// Resolutions of dropped items come first, then one or two actions per
/// entry in document order.
pub fn diff(edited: &str, originals: &[IssueId]) -> Vec<GroomAction> {
    let mut located = parse_located(edited).into_iter().peekable();
    let mut tagged: Vec<(Option<IssueId>, CaptureEntry)> = Vec::new();
    let mut pending: Option<IssueId> = None;
    let mut claimed: HashSet<IssueId> = HashSet::new();

    for (index, line) in edited.lines().enumerate() {
        if let Some((_, entry)) = located.next_if(|(start, _)| *start == index) {
            let tag = pending.take().filter(|id| claimed.insert(id.clone()));
            tagged.push((tag, entry));
        } else {
            pending = id_comment(line);
        }
    }

    let seen: HashSet<IssueId> = tagged.iter().filter_map(|(id, _)| id.clone()).collect();
    let mut actions: Vec<GroomAction> = originals
        .iter()
        .filter(|id| !seen.contains(*id))
        .cloned()
        .map(GroomAction::Resolve)
        .collect();

    for (id, entry) in tagged {
        match id {
            Some(id) if originals.contains(&id) => {
                if entry.issue_type.is_backlog() {
                    actions.push(GroomAction::Unchanged(id));
                } else {
                    actions.push(GroomAction::Resolve(id));
                    actions.push(GroomAction::Create(entry));
                }
            }
            _ => actions.push(GroomAction::Create(entry)),
        }
    }

    actions
}

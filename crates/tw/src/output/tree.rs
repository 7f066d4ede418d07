//! Indented tree rendering for `tw tree` and `tw watch`.

use std::collections::HashMap;
use std::fmt::Write as _;

use super::{colorize_id, colorize_status, OutputConfig};
use crate::domain::Issue;
use crate::ids::IssueId;

const INDENT: &str = "  ";

/// Render issues in tree order, indenting each under its parent.
///
/// `tree` must list every parent before its children, as
/// [`IssueService::get_issue_tree`](crate::service::IssueService::get_issue_tree)
/// does. An issue whose parent is not in the list starts at depth zero.
pub fn render_tree(tree: &[Issue], config: &OutputConfig) -> String {
    let mut depth: HashMap<&IssueId, usize> = HashMap::with_capacity(tree.len());
    let mut out = String::new();

    for issue in tree {
        let level = issue
            .parent
            .as_ref()
            .and_then(|p| depth.get(p))
            .map_or(0, |d| d + 1);
        depth.insert(&issue.id, level);
        push_line(&mut out, level, issue, config);
    }
    out
}

/// Render the backlog under a `Backlog:` heading; empty when there is none.
pub fn render_backlog(backlog: &[Issue], config: &OutputConfig) -> String {
    if backlog.is_empty() {
        return String::new();
    }
    let mut out = String::from("Backlog:\n");
    for issue in backlog {
        out.push_str(INDENT);
        let _ = writeln!(
            out,
            "{} ({}) {}",
            colorize_id(&issue.id.to_string(), config),
            issue.issue_type,
            issue.title
        );
    }
    out
}

fn push_line(out: &mut String, level: usize, issue: &Issue, config: &OutputConfig) {
    out.push_str(&INDENT.repeat(level));
    let _ = writeln!(
        out,
        "{} [{}] {}",
        colorize_id(&issue.id.to_string(), config),
        colorize_status(issue.status, config),
        issue.title
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IssueStatus, IssueType};

    fn issue(id: &str, issue_type: IssueType, parent: Option<&str>) -> Issue {
        let mut issue = Issue::new(IssueId::parse(id).unwrap(), issue_type, format!("title {id}"));
        issue.parent = parent.map(|p| IssueId::parse(p).unwrap());
        issue
    }

    #[test]
    fn test_tree_indents_by_depth() {
        let mut story = issue("P-1-1", IssueType::Story, Some("P-1"));
        story.status = IssueStatus::InProgress;
        let tree = vec![
            issue("P-1", IssueType::Epic, None),
            story,
            issue("P-1-1a", IssueType::Task, Some("P-1-1")),
            issue("P-2", IssueType::Epic, None),
        ];

        let text = render_tree(&tree, &OutputConfig::plain());
        assert_eq!(
            text,
            "P-1 [new] title P-1\n  P-1-1 [in_progress] title P-1-1\n    P-1-1a [new] title P-1-1a\nP-2 [new] title P-2\n"
        );
    }

    #[test]
    fn test_rooted_subtree_starts_at_zero() {
        let tree = vec![
            issue("P-1-1", IssueType::Story, Some("P-1")),
            issue("P-1-1a", IssueType::Task, Some("P-1-1")),
        ];
        let text = render_tree(&tree, &OutputConfig::plain());
        assert!(text.starts_with("P-1-1 [new]"));
        assert!(text.contains("\n  P-1-1a [new]"));
    }

    #[test]
    fn test_backlog_section() {
        assert_eq!(render_backlog(&[], &OutputConfig::plain()), "");

        let text = render_backlog(&[issue("P-3", IssueType::Bug, None)], &OutputConfig::plain());
        assert_eq!(text, "Backlog:\n  P-3 (bug) title P-3\n");
    }
}

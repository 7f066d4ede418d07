//! Hierarchy queries over a flat list of issues.
//!
//! Built fresh for every query; parent links are followed through maps
//! keyed by id. Walks keep a visited set so a hand-edited store with a
//! parent cycle cannot hang a query.

use std::collections::{HashMap, HashSet};

use crate::domain::{Issue, IssueStatus};
use crate::ids::IssueId;

pub(crate) struct Forest<'a> {
    by_id: HashMap<&'a IssueId, &'a Issue>,
    children: HashMap<&'a IssueId, Vec<&'a Issue>>,
}

impl<'a> Forest<'a> {
    pub fn new(issues: &'a [Issue]) -> Self {
        let mut by_id = HashMap::with_capacity(issues.len());
        let mut children: HashMap<&'a IssueId, Vec<&'a Issue>> = HashMap::new();

        for issue in issues {
            by_id.insert(&issue.id, issue);
            if let Some(parent) = &issue.parent {
                children.entry(parent).or_default().push(issue);
            }
        }
        for list in children.values_mut() {
            list.sort_by(|a, b| a.id.cmp(&b.id));
        }

        Self { by_id, children }
    }

    pub fn get(&self, id: &IssueId) -> Option<&'a Issue> {
        self.by_id.get(id).copied()
    }

    /// Direct children, sorted by id.
    pub fn children(&self, id: &IssueId) -> &[&'a Issue] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// Parent, grandparent, ... up to the first missing link.
    pub fn ancestors(&self, issue: &Issue) -> Vec<&'a Issue> {
        let mut seen: HashSet<&IssueId> = HashSet::from([&issue.id]);
        let mut out = Vec::new();
        let mut next = issue.parent.as_ref();

        while let Some(parent) = next.and_then(|id| self.get(id)) {
            if !seen.insert(&parent.id) {
                break;
            }
            out.push(parent);
            next = parent.parent.as_ref();
        }
        out
    }

    /// All descendants, depth-first pre-order, siblings by id.
    pub fn descendants(&self, id: &IssueId) -> Vec<&'a Issue> {
        let mut seen: HashSet<&IssueId> = HashSet::from([id]);
        let mut out = Vec::new();
        let mut stack: Vec<&'a Issue> = self.children(id).iter().rev().copied().collect();

        while let Some(issue) = stack.pop() {
            if !seen.insert(&issue.id) {
                continue;
            }
            out.push(issue);
            stack.extend(self.children(&issue.id).iter().rev().copied());
        }
        out
    }

    /// All descendants with every child ahead of its parent.
    pub fn descendants_children_first(&self, id: &IssueId) -> Vec<&'a Issue> {
        let mut seen: HashSet<&'a IssueId> = HashSet::new();
        if let Some(root) = self.get(id) {
            seen.insert(&root.id);
        }
        let mut out = Vec::new();
        self.collect_children_first(id, &mut seen, &mut out);
        out
    }

    fn collect_children_first(
        &self,
        id: &IssueId,
        seen: &mut HashSet<&'a IssueId>,
        out: &mut Vec<&'a Issue>,
    ) {
        for child in self.children(id) {
            if seen.insert(&child.id) {
                self.collect_children_first(&child.id, seen, out);
                out.push(child);
            }
        }
    }

    /// Whether the issue and everything below it is done.
    pub fn is_subtree_done(&self, issue: &Issue) -> bool {
        issue.status == IssueStatus::Done
            && self
                .descendants(&issue.id)
                .iter()
                .all(|d| d.status == IssueStatus::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IssueType;

    fn issue(id: &str, parent: Option<&str>) -> Issue {
        let mut issue = Issue::new(IssueId::parse(id).unwrap(), IssueType::Task, id);
        issue.parent = parent.map(|p| IssueId::parse(p).unwrap());
        issue
    }

    fn ids(issues: &[&Issue]) -> Vec<String> {
        issues.iter().map(|i| i.id.to_string()).collect()
    }

    fn sample() -> Vec<Issue> {
        vec![
            issue("P-1-10", Some("P-1")),
            issue("P-1", None),
            issue("P-1-2a", Some("P-1-2")),
            issue("P-1-2", Some("P-1")),
            issue("P-1-2b", Some("P-1-2")),
        ]
    }

    #[test]
    fn test_descendant_orders() {
        let issues = sample();
        let forest = Forest::new(&issues);
        let root = IssueId::parse("P-1").unwrap();

        assert_eq!(
            ids(&forest.descendants(&root)),
            ["P-1-2", "P-1-2a", "P-1-2b", "P-1-10"]
        );
        assert_eq!(
            ids(&forest.descendants_children_first(&root)),
            ["P-1-2a", "P-1-2b", "P-1-2", "P-1-10"]
        );
    }

    #[test]
    fn test_ancestors_stop_at_missing_parent() {
        let issues = vec![issue("P-1-1a", Some("P-1-1")), issue("P-1-1", Some("P-1"))];
        let forest = Forest::new(&issues);
        assert_eq!(ids(&forest.ancestors(&issues[0])), ["P-1-1"]);
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let issues = vec![issue("P-1", Some("P-2")), issue("P-2", Some("P-1"))];
        let forest = Forest::new(&issues);

        assert_eq!(ids(&forest.ancestors(&issues[0])), ["P-2"]);
        assert_eq!(ids(&forest.descendants(&issues[0].id)), ["P-2"]);
        assert_eq!(ids(&forest.descendants_children_first(&issues[0].id)), ["P-2"]);
    }
}

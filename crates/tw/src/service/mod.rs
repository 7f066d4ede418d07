//! Issue service: the only writer of issues and annotations.
//!
//! Every operation reads what it needs from the store, validates, and then
//! writes through a single backend call per issue touched. Hierarchy queries
//! are recomputed from the flat issue list on each call.

mod forest;

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use self::forest::Forest;
use crate::capture::groom::{GroomAction, GroomSummary};
use crate::capture::CaptureEntry;
use crate::domain::{now, validate_title, Annotation, AnnotationType, Issue, IssueStatus, IssueType};
use crate::error::{Error, Result};
use crate::ids::{next_epic_id, next_story_id, next_task_id, IssueId};
use crate::refs::extract_refs;
use crate::storage::IssueStorage;

/// An issue together with everything related to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueContext {
    /// The issue itself
    pub issue: Issue,

    /// Parent first, root last
    pub ancestors: Vec<Issue>,

    /// Other children of the same parent, sorted by id
    pub siblings: Vec<Issue>,

    /// Every issue below this one, depth-first, siblings by id
    pub descendants: Vec<Issue>,

    /// Existing issues named in this issue's body, sorted by id
    pub referenced: Vec<Issue>,

    /// Issues whose body names this one, sorted by id
    pub referencing: Vec<Issue>,
}

/// Business-logic layer over an [`IssueStorage`].
pub struct IssueService {
    storage: Box<dyn IssueStorage>,
    prefix: String,
}

impl fmt::Debug for IssueService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssueService")
            .field("prefix", &self.prefix)
            .field("storage", &"<dyn IssueStorage>")
            .finish()
    }
}

fn sorted(mut issues: Vec<Issue>) -> Vec<Issue> {
    issues.sort_by(|a, b| a.id.cmp(&b.id));
    issues
}

fn owned(issues: &[&Issue]) -> Vec<Issue> {
    issues.iter().copied().cloned().collect()
}

fn require_status(issue: &Issue, from: &[IssueStatus]) -> Result<()> {
    if from.contains(&issue.status) {
        Ok(())
    } else {
        Err(Error::IllegalTransition {
            id: issue.id.clone(),
            status: issue.status,
        })
    }
}

/// Type an issue takes when moved under `parent` without an explicit type.
fn inferred_type(parent: Option<&Issue>) -> IssueType {
    match parent.map(|p| p.issue_type) {
        None => IssueType::Epic,
        Some(IssueType::Epic) => IssueType::Story,
        Some(_) => IssueType::Task,
    }
}

/// Check that an issue of `issue_type` may sit under `parent`.
fn check_placement(issue_type: IssueType, parent: Option<&Issue>) -> Result<()> {
    let Some(parent) = parent else {
        return Ok(());
    };

    if issue_type.is_backlog() || issue_type == IssueType::Epic {
        return Err(Error::Validation(format!(
            "{issue_type} issues cannot have a parent"
        )));
    }
    if parent.is_backlog() {
        return Err(Error::Validation(format!(
            "{} issues cannot have children",
            parent.issue_type
        )));
    }
    if issue_type == IssueType::Story && parent.issue_type != IssueType::Epic {
        return Err(Error::Validation(
            "story issues can only be children of epics".to_string(),
        ));
    }
    Ok(())
}

/// Copy of `issue` under a new id, type and parent.
fn relocated(issue: &Issue, id: IssueId, issue_type: IssueType, parent: Option<IssueId>) -> Issue {
    Issue {
        id,
        issue_type,
        parent,
        updated_at: now(),
        ..issue.clone()
    }
}

impl IssueService {
    /// Wrap a store. New identifiers are allocated under `prefix`.
    pub fn new(storage: Box<dyn IssueStorage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    /// Identifier prefix for new issues.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The underlying store.
    pub fn storage(&self) -> &dyn IssueStorage {
        self.storage.as_ref()
    }

    // ========== Reads ==========

    /// Fetch one issue.
    ///
    /// # Errors
    ///
    /// `Error::IssueNotFound` if no issue has this id.
    pub async fn get_issue(&self, id: &IssueId) -> Result<Issue> {
        self.storage
            .get_issue(id)
            .await?
            .ok_or_else(|| Error::IssueNotFound(id.clone()))
    }

    /// Every issue, sorted by id.
    pub async fn get_all_issues(&self) -> Result<Vec<Issue>> {
        Ok(sorted(self.storage.get_all_issues().await?))
    }

    /// An issue and its direct children, sorted by id.
    pub async fn get_issue_with_children(&self, id: &IssueId) -> Result<(Issue, Vec<Issue>)> {
        let issues = self.storage.get_all_issues().await?;
        let forest = Forest::new(&issues);
        let issue = forest
            .get(id)
            .ok_or_else(|| Error::IssueNotFound(id.clone()))?;
        Ok((issue.clone(), owned(forest.children(id))))
    }

    /// An issue with its ancestors, siblings, descendants and references.
    ///
    /// References to missing issues, or to the issue itself, are dropped.
    pub async fn get_issue_with_context(&self, id: &IssueId) -> Result<IssueContext> {
        let issues = self.storage.get_all_issues().await?;
        let forest = Forest::new(&issues);
        let issue = forest
            .get(id)
            .ok_or_else(|| Error::IssueNotFound(id.clone()))?;

        let siblings = match &issue.parent {
            Some(parent) => forest
                .children(parent)
                .iter()
                .filter(|s| s.id != issue.id)
                .copied()
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        let mut referenced: Vec<Issue> = issue
            .refs
            .iter()
            .filter(|r| **r != issue.id)
            .filter_map(|r| forest.get(r))
            .cloned()
            .collect();
        referenced.sort_by(|a, b| a.id.cmp(&b.id));
        referenced.dedup_by(|a, b| a.id == b.id);

        let referencing = issues
            .iter()
            .filter(|i| i.id != issue.id && i.refs.contains(&issue.id))
            .cloned()
            .collect();

        Ok(IssueContext {
            issue: issue.clone(),
            ancestors: owned(&forest.ancestors(issue)),
            siblings,
            descendants: owned(&forest.descendants(id)),
            referenced,
            referencing: sorted(referencing),
        })
    }

    /// Issues in tree order.
    ///
    /// With `root`, that issue followed by all of its descendants, done or
    /// not. Without, every epic and every parentless story or task whose
    /// subtree is not entirely done, each followed by its descendants. Siblings are ordered by id throughout.
    ///
    /// # Errors
    ///
    /// `Error::IssueNotFound` if `root` names no issue.
    pub async fn get_issue_tree(&self, root: Option<&IssueId>) -> Result<Vec<Issue>> {
        let issues = self.storage.get_all_issues().await?;
        let forest = Forest::new(&issues);

        let roots: Vec<&Issue> = match root {
            Some(id) => vec![forest
                .get(id)
                .ok_or_else(|| Error::IssueNotFound(id.clone()))?],
            None => {
                let mut roots: Vec<&Issue> = issues
                    .iter()
                    .filter(|i| match i.issue_type {
                        IssueType::Epic => !forest.is_subtree_done(i),
                        IssueType::Story => i.parent.is_none() && !forest.is_subtree_done(i),
                        IssueType::Task => i.parent.is_none() && !forest.is_subtree_done(i),
                        IssueType::Bug | IssueType::Idea => false,
                    })
                    .collect();
                roots.sort_by(|a, b| a.id.cmp(&b.id));
                roots
            }
        };

        let mut tree = Vec::new();
        for root in roots {
            tree.push(root.clone());
            tree.extend(owned(&forest.descendants(&root.id)));
        }
        Ok(tree)
    }

    /// Open bugs and ideas (status `new`), sorted by id.
    pub async fn get_backlog_issues(&self) -> Result<Vec<Issue>> {
        let backlog = self
            .storage
            .get_all_issues()
            .await?
            .into_iter()
            .filter(|i| i.is_backlog() && i.status == IssueStatus::New)
            .collect();
        Ok(sorted(backlog))
    }

    /// The tree without backlog types, and the backlog.
    pub async fn get_issue_tree_with_backlog(
        &self,
        root: Option<&IssueId>,
    ) -> Result<(Vec<Issue>, Vec<Issue>)> {
        let backlog = self.get_backlog_issues().await?;
        let mut tree = self.get_issue_tree(root).await?;
        tree.retain(|i| !i.is_backlog());
        Ok((tree, backlog))
    }

    // ========== Creation ==========

    fn allocate(
        &self,
        issue_type: IssueType,
        parent: Option<&IssueId>,
        existing: &[IssueId],
    ) -> Result<IssueId> {
        let id = match issue_type {
            IssueType::Epic | IssueType::Bug | IssueType::Idea => next_epic_id(&self.prefix, existing)?,
            IssueType::Story => next_story_id(&self.prefix, parent, existing)?,
            IssueType::Task => next_task_id(&self.prefix, parent, existing)?,
        };
        debug!(%id, %issue_type, parent = ?parent.map(ToString::to_string), "allocated id");
        Ok(id)
    }

    /// Create a `new` issue and return its id.
    ///
    /// References are extracted from `body`. An empty body is stored as
    /// none.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` for an empty title, a parent on a bug, idea or
    ///   epic, a bug or idea as parent, a story under a non-epic, or when
    ///   no number is left at the new issue's level
    /// - `Error::IssueNotFound` if `parent` names no issue
    pub async fn create_issue(
        &mut self,
        issue_type: IssueType,
        title: &str,
        parent: Option<&IssueId>,
        body: Option<&str>,
    ) -> Result<IssueId> {
        validate_title(title)?;
        if issue_type.is_backlog() && parent.is_some() {
            return Err(Error::Validation(format!(
                "{issue_type} issues cannot have a parent"
            )));
        }

        let parent_issue = match parent {
            Some(id) => Some(self.get_issue(id).await?),
            None => None,
        };
        check_placement(issue_type, parent_issue.as_ref())?;

        let existing = self.storage.get_all_ids(false).await?;
        let id = self.allocate(issue_type, parent, &existing)?;

        let mut issue = Issue::new(id.clone(), issue_type, title);
        issue.parent = parent.cloned();
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            issue.refs = extract_refs(body, &self.prefix);
            issue.body = Some(body.to_string());
        }

        self.storage.save_issue(&issue).await?;
        info!(%id, %issue_type, "created issue");
        Ok(id)
    }

    // ========== Transitions ==========

    async fn load_workable(&self, id: &IssueId, operation: &str) -> Result<Issue> {
        let issue = self.get_issue(id).await?;
        if issue.is_backlog() {
            return Err(Error::Validation(format!(
                "{operation} not supported for {} issues",
                issue.issue_type
            )));
        }
        Ok(issue)
    }

    async fn commit_transition(
        &mut self,
        mut issue: Issue,
        to: IssueStatus,
        kind: AnnotationType,
        message: String,
    ) -> Result<()> {
        let annotation = Annotation::new(kind, message);
        issue.status = to;
        issue.updated_at = annotation.timestamp;
        issue.annotations.push(annotation);

        self.storage.save_issue(&issue).await?;
        info!(id = %issue.id, status = %to, "status changed");
        Ok(())
    }

    /// `new`/`stopped` → `in_progress`.
    pub async fn start_issue(&mut self, id: &IssueId) -> Result<()> {
        let issue = self.load_workable(id, "start").await?;
        require_status(&issue, &[IssueStatus::New, IssueStatus::Stopped])?;
        self.commit_transition(issue, IssueStatus::InProgress, AnnotationType::WorkBegin, String::new())
            .await
    }

    /// Mark an issue done.
    ///
    /// Without `force` the issue must be `in_progress` (bugs and ideas may
    /// also be `new`) and every direct child must be done. `force` skips
    /// both checks.
    ///
    /// # Errors
    ///
    /// `Error::IllegalTransition` or `Error::UndoneChildren`.
    pub async fn done_issue(&mut self, id: &IssueId, force: bool) -> Result<()> {
        let issue = self.get_issue(id).await?;

        if !force {
            let from: &[IssueStatus] = if issue.is_backlog() {
                &[IssueStatus::New, IssueStatus::InProgress]
            } else {
                &[IssueStatus::InProgress]
            };
            require_status(&issue, from)?;

            let mut undone: Vec<IssueId> = self
                .storage
                .get_all_issues()
                .await?
                .into_iter()
                .filter(|i| i.parent.as_ref() == Some(id) && i.status != IssueStatus::Done)
                .map(|i| i.id)
                .collect();
            if !undone.is_empty() {
                undone.sort();
                return Err(Error::UndoneChildren {
                    id: id.clone(),
                    children: undone,
                });
            }
        }

        self.commit_transition(issue, IssueStatus::Done, AnnotationType::WorkEnd, String::new())
            .await
    }

    /// Mark every descendant done, children before parents, then the issue.
    ///
    /// Descendants already done are skipped. Returns the ids closed, in
    /// order. Stops at the first failure; issues closed before it stay done.
    pub async fn done_issue_recursive(&mut self, id: &IssueId, force: bool) -> Result<Vec<IssueId>> {
        let issues = self.storage.get_all_issues().await?;
        let forest = Forest::new(&issues);
        if forest.get(id).is_none() {
            return Err(Error::IssueNotFound(id.clone()));
        }

        let mut closing: Vec<IssueId> = forest
            .descendants_children_first(id)
            .into_iter()
            .filter(|i| i.status != IssueStatus::Done)
            .map(|i| i.id.clone())
            .collect();
        closing.push(id.clone());

        for target in &closing {
            self.done_issue(target, force).await?;
        }
        Ok(closing)
    }

    /// `in_progress` → `blocked`, recording `reason`.
    pub async fn block_issue(&mut self, id: &IssueId, reason: &str) -> Result<()> {
        let issue = self.load_workable(id, "block").await?;
        if reason.trim().is_empty() {
            return Err(Error::Validation("a reason is required to block an issue".to_string()));
        }
        require_status(&issue, &[IssueStatus::InProgress])?;
        self.commit_transition(issue, IssueStatus::Blocked, AnnotationType::Blocked, reason.to_string())
            .await
    }

    /// `blocked` → `in_progress`.
    pub async fn unblock_issue(&mut self, id: &IssueId, message: &str) -> Result<()> {
        let issue = self.load_workable(id, "unblock").await?;
        require_status(&issue, &[IssueStatus::Blocked])?;
        self.commit_transition(issue, IssueStatus::InProgress, AnnotationType::Unblocked, message.to_string())
            .await
    }

    /// `in_progress` → `stopped`, recording a structured summary.
    pub async fn handoff_issue(
        &mut self,
        id: &IssueId,
        status: &str,
        completed: &str,
        remaining: &str,
    ) -> Result<()> {
        let issue = self.load_workable(id, "handoff").await?;
        require_status(&issue, &[IssueStatus::InProgress])?;
        let message = format!("{status}\n\n## Completed\n{completed}\n\n## Remaining\n{remaining}");
        self.commit_transition(issue, IssueStatus::Stopped, AnnotationType::Handoff, message)
            .await
    }

    /// Append a comment, lesson, deviation or commit note.
    ///
    /// Never changes status.
    ///
    /// # Errors
    ///
    /// `Error::Validation` for annotation types owned by transitions,
    /// `Error::IssueNotFound` for an unknown id.
    pub async fn record_annotation(
        &mut self,
        id: &IssueId,
        kind: AnnotationType,
        message: &str,
    ) -> Result<()> {
        if !kind.is_plain() {
            return Err(Error::Validation(format!(
                "{kind} annotations are recorded by status transitions"
            )));
        }

        self.storage
            .add_annotation(id, &Annotation::new(kind, message))
            .await?;
        info!(%id, %kind, "recorded annotation");
        Ok(())
    }

    // ========== Edits ==========

    /// Replace the title and/or body.
    ///
    /// An empty `body` clears the body and its references.
    pub async fn update_issue(
        &mut self,
        id: &IssueId,
        title: Option<&str>,
        body: Option<&str>,
    ) -> Result<()> {
        let mut issue = self.get_issue(id).await?;

        if let Some(title) = title {
            validate_title(title)?;
            issue.title = title.to_string();
        }
        match body {
            Some("") => {
                issue.body = None;
                issue.refs.clear();
            }
            Some(body) => {
                issue.refs = extract_refs(body, &self.prefix);
                issue.body = Some(body.to_string());
            }
            None => {}
        }
        issue.updated_at = now();

        self.storage.save_issue(&issue).await?;
        info!(%id, "updated issue");
        Ok(())
    }

    /// Delete a childless issue.
    ///
    /// # Errors
    ///
    /// `Error::HasChildren` naming every direct child.
    pub async fn delete_issue(&mut self, id: &IssueId) -> Result<()> {
        let (_, children) = self.get_issue_with_children(id).await?;
        if !children.is_empty() {
            return Err(Error::HasChildren {
                id: id.clone(),
                children: children.into_iter().map(|c| c.id).collect(),
            });
        }

        self.storage.delete_issue(id).await?;
        info!(%id, "deleted issue");
        Ok(())
    }

    /// Validate a move target for `id` and load it.
    async fn load_new_parent(&self, id: &IssueId, new_parent: Option<&IssueId>) -> Result<Option<Issue>> {
        let Some(parent_id) = new_parent else {
            return Ok(None);
        };
        if parent_id == id {
            return Err(Error::Validation(format!("cannot move {id} under itself")));
        }

        let issues = self.storage.get_all_issues().await?;
        let forest = Forest::new(&issues);
        let parent = forest
            .get(parent_id)
            .ok_or_else(|| Error::IssueNotFound(parent_id.clone()))?;

        if parent.is_backlog() {
            return Err(Error::Validation(format!(
                "{} issues cannot have children",
                parent.issue_type
            )));
        }
        if forest.ancestors(parent).iter().any(|a| a.id == *id) {
            return Err(Error::Validation(format!(
                "cannot move {id} under its own descendant {parent_id}"
            )));
        }
        Ok(Some(parent.clone()))
    }

    /// Copy `issue` and its whole subtree to fresh ids, then delete the
    /// originals. Returns the new id of `issue`.
    ///
    /// Children become stories under an epic and tasks under anything else.
    async fn move_subtree(
        &mut self,
        issue: &Issue,
        issue_type: IssueType,
        parent: Option<&Issue>,
    ) -> Result<IssueId> {
        let issues = self.storage.get_all_issues().await?;
        let forest = Forest::new(&issues);
        if issue_type.is_backlog() && !forest.children(&issue.id).is_empty() {
            return Err(Error::Validation(format!(
                "{issue_type} issues cannot have children"
            )));
        }

        let mut existing = self.storage.get_all_ids(false).await?;
        let parent_id = parent.map(|p| p.id.clone());
        let root_id = self.allocate(issue_type, parent_id.as_ref(), &existing)?;
        existing.push(root_id.clone());

        let mut copies = vec![relocated(issue, root_id.clone(), issue_type, parent_id)];
        let mut originals = vec![issue.id.clone()];
        let mut seen: HashSet<&IssueId> = HashSet::from([&issue.id]);
        let mut queue: VecDeque<(&Issue, usize)> = forest
            .children(&issue.id)
            .iter()
            .map(|child| (*child, 0))
            .collect();

        while let Some((child, parent_index)) = queue.pop_front() {
            if !seen.insert(&child.id) {
                continue;
            }
            let new_parent = &copies[parent_index];
            let child_type = inferred_type(Some(new_parent));
            let new_parent_id = new_parent.id.clone();
            let new_id = self.allocate(child_type, Some(&new_parent_id), &existing)?;
            existing.push(new_id.clone());

            copies.push(relocated(child, new_id, child_type, Some(new_parent_id)));
            originals.push(child.id.clone());
            let index = copies.len() - 1;
            queue.extend(forest.children(&child.id).iter().map(|c| (*c, index)));
        }

        for copy in &copies {
            self.storage.save_issue(copy).await?;
        }
        for old in originals.iter().rev() {
            self.storage.delete_issue(old).await?;
        }

        Ok(root_id)
    }

    /// Move a hierarchy issue, and everything below it, under `new_parent`.
    ///
    /// The moved issue gets a fresh id and becomes an epic without a parent,
    /// a story under an epic, or a task otherwise. Title, status, body,
    /// references, annotations and creation time carry over.
    ///
    /// # Errors
    ///
    /// `Error::Validation` for bugs and ideas (use [`promote_issue`]), for
    /// moving under itself or its own descendant, or under a bug or idea.
    ///
    /// [`promote_issue`]: IssueService::promote_issue
    pub async fn reparent_issue(&mut self, id: &IssueId, new_parent: Option<&IssueId>) -> Result<IssueId> {
        let issue = self.get_issue(id).await?;
        if issue.is_backlog() {
            return Err(Error::Validation(format!(
                "cannot reparent {} issues; use promote instead",
                issue.issue_type
            )));
        }

        let parent = self.load_new_parent(id, new_parent).await?;
        let new_id = self
            .move_subtree(&issue, inferred_type(parent.as_ref()), parent.as_ref())
            .await?;
        info!(from = %id, to = %new_id, "reparented issue");
        Ok(new_id)
    }

    /// Turn an issue, typically a bug or idea, into `target_type` under
    /// `new_parent`.
    ///
    /// Without `target_type` the type is inferred as for
    /// [`reparent_issue`](IssueService::reparent_issue).
    ///
    /// # Errors
    ///
    /// `Error::Validation` when the target type may not sit under the new
    /// parent (epics and backlog types take none, stories need an epic).
    pub async fn promote_issue(
        &mut self,
        id: &IssueId,
        target_type: Option<IssueType>,
        new_parent: Option<&IssueId>,
    ) -> Result<IssueId> {
        let issue = self.get_issue(id).await?;
        let parent = self.load_new_parent(id, new_parent).await?;

        let issue_type = match target_type {
            Some(issue_type) => {
                check_placement(issue_type, parent.as_ref())?;
                issue_type
            }
            None => inferred_type(parent.as_ref()),
        };

        let new_id = self.move_subtree(&issue, issue_type, parent.as_ref()).await?;
        info!(from = %id, to = %new_id, %issue_type, "promoted issue");
        Ok(new_id)
    }

    // ========== Bulk ==========

    async fn create_entry(
        &mut self,
        entry: &CaptureEntry,
        by_title: &mut HashMap<String, IssueId>,
    ) -> Result<IssueId> {
        let parent = entry
            .parent_title
            .as_ref()
            .and_then(|title| by_title.get(title))
            .cloned();
        let id = self
            .create_issue(entry.issue_type, &entry.title, parent.as_ref(), entry.body.as_deref())
            .await?;
        by_title.insert(entry.title.clone(), id.clone());
        Ok(id)
    }

    /// Create parsed capture entries in order.
    ///
    /// A `parent_title` resolves against entries created earlier in the same
    /// call; an unresolved one leaves the entry parentless. Stops at the
    /// first failure; entries created before it remain.
    pub async fn apply_capture(&mut self, entries: &[CaptureEntry]) -> Result<Vec<(IssueId, String)>> {
        let mut by_title = HashMap::new();
        let mut created = Vec::with_capacity(entries.len());

        for entry in entries {
            let id = self.create_entry(entry, &mut by_title).await?;
            created.push((id, entry.title.clone()));
        }
        Ok(created)
    }

    /// Carry out a groom diff: resolve, create, or leave items as they are.
    pub async fn apply_groom(&mut self, actions: &[GroomAction]) -> Result<GroomSummary> {
        let mut by_title = HashMap::new();
        let mut summary = GroomSummary::default();

        for action in actions {
            match action {
                GroomAction::Resolve(id) => {
                    self.done_issue(id, false).await?;
                    summary.resolved.push(id.clone());
                }
                GroomAction::Create(entry) => {
                    let id = self.create_entry(entry, &mut by_title).await?;
                    summary.created.push(id);
                }
                GroomAction::Unchanged(id) => summary.unchanged.push(id.clone()),
            }
        }

        info!(
            resolved = summary.resolved.len(),
            created = summary.created.len(),
            unchanged = summary.unchanged.len(),
            "groomed backlog"
        );
        Ok(summary)
    }
}

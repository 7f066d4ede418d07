//! TaskWarrior storage backend.
//!
//! Every call round-trips through the `task` CLI: reads run
//! `task project:<p> export` and decode the JSON array, writes build full
//! task records and pipe them into `task import`. Deletes go through
//! `task <uuid> delete`, which leaves a `deleted` tombstone behind.
//!
//! ## Module Structure
//!
//! - `codec` - Issue ⇄ task record translation
//! - `runner` - `TaskRunner` seam and the real CLI runner
//! - `fake` - In-process runner for tests

mod codec;
mod runner;

#[cfg(any(test, feature = "test-util"))]
mod fake;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use self::codec::{decode, encode, encode_annotation, TaskRecord};
use super::{IssueStorage, WatchTarget};
use crate::config::expand_home;
use crate::domain::{format_timestamp, Annotation, Issue};
use crate::error::{Error, Result};
use crate::ids::{sort_ids, IssueId};

pub use runner::{TaskCli, TaskRunner};

#[cfg(any(test, feature = "test-util"))]
pub use fake::FakeTaskWarrior;

const QUIET: [&str; 2] = ["rc.confirmation=off", "rc.verbose=nothing"];

/// Issue store backed by a TaskWarrior project.
pub struct TaskWarriorStorage {
    runner: Arc<dyn TaskRunner>,
    project: String,
}

impl fmt::Debug for TaskWarriorStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskWarriorStorage")
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

impl TaskWarriorStorage {
    /// Use the `task` binary on `PATH`.
    pub fn with_cli(project: impl Into<String>) -> Self {
        Self::with_runner(Arc::new(TaskCli::new()), project)
    }

    /// Use an arbitrary runner, e.g. [`FakeTaskWarrior`] in tests.
    pub fn with_runner(runner: Arc<dyn TaskRunner>, project: impl Into<String>) -> Self {
        Self {
            runner,
            project: project.into(),
        }
    }

    /// The TaskWarrior project this store is scoped to.
    pub fn project(&self) -> &str {
        &self.project
    }

    async fn run(&self, args: Vec<String>, stdin: Option<&str>) -> Result<String> {
        self.runner.run(&args, stdin).await
    }

    /// Every record in the project, tombstones included.
    async fn export(&self) -> Result<Vec<TaskRecord>> {
        let mut args: Vec<String> = QUIET.iter().map(ToString::to_string).collect();
        args.push(format!("project:{}", self.project));
        args.push("export".to_string());

        let out = self.run(args, None).await?;
        if out.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&out)?)
    }

    async fn import(&self, records: &[TaskRecord]) -> Result<()> {
        let mut args: Vec<String> = QUIET.iter().map(ToString::to_string).collect();
        args.push("import".to_string());

        let payload = serde_json::to_string(records)?;
        self.run(args, Some(&payload)).await?;
        Ok(())
    }
}

/// The live record carrying `id`, ignoring tombstones.
fn find_live<'a>(records: &'a [TaskRecord], id: &IssueId) -> Option<&'a TaskRecord> {
    let wanted = id.to_string();
    records
        .iter()
        .find(|r| !r.is_deleted() && r.tw_id.as_deref() == Some(wanted.as_str()))
}

/// Decode a record, logging and skipping malformed tw-managed ones.
fn decode_or_skip(record: &TaskRecord) -> Option<Issue> {
    match decode(record) {
        Ok(issue) => issue,
        Err(e) => {
            warn!(uuid = %record.uuid, error = %e, "skipping malformed task record");
            None
        }
    }
}

#[async_trait]
impl IssueStorage for TaskWarriorStorage {
    async fn get_issue(&self, id: &IssueId) -> Result<Option<Issue>> {
        let records = self.export().await?;
        Ok(find_live(&records, id).and_then(decode_or_skip))
    }

    async fn get_all_issues(&self) -> Result<Vec<Issue>> {
        let records = self.export().await?;
        Ok(records
            .iter()
            .filter(|r| !r.is_deleted())
            .filter_map(decode_or_skip)
            .collect())
    }

    async fn get_all_ids(&self, include_deleted: bool) -> Result<Vec<IssueId>> {
        let records = self.export().await?;
        let mut ids: Vec<IssueId> = records
            .iter()
            .filter(|r| include_deleted || !r.is_deleted())
            .filter_map(|r| r.tw_id.as_deref())
            .filter_map(|raw| IssueId::parse(raw).ok())
            .collect();
        sort_ids(&mut ids);
        ids.dedup();
        Ok(ids)
    }

    async fn save_issue(&mut self, issue: &Issue) -> Result<()> {
        let records = self.export().await?;
        let existing = find_live(&records, &issue.id);

        let uuid = existing.map_or_else(|| self.generate_uuid(), |r| r.uuid.clone());
        let mut record = encode(issue, &uuid, &self.project);

        if let Some(existing) = existing {
            let durable = existing.annotations.len();
            let mut merged = existing.annotations.clone();
            merged.extend(record.annotations.into_iter().skip(durable));
            record.annotations = merged;
        }

        self.import(&[record]).await?;
        tracing::debug!(id = %issue.id, %uuid, "saved issue");
        Ok(())
    }

    async fn add_annotation(&mut self, id: &IssueId, annotation: &Annotation) -> Result<()> {
        let records = self.export().await?;
        let mut record = find_live(&records, id)
            .cloned()
            .ok_or_else(|| Error::IssueNotFound(id.clone()))?;

        record.annotations.push(encode_annotation(annotation));
        record.modified = Some(format_timestamp(&annotation.timestamp));
        self.import(&[record]).await
    }

    async fn delete_issue(&mut self, id: &IssueId) -> Result<()> {
        let records = self.export().await?;
        let uuid = find_live(&records, id)
            .map(|r| r.uuid.clone())
            .ok_or_else(|| Error::IssueNotFound(id.clone()))?;

        let args = vec![
            QUIET[0].to_string(),
            uuid.clone(),
            "delete".to_string(),
        ];
        self.run(args, None).await?;
        tracing::debug!(%id, %uuid, "deleted task");
        Ok(())
    }

    async fn watch_target(&self) -> Result<Option<WatchTarget>> {
        let args = vec![
            QUIET[0].to_string(),
            "_get".to_string(),
            "rc.data.location".to_string(),
        ];
        let out = self.run(args, None).await?;
        let location = out.trim();
        if location.is_empty() {
            return Ok(None);
        }

        Ok(Some(WatchTarget {
            dir: expand_home(location),
            extensions: vec!["data".to_string()],
        }))
    }
}

//! In-process stand-in for the `task` binary.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::codec::{TaskRecord, DELETED};
use super::runner::TaskRunner;
use crate::error::{Error, Result};

/// Fake TaskWarrior that keeps tasks in memory.
///
/// It understands exactly the command lines the adapter issues:
///
/// - `... project:<p> export` prints the JSON array of that project's tasks,
///   tombstones included
/// - `... import` reads a JSON array from stdin and upserts by `uuid`
/// - `... <uuid> delete` marks the task `deleted`
/// - `... _get rc.data.location` prints the configured data directory
///
/// Clones share state, so a test can keep one handle for inspection and
/// hand another to the storage under test.
///
/// # Availability
///
/// This type is available when:
/// - Running tests (`#[cfg(test)]`)
/// - The `test-util` feature is enabled
#[derive(Debug, Clone, Default)]
pub struct FakeTaskWarrior {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Debug, Default)]
struct FakeState {
    tasks: Vec<TaskRecord>,
    commands: Vec<Vec<String>>,
    data_dir: Option<PathBuf>,
    fail_next: Option<String>,
}

impl FakeTaskWarrior {
    /// Empty fake with no data directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `dir` from `_get rc.data.location`.
    pub fn with_data_dir(self, dir: impl Into<PathBuf>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.data_dir = Some(dir.into());
        }
        self
    }

    /// Make the next command fail with `stderr`.
    pub fn fail_next(&self, stderr: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next = Some(stderr.into());
        }
    }

    /// Every command line received so far, oldest first.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state
            .lock()
            .map(|state| state.commands.clone())
            .unwrap_or_default()
    }

    /// Number of stored tasks, tombstones included.
    pub fn task_count(&self) -> usize {
        self.state.lock().map(|state| state.tasks.len()).unwrap_or(0)
    }

    /// Number of tasks marked deleted.
    pub fn deleted_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.tasks.iter().filter(|t| t.is_deleted()).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, FakeState>> {
        self.state
            .lock()
            .map_err(|e| Error::Internal(format!("fake taskwarrior state poisoned: {e}")))
    }
}

impl FakeState {
    fn export(&self, args: &[String]) -> Result<String> {
        let project = args.iter().find_map(|a| a.strip_prefix("project:"));
        let matching: Vec<&TaskRecord> = self
            .tasks
            .iter()
            .filter(|t| project.is_none() || t.project.as_deref() == project)
            .collect();
        Ok(serde_json::to_string(&matching)?)
    }

    fn import(&mut self, stdin: Option<&str>) -> Result<String> {
        let input = stdin.ok_or_else(|| Error::Backend("import: no input".to_string()))?;
        let records: Vec<TaskRecord> = serde_json::from_str(input)?;
        for record in records {
            match self.tasks.iter_mut().find(|t| t.uuid == record.uuid) {
                Some(existing) => *existing = record,
                None => self.tasks.push(record),
            }
        }
        Ok(String::new())
    }

    fn delete(&mut self, args: &[String]) -> Result<String> {
        let position = args.iter().position(|a| a == "delete").unwrap_or(0);
        let uuid = position
            .checked_sub(1)
            .and_then(|i| args.get(i))
            .ok_or_else(|| Error::Backend("delete: no task given".to_string()))?;
        let task = self
            .tasks
            .iter_mut()
            .find(|t| &t.uuid == uuid && !t.is_deleted())
            .ok_or_else(|| Error::Backend(format!("No tasks specified for {uuid}.")))?;
        task.status = DELETED.to_string();
        Ok(String::new())
    }
}

#[async_trait]
impl TaskRunner for FakeTaskWarrior {
    async fn run(&self, args: &[String], stdin: Option<&str>) -> Result<String> {
        let mut state = self.lock()?;
        state.commands.push(args.to_vec());

        if let Some(stderr) = state.fail_next.take() {
            return Err(Error::Backend(stderr));
        }

        let has = |word: &str| args.iter().any(|a| a == word);
        if has("export") {
            state.export(args)
        } else if has("import") {
            state.import(stdin)
        } else if has("delete") {
            state.delete(args)
        } else if has("_get") {
            state
                .data_dir
                .as_ref()
                .map(|dir| format!("{}\n", dir.display()))
                .ok_or_else(|| Error::Backend("rc.data.location not configured".to_string()))
        } else {
            Err(Error::Backend(format!(
                "unsupported fake command: {}",
                args.join(" ")
            )))
        }
    }
}

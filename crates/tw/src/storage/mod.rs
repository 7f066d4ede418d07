//! Storage abstraction layer for tw.
//!
//! This module provides the core storage trait and factory for creating
//! storage backends. Two implementations share one contract:
//!
//! - **SQLite**: embedded relational store, one immediate transaction per
//!   mutating call
//! - **TaskWarrior**: adapter over the `task` CLI, exporting and importing
//!   JSON records with tw fields carried as user-defined attributes
//!
//! Both must round-trip an [`Issue`] unchanged, including annotation order
//! and body text. The shared `contract_tests` suite runs against each of them.
//!
//! # Deleted identifiers
//!
//! Neither backend reserves the identifier of a deleted issue. The service
//! allocates from [`IssueStorage::get_all_ids`] with `include_deleted = false`,
//! so deleting the highest-numbered issue frees its slot for the next create.
//!
//! # Example
//!
//! ```no_run
//! use tw::storage::{create_storage, StorageBackend};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = create_storage(StorageBackend::Sqlite("tw.db".into())).await?;
//!     let issues = storage.get_all_issues().await?;
//!     println!("{} issues", issues.len());
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::{Annotation, Issue};
use crate::error::Result;
use crate::ids::IssueId;

pub mod sqlite;
pub mod taskwarrior;

#[cfg(test)]
mod contract_tests;

pub use sqlite::SqliteStorage;
pub use taskwarrior::TaskWarriorStorage;

#[cfg(any(test, feature = "test-util"))]
pub use taskwarrior::FakeTaskWarrior;

/// Core storage trait for issue persistence.
///
/// # Annotation semantics
///
/// Annotations already stored for an issue form a prefix of
/// [`Issue::annotations`]. On update, [`save_issue`](IssueStorage::save_issue)
/// appends only the entries beyond that prefix and never removes any.
///
/// # Errors
///
/// Backend failures surface as `Error::Database`, `Error::Backend`,
/// `Error::Json` or `Error::Io` with the backend's own diagnostic text.
/// Operations addressing a missing issue return `Error::IssueNotFound`.
#[async_trait]
pub trait IssueStorage: Send + Sync {
    // ========== Reads ==========

    /// Get an issue by ID.
    ///
    /// Returns `None` if the issue doesn't exist.
    async fn get_issue(&self, id: &IssueId) -> Result<Option<Issue>>;

    /// Every live issue, in no particular order.
    async fn get_all_issues(&self) -> Result<Vec<Issue>>;

    /// Every identifier in the store.
    ///
    /// With `include_deleted`, backends that keep tombstones report those
    /// identifiers too.
    async fn get_all_ids(&self, include_deleted: bool) -> Result<Vec<IssueId>>;

    // ========== Writes ==========

    /// Insert or update an issue.
    ///
    /// On update, annotations already durable are kept and only newly
    /// attached ones are appended.
    async fn save_issue(&mut self, issue: &Issue) -> Result<()>;

    /// Append one annotation and advance the issue's `updated_at` to its
    /// timestamp.
    ///
    /// # Errors
    ///
    /// `Error::IssueNotFound` if the issue doesn't exist.
    async fn add_annotation(&mut self, id: &IssueId, annotation: &Annotation) -> Result<()>;

    /// Delete an issue and its annotations.
    ///
    /// Callers must check for children first.
    ///
    /// # Errors
    ///
    /// `Error::IssueNotFound` if the issue doesn't exist.
    async fn delete_issue(&mut self, id: &IssueId) -> Result<()>;

    // ========== Misc ==========

    /// A fresh random UUID for a new record.
    fn generate_uuid(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Where on disk this backend's data lives, for change detection.
    ///
    /// Returns `None` when the backend has nothing to watch.
    async fn watch_target(&self) -> Result<Option<WatchTarget>> {
        Ok(None)
    }
}

/// A directory to observe and the file extensions inside it that signal a
/// store modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    /// Directory to observe (non-recursively)
    pub dir: PathBuf,

    /// Extensions (without the dot) of files whose changes count
    pub extensions: Vec<String>,
}

impl WatchTarget {
    /// Whether a change to `path` should trigger a refresh.
    pub fn matches(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|want| want == ext))
    }
}

/// Storage backend configuration.
///
/// Determines which storage implementation to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// SQLite database file
    Sqlite(PathBuf),

    /// TaskWarrior via the `task` binary, scoped to one project
    TaskWarrior {
        /// TaskWarrior `project:` value
        project: String,
    },
}

/// Create a storage instance for the given backend.
///
/// This factory function returns a trait object that can be used
/// polymorphically regardless of the backend implementation.
///
/// # Errors
///
/// - `Error::Io` if the database directory cannot be created
/// - `Error::Database` if the SQLite schema cannot be applied
pub async fn create_storage(backend: StorageBackend) -> Result<Box<dyn IssueStorage>> {
    match backend {
        StorageBackend::Sqlite(path) => {
            tracing::debug!(path = %path.display(), "opening sqlite store");
            Ok(Box::new(SqliteStorage::open(&path)?))
        }
        StorageBackend::TaskWarrior { project } => {
            tracing::debug!(%project, "using taskwarrior store");
            Ok(Box::new(TaskWarriorStorage::with_cli(project)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_sqlite_storage_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("nested").join("tw.db");

        let storage = create_storage(StorageBackend::Sqlite(db.clone())).await.unwrap();
        assert!(storage.get_all_issues().await.unwrap().is_empty());
        assert!(db.exists());
    }

    #[test]
    fn test_generate_uuid_is_unique() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let a = storage.generate_uuid();
        let b = storage.generate_uuid();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_watch_target_matches_extensions() {
        let target = WatchTarget {
            dir: PathBuf::from("/tmp"),
            extensions: vec!["db".into(), "db-wal".into()],
        };
        assert!(target.matches(Path::new("/tmp/tw.db")));
        assert!(target.matches(Path::new("/tmp/tw.db-wal")));
        assert!(!target.matches(Path::new("/tmp/tw.db-shm")));
        assert!(!target.matches(Path::new("/tmp/notes")));
    }
}

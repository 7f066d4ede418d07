//! SQLite storage backend.
//!
//! ## Module Structure
//!
//! - `schema` - Database schema (DDL)
//! - `helpers` - Row conversion and parsing utilities
//!
//! Every mutating call runs inside one `BEGIN IMMEDIATE` transaction, so a
//! failed save leaves the previous state untouched.

mod helpers;
mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use self::helpers::{row_to_annotation, row_to_issue, ANNOTATION_COLUMNS, ISSUE_COLUMNS};
use self::schema::SCHEMA;
use super::{IssueStorage, WatchTarget};
use crate::domain::{format_timestamp, Annotation, Issue};
use crate::error::{Error, Result};
use crate::ids::IssueId;

/// `SQLite`-backed issue store.
///
/// The connection is wrapped in a `Mutex` so the store is `Sync`; tw is a
/// single-process, single-writer tool, so the lock is never contended in
/// practice.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStorage {
    /// Open or create the database at `path`.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// `Error::Io` if the directory cannot be created, `Error::Database` if
    /// the file cannot be opened or the schema cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database, mainly for tests.
    ///
    /// # Errors
    ///
    /// `Error::Database` if the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// The database file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Acquire the connection lock.
    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            Error::Internal(format!(
                "database connection mutex poisoned (a thread panicked while holding the lock): {e}"
            ))
        })
    }

    /// Run `f` inside an immediate transaction, committing only on success.
    fn mutate<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R>,
    {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

// ========== Row-level helpers ==========

fn find_rowid(conn: &Connection, id: &IssueId) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM issues WHERE tw_id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

fn insert_annotation(conn: &Connection, rowid: i64, annotation: &Annotation) -> Result<()> {
    conn.execute(
        "INSERT INTO annotations (issue_id, type, timestamp, message) VALUES (?1, ?2, ?3, ?4)",
        params![
            rowid,
            annotation.kind.as_str(),
            format_timestamp(&annotation.timestamp),
            annotation.message,
        ],
    )?;
    Ok(())
}

fn replace_refs(conn: &Connection, rowid: i64, refs: &[IssueId]) -> Result<()> {
    conn.execute("DELETE FROM issue_refs WHERE source_issue_id = ?1", params![rowid])?;
    let mut stmt = conn.prepare(
        "INSERT INTO issue_refs (source_issue_id, position, target_tw_id) VALUES (?1, ?2, ?3)",
    )?;
    for (position, target) in (0_i64..).zip(refs) {
        stmt.execute(params![rowid, position, target.to_string()])?;
    }
    Ok(())
}

fn annotation_count(conn: &Connection, rowid: i64) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM annotations WHERE issue_id = ?1",
        params![rowid],
        |row| row.get(0),
    )?;
    usize::try_from(count).map_err(|e| Error::Internal(format!("annotation count {count}: {e}")))
}

/// Load annotations for the given rowid, or for every issue when `None`.
fn load_annotations(conn: &Connection, rowid: Option<i64>) -> Result<HashMap<i64, Vec<Annotation>>> {
    let sql = format!(
        "SELECT {ANNOTATION_COLUMNS} FROM annotations \
         WHERE ?1 IS NULL OR issue_id = ?1 ORDER BY issue_id, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![rowid], row_to_annotation)?;

    let mut by_issue: HashMap<i64, Vec<Annotation>> = HashMap::new();
    for row in rows {
        let (issue_id, annotation) = row?;
        by_issue.entry(issue_id).or_default().push(annotation);
    }
    Ok(by_issue)
}

/// Load refs for the given rowid, or for every issue when `None`.
fn load_refs(conn: &Connection, rowid: Option<i64>) -> Result<HashMap<i64, Vec<IssueId>>> {
    let mut stmt = conn.prepare(
        "SELECT source_issue_id, target_tw_id FROM issue_refs \
         WHERE ?1 IS NULL OR source_issue_id = ?1 ORDER BY source_issue_id, position",
    )?;
    let rows = stmt.query_map(params![rowid], |row| {
        let source: i64 = row.get(0)?;
        let target: String = row.get(1)?;
        Ok((source, helpers::parse_issue_id(1, &target)?))
    })?;

    let mut by_issue: HashMap<i64, Vec<IssueId>> = HashMap::new();
    for row in rows {
        let (source, target) = row?;
        by_issue.entry(source).or_default().push(target);
    }
    Ok(by_issue)
}

#[async_trait]
impl IssueStorage for SqliteStorage {
    async fn get_issue(&self, id: &IssueId) -> Result<Option<Issue>> {
        let conn = self.connection()?;
        let found = conn
            .query_row(
                &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE tw_id = ?1"),
                params![id.to_string()],
                row_to_issue,
            )
            .optional()?;

        let Some((rowid, mut issue)) = found else {
            return Ok(None);
        };
        issue.annotations = load_annotations(&conn, Some(rowid))?
            .remove(&rowid)
            .unwrap_or_default();
        issue.refs = load_refs(&conn, Some(rowid))?
            .remove(&rowid)
            .unwrap_or_default();
        Ok(Some(issue))
    }

    async fn get_all_issues(&self) -> Result<Vec<Issue>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!("SELECT {ISSUE_COLUMNS} FROM issues ORDER BY id"))?;
        let rows = stmt
            .query_map([], row_to_issue)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut annotations = load_annotations(&conn, None)?;
        let mut refs = load_refs(&conn, None)?;

        Ok(rows
            .into_iter()
            .map(|(rowid, mut issue)| {
                issue.annotations = annotations.remove(&rowid).unwrap_or_default();
                issue.refs = refs.remove(&rowid).unwrap_or_default();
                issue
            })
            .collect())
    }

    async fn get_all_ids(&self, _include_deleted: bool) -> Result<Vec<IssueId>> {
        // Deletes are physical here, so there are no tombstones to include.
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT tw_id FROM issues")?;
        let ids = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                helpers::parse_issue_id(0, &id)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    async fn save_issue(&mut self, issue: &Issue) -> Result<()> {
        let uuid = self.generate_uuid();

        self.mutate(|tx| {
            let parent = issue.parent.as_ref().map(ToString::to_string);
            let created_at = format_timestamp(&issue.created_at);
            let updated_at = format_timestamp(&issue.updated_at);

            let (rowid, durable) = match find_rowid(tx, &issue.id)? {
                Some(rowid) => {
                    tx.execute(
                        "UPDATE issues SET tw_type = ?1, title = ?2, tw_status = ?3, \
                         tw_parent = ?4, tw_body = ?5, created_at = ?6, updated_at = ?7 \
                         WHERE id = ?8",
                        params![
                            issue.issue_type.as_str(),
                            issue.title,
                            issue.status.as_str(),
                            parent,
                            issue.body,
                            created_at,
                            updated_at,
                            rowid,
                        ],
                    )?;
                    (rowid, annotation_count(tx, rowid)?)
                }
                None => {
                    tx.execute(
                        "INSERT INTO issues (uuid, tw_id, tw_type, title, tw_status, \
                         tw_parent, tw_body, created_at, updated_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        params![
                            uuid,
                            issue.id.to_string(),
                            issue.issue_type.as_str(),
                            issue.title,
                            issue.status.as_str(),
                            parent,
                            issue.body,
                            created_at,
                            updated_at,
                        ],
                    )?;
                    (tx.last_insert_rowid(), 0)
                }
            };

            for annotation in issue.annotations.iter().skip(durable) {
                insert_annotation(tx, rowid, annotation)?;
            }
            replace_refs(tx, rowid, &issue.refs)?;
            Ok(())
        })?;

        tracing::debug!(id = %issue.id, "saved issue");
        Ok(())
    }

    async fn add_annotation(&mut self, id: &IssueId, annotation: &Annotation) -> Result<()> {
        self.mutate(|tx| {
            let rowid = find_rowid(tx, id)?.ok_or_else(|| Error::IssueNotFound(id.clone()))?;
            insert_annotation(tx, rowid, annotation)?;
            tx.execute(
                "UPDATE issues SET updated_at = ?1 WHERE id = ?2",
                params![format_timestamp(&annotation.timestamp), rowid],
            )?;
            Ok(())
        })
    }

    async fn delete_issue(&mut self, id: &IssueId) -> Result<()> {
        self.mutate(|tx| {
            let deleted = tx.execute("DELETE FROM issues WHERE tw_id = ?1", params![id.to_string()])?;
            if deleted == 0 {
                return Err(Error::IssueNotFound(id.clone()));
            }
            Ok(())
        })
    }

    async fn watch_target(&self) -> Result<Option<WatchTarget>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("db")
            .to_string();

        Ok(Some(WatchTarget {
            dir,
            extensions: vec![format!("{ext}-wal"), ext],
        }))
    }
}

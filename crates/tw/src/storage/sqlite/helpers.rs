//! Helper functions for database row conversion and parsing.
//!
//! These utilities convert between database representations and domain types.
//! Unknown enum text or malformed ids surface as
//! `FromSqlConversionFailure`, which usually means the file was written by a
//! newer version or edited by hand.

use chrono::{DateTime, Utc};
use rusqlite::Row;

use crate::domain::{
    parse_timestamp, Annotation, AnnotationType, Issue, IssueStatus, IssueType,
};
use crate::ids::IssueId;

/// SQL column list for the issues table.
///
/// Use with `row_to_issue` for consistent column ordering.
pub(crate) const ISSUE_COLUMNS: &str =
    "id, tw_id, tw_type, title, tw_status, tw_parent, tw_body, created_at, updated_at";

/// SQL column list for the annotations table.
///
/// Use with `row_to_annotation` for consistent column ordering.
pub(crate) const ANNOTATION_COLUMNS: &str = "issue_id, type, timestamp, message";

fn conversion_failure(column: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("Unknown {what} '{value}' in database. Database may be corrupted or from a newer version.").into(),
    )
}

/// Parse an issue id column.
pub(crate) fn parse_issue_id(column: usize, s: &str) -> rusqlite::Result<IssueId> {
    IssueId::parse(s).map_err(|_| conversion_failure(column, "issue id", s))
}

/// Parse an issue type column.
pub(crate) fn parse_issue_type(column: usize, s: &str) -> rusqlite::Result<IssueType> {
    s.parse().map_err(|_| conversion_failure(column, "issue type", s))
}

/// Parse an issue status column.
pub(crate) fn parse_issue_status(column: usize, s: &str) -> rusqlite::Result<IssueStatus> {
    s.parse().map_err(|_| conversion_failure(column, "issue status", s))
}

/// Parse an annotation type column.
pub(crate) fn parse_annotation_type(column: usize, s: &str) -> rusqlite::Result<AnnotationType> {
    s.parse().map_err(|_| conversion_failure(column, "annotation type", s))
}

/// Parse a `YYYYMMDDThhmmssZ` timestamp column.
pub(crate) fn parse_db_timestamp(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    parse_timestamp(s).map_err(|_| conversion_failure(column, "timestamp", s))
}

/// Convert a row selected with [`ISSUE_COLUMNS`] into its rowid and an
/// issue with empty `refs` and `annotations`.
pub(crate) fn row_to_issue(row: &Row<'_>) -> rusqlite::Result<(i64, Issue)> {
    let rowid: i64 = row.get(0)?;
    let id: String = row.get(1)?;
    let issue_type: String = row.get(2)?;
    let status: String = row.get(4)?;
    let parent: Option<String> = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    let issue = Issue {
        id: parse_issue_id(1, &id)?,
        issue_type: parse_issue_type(2, &issue_type)?,
        title: row.get(3)?,
        status: parse_issue_status(4, &status)?,
        parent: parent.as_deref().map(|p| parse_issue_id(5, p)).transpose()?,
        body: row.get(6)?,
        refs: Vec::new(),
        created_at: parse_db_timestamp(7, &created_at)?,
        updated_at: parse_db_timestamp(8, &updated_at)?,
        annotations: Vec::new(),
    };
    Ok((rowid, issue))
}

/// Convert a row selected with [`ANNOTATION_COLUMNS`] into the owning
/// rowid and the annotation.
pub(crate) fn row_to_annotation(row: &Row<'_>) -> rusqlite::Result<(i64, Annotation)> {
    let issue_id: i64 = row.get(0)?;
    let kind: String = row.get(1)?;
    let timestamp: String = row.get(2)?;

    Ok((
        issue_id,
        Annotation {
            kind: parse_annotation_type(1, &kind)?,
            timestamp: parse_db_timestamp(2, &timestamp)?,
            message: row.get(3)?,
        },
    ))
}

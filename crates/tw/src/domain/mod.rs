//! Domain types for issue tracking.
//!
//! An [`Issue`] sits somewhere in the epic/story/task hierarchy (or in the
//! flat bug/idea backlog) and carries an append-only log of [`Annotation`]s.
//! Status changes are recorded in that log, so "when did this become
//! blocked" is answered by folding over it rather than by extra fields.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ids::IssueId;

/// Timestamp layout shared by both storage backends (`20240131T094500Z`).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Separator between the repeatable summary and the details of a body.
pub const BODY_SEPARATOR: &str = "\n---\n";

/// Current time truncated to whole seconds.
///
/// Stored timestamps carry second precision, so anything built in memory
/// must match that to survive a save/get round trip unchanged.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Render a timestamp in [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp written in [`TIMESTAMP_FORMAT`].
///
/// # Errors
///
/// Returns [`Error::Validation`] when the text does not match the layout.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::Validation(format!("invalid timestamp '{s}': {e}")))
}

/// Kind of issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    /// Top of the hierarchy
    Epic,
    /// Child of an epic
    Story,
    /// Child of a story (or an epic)
    Task,
    /// Backlog: defect report
    Bug,
    /// Backlog: something worth considering
    Idea,
}

impl IssueType {
    /// All variants, in display order.
    pub const ALL: [IssueType; 5] = [
        IssueType::Epic,
        IssueType::Story,
        IssueType::Task,
        IssueType::Bug,
        IssueType::Idea,
    ];

    /// Backlog types never have a parent and are never a parent.
    pub fn is_backlog(self) -> bool {
        matches!(self, IssueType::Bug | IssueType::Idea)
    }

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::Epic => "epic",
            IssueType::Story => "story",
            IssueType::Task => "task",
            IssueType::Bug => "bug",
            IssueType::Idea => "idea",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        IssueType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unknown issue type '{s}'")))
    }
}

/// Lifecycle status of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    /// Created, not started
    New,
    /// Being worked on
    InProgress,
    /// Handed off mid-flight
    Stopped,
    /// Waiting on something external
    Blocked,
    /// Finished
    Done,
}

impl IssueStatus {
    /// All variants, in lifecycle order.
    pub const ALL: [IssueStatus; 5] = [
        IssueStatus::New,
        IssueStatus::InProgress,
        IssueStatus::Stopped,
        IssueStatus::Blocked,
        IssueStatus::Done,
    ];

    /// Snake-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::New => "new",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Stopped => "stopped",
            IssueStatus::Blocked => "blocked",
            IssueStatus::Done => "done",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        IssueStatus::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unknown issue status '{s}'")))
    }
}

/// Kind of annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationType {
    /// Work started (start)
    WorkBegin,
    /// Work finished (done)
    WorkEnd,
    /// Something learned along the way
    Lesson,
    /// Departure from the plan
    Deviation,
    /// Commit reference
    Commit,
    /// Structured status handoff
    Handoff,
    /// Blocked, with reason
    Blocked,
    /// Unblocked
    Unblocked,
    /// Free-form note
    Comment,
}

impl AnnotationType {
    /// All variants.
    pub const ALL: [AnnotationType; 9] = [
        AnnotationType::WorkBegin,
        AnnotationType::WorkEnd,
        AnnotationType::Lesson,
        AnnotationType::Deviation,
        AnnotationType::Commit,
        AnnotationType::Handoff,
        AnnotationType::Blocked,
        AnnotationType::Unblocked,
        AnnotationType::Comment,
    ];

    /// Kebab-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationType::WorkBegin => "work-begin",
            AnnotationType::WorkEnd => "work-end",
            AnnotationType::Lesson => "lesson",
            AnnotationType::Deviation => "deviation",
            AnnotationType::Commit => "commit",
            AnnotationType::Handoff => "handoff",
            AnnotationType::Blocked => "blocked",
            AnnotationType::Unblocked => "unblocked",
            AnnotationType::Comment => "comment",
        }
    }

    /// Types a caller may record directly, without a status change.
    pub fn is_plain(self) -> bool {
        matches!(
            self,
            AnnotationType::Comment
                | AnnotationType::Lesson
                | AnnotationType::Deviation
                | AnnotationType::Commit
        )
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnnotationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AnnotationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unknown annotation type '{s}'")))
    }
}

/// Immutable timestamped note on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation kind
    #[serde(rename = "type")]
    pub kind: AnnotationType,

    /// When it was recorded
    pub timestamp: DateTime<Utc>,

    /// Free text, possibly empty
    pub message: String,
}

impl Annotation {
    /// Create an annotation stamped with [`now`].
    pub fn new(kind: AnnotationType, message: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: now(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Hierarchical identifier, immutable once assigned
    pub id: IssueId,

    /// Issue kind
    #[serde(rename = "type")]
    pub issue_type: IssueType,

    /// Non-empty title
    pub title: String,

    /// Lifecycle status
    pub status: IssueStatus,

    /// Parent issue, never set for backlog types
    pub parent: Option<IssueId>,

    /// Free text; an optional `---` line splits summary from details
    pub body: Option<String>,

    /// Identifiers mentioned in the body, sorted
    pub refs: Vec<IssueId>,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last update time
    pub updated_at: DateTime<Utc>,

    /// Append-only annotation log, oldest first
    pub annotations: Vec<Annotation>,
}

impl Issue {
    /// A fresh `new` issue with no annotations.
    pub fn new(id: IssueId, issue_type: IssueType, title: impl Into<String>) -> Self {
        let ts = now();
        Self {
            id,
            issue_type,
            title: title.into(),
            status: IssueStatus::New,
            parent: None,
            body: None,
            refs: Vec::new(),
            created_at: ts,
            updated_at: ts,
            annotations: Vec::new(),
        }
    }

    /// Whether this is a bug or idea.
    pub fn is_backlog(&self) -> bool {
        self.issue_type.is_backlog()
    }

    /// Body text before the first `---` line, trimmed.
    ///
    /// This is the part repeated in context views of related issues.
    pub fn summary(&self) -> &str {
        self.body
            .as_deref()
            .map(|body| match body.split_once(BODY_SEPARATOR) {
                Some((summary, _)) => summary.trim(),
                None => body.trim(),
            })
            .unwrap_or("")
    }

    /// Body text after the first `---` line, trimmed.
    pub fn details(&self) -> &str {
        self.body
            .as_deref()
            .and_then(|body| body.split_once(BODY_SEPARATOR))
            .map(|(_, details)| details.trim())
            .unwrap_or("")
    }

    /// Timestamp that explains the current status, if any.
    ///
    /// Blocked issues report the first `blocked` annotation; in-progress and
    /// stopped issues report the first `work-begin`. Other statuses have none.
    pub fn status_since(&self) -> Option<DateTime<Utc>> {
        let wanted = match self.status {
            IssueStatus::Blocked => AnnotationType::Blocked,
            IssueStatus::InProgress | IssueStatus::Stopped => AnnotationType::WorkBegin,
            IssueStatus::New | IssueStatus::Done => return None,
        };
        self.annotations
            .iter()
            .find(|a| a.kind == wanted)
            .map(|a| a.timestamp)
    }
}

/// Reject empty or whitespace-only titles.
///
/// # Errors
///
/// Returns [`Error::Validation`] for an empty title.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::Validation("title cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn issue_with_body(body: Option<&str>) -> Issue {
        let mut issue = Issue::new(IssueId::parse("P-1").unwrap(), IssueType::Task, "t");
        issue.body = body.map(str::to_string);
        issue
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[rstest]
    #[case::no_body(None, "", "")]
    #[case::summary_only(Some("  just a summary \n"), "just a summary", "")]
    #[case::split(Some("short\n---\nlong\ndetails"), "short", "long\ndetails")]
    #[case::second_separator_kept(Some("a\n---\nb\n---\nc"), "a", "b\n---\nc")]
    #[case::inline_dashes_ignored(Some("a --- b"), "a --- b", "")]
    fn test_body_split(
        #[case] body: Option<&str>,
        #[case] summary: &str,
        #[case] details: &str,
    ) {
        let issue = issue_with_body(body);
        assert_eq!(issue.summary(), summary);
        assert_eq!(issue.details(), details);
    }

    #[test]
    fn test_status_since_folds_annotation_log() {
        let mut issue = issue_with_body(None);
        issue.annotations = vec![
            Annotation { kind: AnnotationType::WorkBegin, timestamp: at(1), message: String::new() },
            Annotation { kind: AnnotationType::Blocked, timestamp: at(2), message: "wait".into() },
            Annotation { kind: AnnotationType::Unblocked, timestamp: at(3), message: String::new() },
            Annotation { kind: AnnotationType::Blocked, timestamp: at(4), message: "again".into() },
        ];

        issue.status = IssueStatus::Blocked;
        assert_eq!(issue.status_since(), Some(at(2)));

        issue.status = IssueStatus::InProgress;
        assert_eq!(issue.status_since(), Some(at(1)));

        issue.status = IssueStatus::Done;
        assert_eq!(issue.status_since(), None);
    }

    #[test]
    fn test_wire_names_round_trip() {
        for t in IssueType::ALL {
            assert_eq!(t.as_str().parse::<IssueType>().unwrap(), t);
        }
        for s in IssueStatus::ALL {
            assert_eq!(s.as_str().parse::<IssueStatus>().unwrap(), s);
        }
        for a in AnnotationType::ALL {
            assert_eq!(a.as_str().parse::<AnnotationType>().unwrap(), a);
        }
        assert_eq!(
            serde_json::to_string(&IssueStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&AnnotationType::WorkBegin).unwrap(),
            "\"work-begin\""
        );
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 31, 9, 45, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "20240131T094500Z");
        assert_eq!(parse_timestamp("20240131T094500Z").unwrap(), ts);
        assert!(parse_timestamp("2024-01-31").is_err());
    }

    #[test]
    fn test_now_has_whole_seconds() {
        assert_eq!(now().timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_validate_title() {
        assert!(validate_title("ok").is_ok());
        assert!(validate_title("   ").unwrap_err().is_validation());
    }

    #[test]
    fn test_plain_annotation_types() {
        assert!(AnnotationType::Lesson.is_plain());
        assert!(!AnnotationType::WorkBegin.is_plain());
        assert!(!AnnotationType::Handoff.is_plain());
    }
}

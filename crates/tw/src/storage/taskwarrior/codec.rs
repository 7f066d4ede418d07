//! Translation between [`Issue`] and TaskWarrior's JSON task records.
//!
//! tw fields ride along as user-defined attributes (`tw_type`, `tw_id`,
//! `tw_parent`, `tw_body`, `tw_refs`, `tw_status`); the title maps to
//! `description`. Annotations are packed as `[type] message` into
//! TaskWarrior's single annotation description.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{format_timestamp, parse_timestamp, Annotation, AnnotationType, Issue, IssueStatus};
use crate::error::{Error, Result};
use crate::ids::IssueId;

static ANNOTATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\[([a-z-]+)\](?: (.*))?$").expect("annotation pattern is valid"));

/// TaskWarrior status of a tombstoned task.
pub(crate) const DELETED: &str = "deleted";

/// One task as exported by `task export` and accepted by `task import`.
///
/// Fields TaskWarrior computes on its own (`id`, `urgency`, ...) are
/// ignored on the way in and never written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TaskRecord {
    pub uuid: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tw_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tw_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tw_parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tw_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tw_refs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tw_status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<TaskAnnotation>,
}

impl TaskRecord {
    pub fn is_deleted(&self) -> bool {
        self.status == DELETED
    }
}

/// TaskWarrior annotation: a timestamp and one line of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TaskAnnotation {
    pub entry: String,
    pub description: String,
}

/// Pack an annotation as `[type] message`.
pub(crate) fn encode_annotation(annotation: &Annotation) -> TaskAnnotation {
    TaskAnnotation {
        entry: format_timestamp(&annotation.timestamp),
        description: format!("[{}] {}", annotation.kind, annotation.message),
    }
}

/// Unpack `[type] message`.
///
/// Exactly one space separates the tag from the message. An unknown tag, or
/// text without a tag, decodes as a comment holding the whole description.
pub(crate) fn decode_annotation(raw: &TaskAnnotation) -> Result<Annotation> {
    let timestamp = parse_timestamp(&raw.entry)?;

    let tagged = ANNOTATION_PATTERN.captures(&raw.description).and_then(|caps| {
        let kind = caps[1].parse::<AnnotationType>().ok()?;
        let message = caps.get(2).map_or("", |m| m.as_str());
        Some((kind, message.to_string()))
    });
    let (kind, message) =
        tagged.unwrap_or_else(|| (AnnotationType::Comment, raw.description.clone()));

    Ok(Annotation {
        kind,
        timestamp,
        message,
    })
}

/// Build the record for `issue`.
pub(crate) fn encode(issue: &Issue, uuid: &str, project: &str) -> TaskRecord {
    let refs = issue
        .refs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    TaskRecord {
        uuid: uuid.to_string(),
        description: issue.title.clone(),
        project: Some(project.to_string()),
        status: if issue.status == IssueStatus::Done {
            "completed".to_string()
        } else {
            "pending".to_string()
        },
        entry: Some(format_timestamp(&issue.created_at)),
        modified: Some(format_timestamp(&issue.updated_at)),
        tw_type: Some(issue.issue_type.to_string()),
        tw_id: Some(issue.id.to_string()),
        tw_parent: issue.parent.as_ref().map(ToString::to_string),
        tw_body: issue.body.clone(),
        tw_refs: (!refs.is_empty()).then_some(refs),
        tw_status: Some(issue.status.to_string()),
        annotations: issue.annotations.iter().map(encode_annotation).collect(),
    }
}

/// Rebuild an issue from its record.
///
/// Returns `Ok(None)` for tasks that tw does not manage (no `tw_id`).
///
/// # Errors
///
/// `Error::Validation` or `Error::InvalidId` when a tw-managed record
/// carries values outside the domain vocabulary.
pub(crate) fn decode(record: &TaskRecord) -> Result<Option<Issue>> {
    let Some(tw_id) = &record.tw_id else {
        return Ok(None);
    };
    let missing = |field: &str| Error::Validation(format!("task {} has no {field}", record.uuid));

    let created_at = parse_timestamp(record.entry.as_deref().ok_or_else(|| missing("entry"))?)?;
    let updated_at = match &record.modified {
        Some(modified) => parse_timestamp(modified)?,
        None => created_at,
    };

    let refs = record
        .tw_refs
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .filter_map(|r| IssueId::parse(r).ok())
        .collect();

    Ok(Some(Issue {
        id: IssueId::parse(tw_id)?,
        issue_type: record.tw_type.as_deref().ok_or_else(|| missing("tw_type"))?.parse()?,
        title: record.description.clone(),
        status: record.tw_status.as_deref().ok_or_else(|| missing("tw_status"))?.parse()?,
        parent: record.tw_parent.as_deref().map(IssueId::parse).transpose()?,
        body: record.tw_body.clone(),
        refs,
        created_at,
        updated_at,
        annotations: record
            .annotations
            .iter()
            .map(decode_annotation)
            .collect::<Result<_>>()?,
    }))
}

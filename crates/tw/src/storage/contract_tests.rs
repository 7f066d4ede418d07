//! One behavioural suite run against every backend.
//!
//! Each test builds a fresh store through [`Backend::open`] so SQLite and
//! TaskWarrior are held to identical expectations.

use std::sync::Arc;

use rstest::rstest;

use super::{FakeTaskWarrior, IssueStorage, SqliteStorage, TaskWarriorStorage};
use crate::domain::{Annotation, AnnotationType, Issue, IssueStatus, IssueType};
use crate::ids::IssueId;

#[derive(Debug, Clone, Copy)]
enum Backend {
    Sqlite,
    TaskWarrior,
}

impl Backend {
    fn open(self) -> Box<dyn IssueStorage> {
        match self {
            Self::Sqlite => Box::new(SqliteStorage::open_in_memory().unwrap()),
            Self::TaskWarrior => Box::new(TaskWarriorStorage::with_runner(
                Arc::new(FakeTaskWarrior::new()),
                "contract",
            )),
        }
    }
}

fn id(s: &str) -> IssueId {
    IssueId::parse(s).unwrap()
}

fn rich_issue() -> Issue {
    let mut issue = Issue::new(id("P-1-2a"), IssueType::Task, "Wire the parser");
    issue.status = IssueStatus::Blocked;
    issue.parent = Some(id("P-1-2"));
    issue.body = Some("Short summary\n---\nLong details\n\n  indented line\nSee P-3 and P-1".into());
    issue.refs = vec![id("P-1"), id("P-3")];

    let base = issue.created_at;
    for (offset, kind, message) in [
        (1, AnnotationType::WorkBegin, ""),
        (2, AnnotationType::Lesson, "read the docs first"),
        (3, AnnotationType::Blocked, "waiting on [review]"),
        (4, AnnotationType::Handoff, "paused\n\n## Completed\nlexer\n\n## Remaining\nparser"),
    ] {
        let mut annotation = Annotation::new(kind, message);
        annotation.timestamp = base + chrono::Duration::seconds(offset);
        issue.annotations.push(annotation);
    }
    issue.updated_at = base + chrono::Duration::seconds(4);
    issue
}

#[rstest]
#[case::sqlite(Backend::Sqlite)]
#[case::taskwarrior(Backend::TaskWarrior)]
#[tokio::test]
async fn save_then_get_round_trips(#[case] backend: Backend) {
    let mut store = backend.open();
    let issue = rich_issue();

    store.save_issue(&issue).await.unwrap();

    assert_eq!(store.get_issue(&issue.id).await.unwrap(), Some(issue));
}

#[rstest]
#[case::sqlite(Backend::Sqlite)]
#[case::taskwarrior(Backend::TaskWarrior)]
#[tokio::test]
async fn missing_issue_is_none(#[case] backend: Backend) {
    let store = backend.open();
    assert_eq!(store.get_issue(&id("P-42")).await.unwrap(), None);
    assert!(store.get_all_issues().await.unwrap().is_empty());
}

#[rstest]
#[case::sqlite(Backend::Sqlite)]
#[case::taskwarrior(Backend::TaskWarrior)]
#[tokio::test]
async fn update_appends_only_new_annotations(#[case] backend: Backend) {
    let mut store = backend.open();
    let mut issue = rich_issue();
    store.save_issue(&issue).await.unwrap();

    let mut extra = Annotation::new(AnnotationType::Comment, "one more");
    extra.timestamp = issue.updated_at + chrono::Duration::seconds(1);
    issue.annotations.push(extra);
    issue.status = IssueStatus::InProgress;
    store.save_issue(&issue).await.unwrap();

    // A stale copy without the annotations must not erase them.
    let mut stale = issue.clone();
    stale.annotations.clear();
    stale.title = "Retitled".into();
    store.save_issue(&stale).await.unwrap();

    let loaded = store.get_issue(&issue.id).await.unwrap().unwrap();
    assert_eq!(loaded.title, "Retitled");
    assert_eq!(loaded.status, IssueStatus::InProgress);
    assert_eq!(loaded.annotations, issue.annotations);
}

#[rstest]
#[case::sqlite(Backend::Sqlite)]
#[case::taskwarrior(Backend::TaskWarrior)]
#[tokio::test]
async fn add_annotation_appends(#[case] backend: Backend) {
    let mut store = backend.open();
    let issue = rich_issue();
    store.save_issue(&issue).await.unwrap();

    let mut annotation = Annotation::new(AnnotationType::Commit, "abc1234");
    annotation.timestamp = issue.updated_at + chrono::Duration::seconds(10);
    store.add_annotation(&issue.id, &annotation).await.unwrap();

    let loaded = store.get_issue(&issue.id).await.unwrap().unwrap();
    assert_eq!(loaded.annotations.last(), Some(&annotation));
    assert_eq!(loaded.annotations.len(), issue.annotations.len() + 1);
    assert_eq!(loaded.updated_at, annotation.timestamp);
    assert_eq!(loaded.status, issue.status);
}

#[rstest]
#[case::sqlite(Backend::Sqlite)]
#[case::taskwarrior(Backend::TaskWarrior)]
#[tokio::test]
async fn operations_on_missing_issue_fail(#[case] backend: Backend) {
    let mut store = backend.open();
    let annotation = Annotation::new(AnnotationType::Comment, "x");

    let err = store.add_annotation(&id("P-9"), &annotation).await.unwrap_err();
    assert!(err.is_not_found(), "{err}");

    let err = store.delete_issue(&id("P-9")).await.unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[rstest]
#[case::sqlite(Backend::Sqlite)]
#[case::taskwarrior(Backend::TaskWarrior)]
#[tokio::test]
async fn delete_removes_issue_and_frees_id(#[case] backend: Backend) {
    let mut store = backend.open();
    for raw in ["P-1", "P-2", "P-3"] {
        store
            .save_issue(&Issue::new(id(raw), IssueType::Epic, raw))
            .await
            .unwrap();
    }

    store.delete_issue(&id("P-3")).await.unwrap();

    assert_eq!(store.get_issue(&id("P-3")).await.unwrap(), None);
    let mut live = store.get_all_ids(false).await.unwrap();
    live.sort();
    assert_eq!(live, vec![id("P-1"), id("P-2")]);

    let titles: Vec<String> = store
        .get_all_issues()
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.title)
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(!titles.contains(&"P-3".to_string()));
}

#[rstest]
#[case::sqlite(Backend::Sqlite)]
#[case::taskwarrior(Backend::TaskWarrior)]
#[tokio::test]
async fn empty_body_and_refs_round_trip(#[case] backend: Backend) {
    let mut store = backend.open();
    let mut issue = Issue::new(id("P-4"), IssueType::Idea, "Bare idea");
    issue.status = IssueStatus::Done;
    store.save_issue(&issue).await.unwrap();

    let loaded = store.get_issue(&issue.id).await.unwrap().unwrap();
    assert_eq!(loaded, issue);
    assert_eq!(loaded.body, None);
    assert!(loaded.refs.is_empty());
}

//! Issue service workflows over a SQLite file on disk.

use tempfile::TempDir;
use tw::domain::{AnnotationType, IssueStatus, IssueType};
use tw::ids::IssueId;

mod common;
use common::sqlite_service;

fn id(s: &str) -> IssueId {
    IssueId::parse(s).unwrap()
}

#[tokio::test]
async fn test_work_survives_reopening_the_store() {
    let temp = TempDir::new().unwrap();

    {
        let mut svc = sqlite_service(temp.path()).await;
        let epic = svc.create_issue(IssueType::Epic, "Parser", None, None).await.unwrap();
        let story = svc
            .create_issue(IssueType::Story, "Lexer", Some(&epic), Some("Tokens\n---\nSee TW-1"))
            .await
            .unwrap();
        svc.start_issue(&story).await.unwrap();
        svc.record_annotation(&story, AnnotationType::Lesson, "unicode is hard")
            .await
            .unwrap();
    }

    let svc = sqlite_service(temp.path()).await;
    let story = svc.get_issue(&id("TW-1-1")).await.unwrap();
    assert_eq!(story.status, IssueStatus::InProgress);
    assert_eq!(story.parent, Some(id("TW-1")));
    assert_eq!(story.refs, vec![id("TW-1")]);
    assert_eq!(story.summary(), "Tokens");
    let kinds: Vec<_> = story.annotations.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![AnnotationType::WorkBegin, AnnotationType::Lesson]);
    assert!(story.status_since().is_some());
}

#[tokio::test]
async fn test_full_lifecycle() {
    let temp = TempDir::new().unwrap();
    let mut svc = sqlite_service(temp.path()).await;

    let epic = svc.create_issue(IssueType::Epic, "E", None, None).await.unwrap();
    let story = svc.create_issue(IssueType::Story, "S", Some(&epic), None).await.unwrap();
    let task = svc.create_issue(IssueType::Task, "T", Some(&story), None).await.unwrap();
    assert_eq!(task, id("TW-1-1a"));

    svc.start_issue(&task).await.unwrap();
    svc.block_issue(&task, "waiting on review").await.unwrap();
    svc.unblock_issue(&task, "approved").await.unwrap();
    svc.handoff_issue(&task, "half way", "lexer", "parser").await.unwrap();
    svc.start_issue(&task).await.unwrap();

    let err = svc.done_issue(&story, false).await.unwrap_err();
    assert!(err.is_state());

    // The task closes first; the story is still `new` and stops the walk.
    let err = svc.done_issue_recursive(&epic, false).await.unwrap_err();
    assert!(err.is_state());
    assert_eq!(svc.get_issue(&task).await.unwrap().status, IssueStatus::Done);

    let closed = svc.done_issue_recursive(&epic, true).await.unwrap();
    assert_eq!(closed, vec![story.clone(), epic.clone()]);

    let task = svc.get_issue(&task).await.unwrap();
    let kinds: Vec<_> = task.annotations.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![
            AnnotationType::WorkBegin,
            AnnotationType::Blocked,
            AnnotationType::Unblocked,
            AnnotationType::Handoff,
            AnnotationType::WorkBegin,
            AnnotationType::WorkEnd,
        ]
    );
    assert!(task.annotations[3].message.contains("## Completed\nlexer"));

    let tree = svc.get_issue_tree(None).await.unwrap();
    assert!(tree.is_empty(), "finished epics leave the open tree");
}

#[tokio::test]
async fn test_promote_backlog_item_into_hierarchy() {
    let temp = TempDir::new().unwrap();
    let mut svc = sqlite_service(temp.path()).await;

    let epic = svc.create_issue(IssueType::Epic, "E", None, None).await.unwrap();
    let idea = svc.create_issue(IssueType::Idea, "Pretty errors", None, Some("nice")).await.unwrap();
    assert_eq!(idea, id("TW-2"));

    let story = svc
        .promote_issue(&idea, Some(IssueType::Story), Some(&epic))
        .await
        .unwrap();
    assert_eq!(story, id("TW-1-1"));

    let promoted = svc.get_issue(&story).await.unwrap();
    assert_eq!(promoted.issue_type, IssueType::Story);
    assert_eq!(promoted.body.as_deref(), Some("nice"));
    assert!(svc.get_issue(&idea).await.unwrap_err().is_not_found());
    assert!(svc.get_backlog_issues().await.unwrap().is_empty());
}

//! CLI value enums and domain type conversions.

use clap::ValueEnum;

use crate::domain::{AnnotationType, IssueType};

/// Issue type for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueTypeArg {
    /// Top-level body of work
    Epic,
    /// Deliverable under an epic
    Story,
    /// Unit of work under a story
    Task,
    /// Backlog: defect report
    Bug,
    /// Backlog: something worth considering
    Idea,
}

impl From<IssueTypeArg> for IssueType {
    fn from(arg: IssueTypeArg) -> Self {
        match arg {
            IssueTypeArg::Epic => IssueType::Epic,
            IssueTypeArg::Story => IssueType::Story,
            IssueTypeArg::Task => IssueType::Task,
            IssueTypeArg::Bug => IssueType::Bug,
            IssueTypeArg::Idea => IssueType::Idea,
        }
    }
}

/// Annotation kinds that `record` accepts
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKindArg {
    /// Something learned along the way
    Lesson,
    /// Departure from the plan
    Deviation,
    /// Commit reference
    Commit,
    /// Free-form note
    Comment,
}

impl From<RecordKindArg> for AnnotationType {
    fn from(arg: RecordKindArg) -> Self {
        match arg {
            RecordKindArg::Lesson => AnnotationType::Lesson,
            RecordKindArg::Deviation => AnnotationType::Deviation,
            RecordKindArg::Commit => AnnotationType::Commit,
            RecordKindArg::Comment => AnnotationType::Comment,
        }
    }
}

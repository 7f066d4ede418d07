//! CLI argument structs for all commands.

use clap::Parser;

use super::types::{IssueTypeArg, RecordKindArg};
use crate::ids::IssueId;

fn parse_id(s: &str) -> Result<IssueId, String> {
    IssueId::parse(s).map_err(|e| e.to_string())
}

/// Arguments for the `new` command
#[derive(Parser, Debug, Clone)]
pub struct NewArgs {
    /// Issue type
    #[arg(value_enum)]
    pub issue_type: IssueTypeArg,

    /// Issue title
    pub title: String,

    /// Parent issue (stories need an epic; tasks a story or task)
    #[arg(short, long, value_parser = parse_id)]
    pub parent: Option<IssueId>,

    /// Body text; `-` reads it from stdin
    #[arg(short, long)]
    pub body: Option<String>,
}

/// Arguments for commands that take only an issue id
#[derive(Parser, Debug, Clone)]
pub struct IdArgs {
    /// Issue id
    #[arg(value_parser = parse_id)]
    pub id: IssueId,
}

/// Arguments for the `done` command
#[derive(Parser, Debug, Clone)]
pub struct DoneArgs {
    /// Issue id
    #[arg(value_parser = parse_id)]
    pub id: IssueId,

    /// Skip the status and open-children checks
    #[arg(short, long)]
    pub force: bool,

    /// Also mark every descendant done, children first
    #[arg(short, long)]
    pub recursive: bool,
}

/// Arguments for the `blocked` command
#[derive(Parser, Debug, Clone)]
pub struct BlockedArgs {
    /// Issue id
    #[arg(value_parser = parse_id)]
    pub id: IssueId,

    /// What the issue is waiting on
    pub reason: String,
}

/// Arguments for the `unblock` command
#[derive(Parser, Debug, Clone)]
pub struct UnblockArgs {
    /// Issue id
    #[arg(value_parser = parse_id)]
    pub id: IssueId,

    /// Note to record with the unblock
    #[arg(short, long, default_value = "")]
    pub message: String,
}

/// Arguments for the `handoff` command
#[derive(Parser, Debug, Clone)]
pub struct HandoffArgs {
    /// Issue id
    #[arg(value_parser = parse_id)]
    pub id: IssueId,

    /// One-line status
    #[arg(long)]
    pub status: String,

    /// What got done
    #[arg(long)]
    pub completed: String,

    /// What is left
    #[arg(long)]
    pub remaining: String,
}

/// Arguments for the `comment` command
#[derive(Parser, Debug, Clone)]
pub struct CommentArgs {
    /// Issue id
    #[arg(value_parser = parse_id)]
    pub id: IssueId,

    /// Comment text
    pub message: String,
}

/// Arguments for the `record` command
#[derive(Parser, Debug, Clone)]
pub struct RecordArgs {
    /// Issue id
    #[arg(value_parser = parse_id)]
    pub id: IssueId,

    /// Annotation kind
    #[arg(value_enum)]
    pub kind: RecordKindArg,

    /// Annotation text
    pub message: String,
}

/// Arguments for the `update` command
///
/// With neither `--title` nor `--body`, opens `$EDITOR` on the issue.
#[derive(Parser, Debug, Clone)]
pub struct UpdateArgs {
    /// Issue id
    #[arg(value_parser = parse_id)]
    pub id: IssueId,

    /// New title
    #[arg(short, long)]
    pub title: Option<String>,

    /// New body; empty clears it, `-` reads it from stdin
    #[arg(short, long)]
    pub body: Option<String>,
}

/// Arguments for the `tree` command
#[derive(Parser, Debug, Clone)]
pub struct TreeArgs {
    /// Show only this issue and its descendants
    #[arg(value_parser = parse_id)]
    pub id: Option<IssueId>,
}

/// Arguments for the `capture` command
#[derive(Parser, Debug, Clone)]
pub struct CaptureArgs {
    /// `-` reads capture text from stdin; omit to open `$EDITOR`
    #[arg(value_parser = ["-"])]
    pub input: Option<String>,
}

/// Arguments for the `reparent` command
#[derive(Parser, Debug, Clone)]
pub struct ReparentArgs {
    /// Issue id
    #[arg(value_parser = parse_id)]
    pub id: IssueId,

    /// New parent; omit to make the issue an epic
    #[arg(short, long, value_parser = parse_id)]
    pub parent: Option<IssueId>,
}

/// Arguments for the `promote` command
#[derive(Parser, Debug, Clone)]
pub struct PromoteArgs {
    /// Issue id
    #[arg(value_parser = parse_id)]
    pub id: IssueId,

    /// Target type; inferred from the parent when omitted
    #[arg(short = 't', long = "type", value_enum)]
    pub issue_type: Option<IssueTypeArg>,

    /// New parent
    #[arg(short, long, value_parser = parse_id)]
    pub parent: Option<IssueId>,
}

/// Arguments for the `watch` command
#[derive(Parser, Debug, Clone)]
pub struct WatchArgs {
    /// Show only this issue and its descendants
    #[arg(value_parser = parse_id)]
    pub id: Option<IssueId>,

    /// Redraw at least every this many seconds
    #[arg(short = 'n', long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,
}

//! CLI argument parsing and command dispatch.
//!
//! # Global Flags
//!
//! - `--json`: output in JSON format (applies to all commands)
//! - `--verbose`: debug logging on stderr
//! - `--db`, `--prefix`: override the configured database file and prefix
//!
//! # Example
//!
//! ```bash
//! tw new epic "Parser"
//! tw new story "Lexer" --parent TW-1
//! tw start TW-1-1
//! tw done TW-1 --recursive
//! ```

mod args;
mod editor;
mod execute;
mod types;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub use args::{
    BlockedArgs, CaptureArgs, CommentArgs, DoneArgs, HandoffArgs, IdArgs, NewArgs, PromoteArgs,
    RecordArgs, ReparentArgs, TreeArgs, UnblockArgs, UpdateArgs, WatchArgs,
};
pub use types::{IssueTypeArg, RecordKindArg};

use crate::app::App;
use crate::config::Overrides;
use crate::output::OutputMode;

/// tw - hierarchical issue tracker
///
/// Epics hold stories, stories hold tasks; bugs and ideas wait in the
/// backlog until groomed.
#[derive(Parser, Debug)]
#[command(name = "tw")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// SQLite database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Issue id prefix
    #[arg(long, global = true, value_name = "P")]
    pub prefix: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create an issue
    New(NewArgs),

    /// Start work (new or stopped → in_progress)
    Start(IdArgs),

    /// Mark an issue done
    Done(DoneArgs),

    /// Mark an in-progress issue blocked
    Blocked(BlockedArgs),

    /// Resume a blocked issue
    Unblock(UnblockArgs),

    /// Hand off an in-progress issue with a status summary
    Handoff(HandoffArgs),

    /// Add a comment
    Comment(CommentArgs),

    /// Record a lesson, deviation, commit or comment
    Record(RecordArgs),

    /// Change title and/or body
    Update(UpdateArgs),

    /// Delete an issue without children
    Delete(IdArgs),

    /// Show an issue with its related issues
    View(IdArgs),

    /// Show an issue with a summary of its children
    Digest(IdArgs),

    /// Show the open hierarchy and the backlog
    Tree(TreeArgs),

    /// List open bugs and ideas
    Backlog,

    /// Create several issues from indented capture text
    Capture(CaptureArgs),

    /// Edit the backlog in `$EDITOR`: resolve, convert or add items
    Groom,

    /// Move an issue and its descendants under a new parent
    Reparent(ReparentArgs),

    /// Turn an issue, usually a bug or idea, into another type
    Promote(PromoteArgs),

    /// Redraw the tree whenever the store changes
    Watch(WatchArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Configuration overrides given as flags.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            db_path: self.db.clone(),
            prefix: self.prefix.clone(),
        }
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        let mut app = App::load(&self.overrides()).await?;
        self.execute_with(&mut app, output_mode).await
    }

    /// Execute the command against an already-open application context.
    pub async fn execute_with(&self, app: &mut App, output_mode: OutputMode) -> Result<()> {
        match &self.command {
            Commands::New(args) => execute::execute_new(app, args, output_mode).await,
            Commands::Start(args) => execute::execute_start(app, args, output_mode).await,
            Commands::Done(args) => execute::execute_done(app, args, output_mode).await,
            Commands::Blocked(args) => execute::execute_blocked(app, args, output_mode).await,
            Commands::Unblock(args) => execute::execute_unblock(app, args, output_mode).await,
            Commands::Handoff(args) => execute::execute_handoff(app, args, output_mode).await,
            Commands::Comment(args) => execute::execute_comment(app, args, output_mode).await,
            Commands::Record(args) => execute::execute_record(app, args, output_mode).await,
            Commands::Update(args) => execute::execute_update(app, args, output_mode).await,
            Commands::Delete(args) => execute::execute_delete(app, args, output_mode).await,
            Commands::View(args) => execute::execute_view(app, args, output_mode).await,
            Commands::Digest(args) => execute::execute_digest(app, args, output_mode).await,
            Commands::Tree(args) => execute::execute_tree(app, args, output_mode).await,
            Commands::Backlog => execute::execute_backlog(app, output_mode).await,
            Commands::Capture(args) => execute::execute_capture(app, args, output_mode).await,
            Commands::Groom => execute::execute_groom(app, output_mode).await,
            Commands::Reparent(args) => execute::execute_reparent(app, args, output_mode).await,
            Commands::Promote(args) => execute::execute_promote(app, args, output_mode).await,
            Commands::Watch(args) => execute::execute_watch(app, args, output_mode).await,
        }
    }
}

//! Output formatting for CLI commands.
//!
//! Text output is deliberately plain: one line per issue, indented by
//! depth. `--json` output serialises the domain types directly.
//!
//! Submodules:
//! - [`tree`]: indented tree and backlog rendering

pub mod tree;

use std::env;
use std::io::{self, Write};

use colored::Colorize;
use serde::Serialize;

use crate::domain::{Issue, IssueStatus};
use crate::service::IssueContext;

pub use tree::{render_backlog, render_tree};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Settings that control text rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Read from the environment.
    ///
    /// Colors are off when `NO_COLOR` is set or `TW_COLOR` is `0`/`false`.
    pub fn from_env() -> Self {
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("TW_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);
        Self { use_colors }
    }

    /// No colors, for tests and piping.
    pub fn plain() -> Self {
        Self { use_colors: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { use_colors: true }
    }
}

/// Status text, colored by lifecycle stage.
pub(crate) fn colorize_status(status: IssueStatus, config: &OutputConfig) -> String {
    let text = status.to_string();
    if !config.use_colors {
        return text;
    }
    match status {
        IssueStatus::New => text,
        IssueStatus::InProgress => text.yellow().to_string(),
        IssueStatus::Stopped => text.magenta().to_string(),
        IssueStatus::Blocked => text.red().to_string(),
        IssueStatus::Done => text.green().to_string(),
    }
}

/// Issue id in cyan.
pub(crate) fn colorize_id(id: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return id.to_string();
    }
    id.cyan().to_string()
}

/// Print a message line to stdout.
pub fn print_message(msg: &str) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{msg}")
}

/// Print a JSON-formatted result for any serializable value
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(handle, "{json}")
}

/// Write one issue in full: header, body and annotation log.
pub fn write_issue<W: Write>(w: &mut W, issue: &Issue, config: &OutputConfig) -> io::Result<()> {
    writeln!(
        w,
        "{} ({}) [{}] {}",
        colorize_id(&issue.id.to_string(), config),
        issue.issue_type,
        colorize_status(issue.status, config),
        issue.title
    )?;
    if let Some(parent) = &issue.parent {
        writeln!(w, "Parent: {parent}")?;
    }
    if let Some(since) = issue.status_since() {
        writeln!(w, "Since: {}", since.format("%Y-%m-%d %H:%M"))?;
    }
    if let Some(body) = &issue.body {
        writeln!(w)?;
        writeln!(w, "{body}")?;
    }
    if !issue.annotations.is_empty() {
        writeln!(w)?;
        for annotation in &issue.annotations {
            writeln!(
                w,
                "{} [{}] {}",
                annotation.timestamp.format("%Y-%m-%d %H:%M"),
                annotation.kind,
                annotation.message
            )?;
        }
    }
    Ok(())
}

/// One summary line: id, status, title.
fn write_line<W: Write>(w: &mut W, indent: &str, issue: &Issue, config: &OutputConfig) -> io::Result<()> {
    writeln!(
        w,
        "{indent}{} [{}] {}",
        colorize_id(&issue.id.to_string(), config),
        colorize_status(issue.status, config),
        issue.title
    )
}

/// Write an issue with its direct children, each child with its summary.
pub fn write_digest<W: Write>(
    w: &mut W,
    issue: &Issue,
    children: &[Issue],
    config: &OutputConfig,
) -> io::Result<()> {
    write_line(w, "", issue, config)?;
    if !issue.summary().is_empty() {
        writeln!(w, "  {}", issue.summary())?;
    }
    for child in children {
        write_line(w, "  ", child, config)?;
        if !child.summary().is_empty() {
            writeln!(w, "      {}", child.summary())?;
        }
    }
    Ok(())
}

/// Write an issue in full followed by its related issues.
pub fn write_context<W: Write>(w: &mut W, ctx: &IssueContext, config: &OutputConfig) -> io::Result<()> {
    write_issue(w, &ctx.issue, config)?;

    let sections: [(&str, &[Issue]); 5] = [
        ("Ancestors", &ctx.ancestors),
        ("Siblings", &ctx.siblings),
        ("Descendants", &ctx.descendants),
        ("References", &ctx.referenced),
        ("Referenced by", &ctx.referencing),
    ];
    for (heading, issues) in sections {
        if issues.is_empty() {
            continue;
        }
        writeln!(w)?;
        writeln!(w, "{heading}:")?;
        for issue in issues {
            write_line(w, "  ", issue, config)?;
        }
    }
    Ok(())
}

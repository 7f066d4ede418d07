//! Command execution logic.

use std::io::Write;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use super::args::{
    BlockedArgs, CaptureArgs, CommentArgs, DoneArgs, HandoffArgs, IdArgs, NewArgs, PromoteArgs,
    RecordArgs, ReparentArgs, TreeArgs, UnblockArgs, UpdateArgs, WatchArgs,
};
use super::editor;
use crate::app::App;
use crate::capture::{self, edit, groom};
use crate::domain::{format_timestamp, now, AnnotationType, IssueType};
use crate::ids::IssueId;
use crate::output::{self, OutputConfig, OutputMode};
use crate::service::IssueService;
use crate::watch::{Refresh, WatchLoop, WatchOptions};

const CAPTURE_TEMPLATE: &str = "

# Capture issues using indented DSL
# Format: - type: title
# Types: epic, story, task, bug, idea
# Lines starting with # are ignored
#
# - epic: example epic
#   - story: example story
#     - task: example task
";

/// Print `{"id": ...}` or a one-line message.
fn report(id: &IssueId, message: &str, output_mode: OutputMode) -> Result<()> {
    match output_mode {
        OutputMode::Json => output::print_json(&json!({ "id": id }))?,
        OutputMode::Text => output::print_message(message)?,
    }
    Ok(())
}

// ========== Creation ==========

/// Execute the new command
pub async fn execute_new(app: &mut App, args: &NewArgs, output_mode: OutputMode) -> Result<()> {
    let body = editor::resolve_dash(args.body.as_deref()).await?;
    let issue_type = IssueType::from(args.issue_type);
    let id = app
        .service_mut()
        .create_issue(issue_type, &args.title, args.parent.as_ref(), body.as_deref())
        .await?;
    report(&id, &format!("Created {issue_type} {id}"), output_mode)
}

/// Execute the capture command
pub async fn execute_capture(app: &mut App, args: &CaptureArgs, output_mode: OutputMode) -> Result<()> {
    let text = match args.input.as_deref() {
        Some(_) => editor::read_stdin().await?,
        None => editor::edit(CAPTURE_TEMPLATE, ".txt").await?,
    };

    let entries = capture::parse(&text);
    let created = app.service_mut().apply_capture(&entries).await?;

    match output_mode {
        OutputMode::Json => {
            let created: Vec<_> = created
                .iter()
                .map(|(id, title)| json!({ "id": id, "title": title }))
                .collect();
            output::print_json(&json!({ "created": created }))?;
        }
        OutputMode::Text if created.is_empty() => output::print_message("No issues created")?,
        OutputMode::Text => {
            for (id, title) in &created {
                output::print_message(&format!("Created {id}: {title}"))?;
            }
        }
    }
    Ok(())
}

/// Execute the groom command
pub async fn execute_groom(app: &mut App, output_mode: OutputMode) -> Result<()> {
    let backlog = app.service().get_backlog_issues().await?;
    if backlog.is_empty() {
        if output_mode == OutputMode::Text {
            output::print_message("No backlog items to groom")?;
        } else {
            output::print_json(&groom::GroomSummary::default())?;
        }
        return Ok(());
    }

    let original_ids: Vec<IssueId> = backlog.iter().map(|i| i.id.clone()).collect();
    let content = format!("{}\n{}", groom::render(&backlog), groom::INSTRUCTIONS);
    let edited = editor::edit(&content, ".md").await?;

    let actions = groom::diff(&edited, &original_ids);
    let summary = app.service_mut().apply_groom(&actions).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&summary)?,
        OutputMode::Text => {
            for id in &summary.created {
                output::print_message(&format!("Created {id}"))?;
            }
            output::print_message(&format!(
                "Groomed: {} resolved, {} created, {} unchanged",
                summary.resolved.len(),
                summary.created.len(),
                summary.unchanged.len()
            ))?;
        }
    }
    Ok(())
}

// ========== Transitions ==========

/// Execute the start command
pub async fn execute_start(app: &mut App, args: &IdArgs, output_mode: OutputMode) -> Result<()> {
    app.service_mut().start_issue(&args.id).await?;
    report(&args.id, &format!("Started {}", args.id), output_mode)
}

/// Execute the done command
pub async fn execute_done(app: &mut App, args: &DoneArgs, output_mode: OutputMode) -> Result<()> {
    if !args.recursive {
        app.service_mut().done_issue(&args.id, args.force).await?;
        return report(&args.id, &format!("Done {}", args.id), output_mode);
    }

    let closed = app
        .service_mut()
        .done_issue_recursive(&args.id, args.force)
        .await?;
    match output_mode {
        OutputMode::Json => output::print_json(&json!({ "done": closed }))?,
        OutputMode::Text => {
            for id in &closed {
                output::print_message(&format!("Done {id}"))?;
            }
        }
    }
    Ok(())
}

/// Execute the blocked command
pub async fn execute_blocked(app: &mut App, args: &BlockedArgs, output_mode: OutputMode) -> Result<()> {
    app.service_mut().block_issue(&args.id, &args.reason).await?;
    report(&args.id, &format!("Blocked {}", args.id), output_mode)
}

/// Execute the unblock command
pub async fn execute_unblock(app: &mut App, args: &UnblockArgs, output_mode: OutputMode) -> Result<()> {
    app.service_mut().unblock_issue(&args.id, &args.message).await?;
    report(&args.id, &format!("Unblocked {}", args.id), output_mode)
}

/// Execute the handoff command
pub async fn execute_handoff(app: &mut App, args: &HandoffArgs, output_mode: OutputMode) -> Result<()> {
    app.service_mut()
        .handoff_issue(&args.id, &args.status, &args.completed, &args.remaining)
        .await?;
    report(&args.id, &format!("Handed off {}", args.id), output_mode)
}

// ========== Annotations ==========

/// Execute the comment command
pub async fn execute_comment(app: &mut App, args: &CommentArgs, output_mode: OutputMode) -> Result<()> {
    app.service_mut()
        .record_annotation(&args.id, AnnotationType::Comment, &args.message)
        .await?;
    report(&args.id, &format!("Commented on {}", args.id), output_mode)
}

/// Execute the record command
pub async fn execute_record(app: &mut App, args: &RecordArgs, output_mode: OutputMode) -> Result<()> {
    let kind = AnnotationType::from(args.kind);
    app.service_mut()
        .record_annotation(&args.id, kind, &args.message)
        .await?;
    report(&args.id, &format!("Recorded {kind} on {}", args.id), output_mode)
}

// ========== Edits ==========

/// Execute the update command
pub async fn execute_update(app: &mut App, args: &UpdateArgs, output_mode: OutputMode) -> Result<()> {
    let (title, body) = if args.title.is_none() && args.body.is_none() {
        let issue = app.service().get_issue(&args.id).await?;
        let edited = editor::edit(&edit::template(&issue.title, issue.body.as_deref()), ".md").await?;
        let (title, body) = edit::parse(&edited)?;
        (Some(title), Some(body.unwrap_or_default()))
    } else {
        let body = editor::resolve_dash(args.body.as_deref()).await?;
        (args.title.clone(), body)
    };

    app.service_mut()
        .update_issue(&args.id, title.as_deref(), body.as_deref())
        .await?;
    report(&args.id, &format!("Updated {}", args.id), output_mode)
}

/// Execute the delete command
pub async fn execute_delete(app: &mut App, args: &IdArgs, output_mode: OutputMode) -> Result<()> {
    app.service_mut().delete_issue(&args.id).await?;
    report(&args.id, &format!("Deleted {}", args.id), output_mode)
}

/// Execute the reparent command
pub async fn execute_reparent(app: &mut App, args: &ReparentArgs, output_mode: OutputMode) -> Result<()> {
    let new_id = app
        .service_mut()
        .reparent_issue(&args.id, args.parent.as_ref())
        .await?;
    moved(&args.id, &new_id, output_mode)
}

/// Execute the promote command
pub async fn execute_promote(app: &mut App, args: &PromoteArgs, output_mode: OutputMode) -> Result<()> {
    let new_id = app
        .service_mut()
        .promote_issue(&args.id, args.issue_type.map(IssueType::from), args.parent.as_ref())
        .await?;
    moved(&args.id, &new_id, output_mode)
}

fn moved(from: &IssueId, to: &IssueId, output_mode: OutputMode) -> Result<()> {
    match output_mode {
        OutputMode::Json => output::print_json(&json!({ "from": from, "to": to }))?,
        OutputMode::Text => output::print_message(&format!("Moved {from} -> {to}"))?,
    }
    Ok(())
}

// ========== Queries ==========

/// Execute the view command
pub async fn execute_view(app: &App, args: &IdArgs, output_mode: OutputMode) -> Result<()> {
    let ctx = app.service().get_issue_with_context(&args.id).await?;
    match output_mode {
        OutputMode::Json => output::print_json(&ctx)?,
        OutputMode::Text => {
            let mut stdout = std::io::stdout().lock();
            output::write_context(&mut stdout, &ctx, &OutputConfig::from_env())?;
        }
    }
    Ok(())
}

/// Execute the digest command
pub async fn execute_digest(app: &App, args: &IdArgs, output_mode: OutputMode) -> Result<()> {
    let (parent, children) = app.service().get_issue_with_children(&args.id).await?;
    match output_mode {
        OutputMode::Json => output::print_json(&json!({ "parent": parent, "children": children }))?,
        OutputMode::Text => {
            let mut stdout = std::io::stdout().lock();
            output::write_digest(&mut stdout, &parent, &children, &OutputConfig::from_env())?;
        }
    }
    Ok(())
}

/// Execute the tree command
pub async fn execute_tree(app: &App, args: &TreeArgs, output_mode: OutputMode) -> Result<()> {
    let (hierarchy, backlog) = app
        .service()
        .get_issue_tree_with_backlog(args.id.as_ref())
        .await?;
    match output_mode {
        OutputMode::Json => output::print_json(&json!({ "hierarchy": hierarchy, "backlog": backlog }))?,
        OutputMode::Text => print!("{}", tree_text(&hierarchy, &backlog, &OutputConfig::from_env())),
    }
    Ok(())
}

/// Execute the backlog command
pub async fn execute_backlog(app: &App, output_mode: OutputMode) -> Result<()> {
    let backlog = app.service().get_backlog_issues().await?;
    match output_mode {
        OutputMode::Json => output::print_json(&backlog)?,
        OutputMode::Text if backlog.is_empty() => output::print_message("Backlog is empty")?,
        OutputMode::Text => print!("{}", output::render_backlog(&backlog, &OutputConfig::from_env())),
    }
    Ok(())
}

fn tree_text(
    hierarchy: &[crate::domain::Issue],
    backlog: &[crate::domain::Issue],
    config: &OutputConfig,
) -> String {
    let mut text = output::render_tree(hierarchy, config);
    let backlog = output::render_backlog(backlog, config);
    if !text.is_empty() && !backlog.is_empty() {
        text.push('\n');
    }
    text.push_str(&backlog);
    text
}

// ========== Watch ==========

/// Clears the terminal and redraws the tree.
struct TreeView<'a> {
    service: &'a IssueService,
    root: Option<IssueId>,
    interval: u64,
    config: OutputConfig,
}

impl TreeView<'_> {
    fn header(&self) -> String {
        let target = self
            .root
            .as_ref()
            .map(|id| format!(" {id}"))
            .unwrap_or_default();
        format!(
            "Every {}s: tw tree{target}  {}\n\n",
            self.interval,
            format_timestamp(&now())
        )
    }
}

#[async_trait]
impl<'a> Refresh for TreeView<'a> {
    async fn refresh(&mut self) -> crate::error::Result<()> {
        let result = self
            .service
            .get_issue_tree_with_backlog(self.root.as_ref())
            .await;

        let mut screen = String::from("\x1b[2J\x1b[H");
        screen.push_str(&self.header());
        let outcome = match result {
            Ok((hierarchy, backlog)) => {
                screen.push_str(&tree_text(&hierarchy, &backlog, &self.config));
                Ok(())
            }
            Err(e) => {
                screen.push_str(&format!("error: {e}\n"));
                Err(e)
            }
        };

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(screen.as_bytes())?;
        stdout.flush()?;
        outcome
    }
}

/// Execute the watch command
pub async fn execute_watch(app: &App, args: &WatchArgs, _output_mode: OutputMode) -> Result<()> {
    let options = WatchOptions::every(args.interval)?;
    let service = app.service();

    let target = match service.storage().watch_target().await {
        Ok(target) => target,
        Err(e) => {
            tracing::warn!(error = %e, "cannot locate store files, polling only");
            None
        }
    };

    let mut view = TreeView {
        service,
        root: args.id.clone(),
        interval: args.interval,
        config: OutputConfig::from_env(),
    };
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    WatchLoop::new(target, options).run(&mut view, shutdown).await?;
    Ok(())
}

//! `$EDITOR` round-trips and stdin input.

use std::io::Write;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncReadExt;

const DEFAULT_EDITOR: &str = "vi";

/// Open `initial` in `$EDITOR` and return what was saved.
pub(crate) async fn edit(initial: &str, suffix: &str) -> Result<String> {
    let editor = std::env::var("EDITOR")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_EDITOR.to_string());

    let mut file = tempfile::Builder::new()
        .prefix("tw-")
        .suffix(suffix)
        .tempfile()
        .context("failed to create temporary file")?;
    file.write_all(initial.as_bytes())?;
    file.flush()?;

    let mut words = editor.split_whitespace();
    let program = words.next().unwrap_or(DEFAULT_EDITOR);
    tracing::debug!(%editor, path = %file.path().display(), "opening editor");

    let status = tokio::process::Command::new(program)
        .args(words)
        .arg(file.path())
        .status()
        .await
        .with_context(|| format!("failed to run editor '{editor}'"))?;
    if !status.success() {
        bail!("editor '{editor}' exited with {status}");
    }

    Ok(tokio::fs::read_to_string(file.path()).await?)
}

/// Everything on stdin.
pub(crate) async fn read_stdin() -> Result<String> {
    let mut text = String::new();
    tokio::io::stdin().read_to_string(&mut text).await?;
    Ok(text)
}

/// Replace a literal `-` with stdin.
pub(crate) async fn resolve_dash(value: Option<&str>) -> Result<Option<String>> {
    match value {
        Some("-") => Ok(Some(read_stdin().await?)),
        other => Ok(other.map(str::to_string)),
    }
}

//! Process seam for the `task` binary.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Runs one `task` invocation.
///
/// The adapter only ever speaks to TaskWarrior through this trait, so tests
/// can swap in [`FakeTaskWarrior`](super::FakeTaskWarrior) and production
/// uses [`TaskCli`].
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Run `task <args>`, feeding `stdin` if given, and return stdout.
    ///
    /// # Errors
    ///
    /// `Error::Backend` carrying stderr when the command exits non-zero.
    async fn run(&self, args: &[String], stdin: Option<&str>) -> Result<String>;
}

/// Runs the real `task` executable found on `PATH`.
#[derive(Debug, Clone)]
pub struct TaskCli {
    program: String,
}

impl TaskCli {
    /// Use `task` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: "task".to_string(),
        }
    }

    /// Use a specific executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for TaskCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskRunner for TaskCli {
    async fn run(&self, args: &[String], stdin: Option<&str>) -> Result<String> {
        tracing::debug!(program = %self.program, args = %args.join(" "), "running task");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Backend(format!("failed to run '{}': {e}", self.program)))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            // Closing the pipe signals end of input.
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Backend(format!(
                "{} {} exited with {}: {}",
                self.program,
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

//! External command execution.
//!
//! Every host-tool invocation in the orchestrator goes through the
//! [`CommandRunner`] trait so tests can substitute deterministic fakes.
//! The production implementation is [`HostCommandRunner`], backed by
//! `tokio::process`.

use async_trait::async_trait;
use tokio::process::Command;

use crate::errors::{NodeupError, NodeupResult};

/// Runs an external program and captures its combined output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, returning combined stdout + stderr.
    ///
    /// A non-zero exit status is an error; the returned
    /// [`NodeupError::Command`] carries the full command line and the
    /// captured output for diagnostics.
    async fn run(&self, program: &str, args: &[&str]) -> NodeupResult<Vec<u8>>;
}

/// Render a command line for logs and error messages.
pub(crate) fn render_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Production [`CommandRunner`] that spawns real host processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostCommandRunner;

#[async_trait]
impl CommandRunner for HostCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> NodeupResult<Vec<u8>> {
        let rendered = render_command(program, args);
        tracing::info!(command = %rendered, "running captured");

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| NodeupError::Command {
                command: rendered.clone(),
                detail: format!("failed to spawn: {}", e),
            })?;

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        if !output.status.success() {
            return Err(NodeupError::Command {
                command: rendered,
                detail: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&combined).trim()
                ),
            });
        }

        Ok(combined)
    }
}

/// Run a network-facing command with a bounded linear retry budget.
///
/// Each failed attempt is logged; once the budget is exhausted the last
/// error is surfaced unchanged.
pub async fn run_with_retries(
    runner: &dyn CommandRunner,
    budget: u32,
    program: &str,
    args: &[&str],
) -> NodeupResult<Vec<u8>> {
    let mut last_err = None;
    for attempt in 1..=budget {
        match runner.run(program, args).await {
            Ok(out) => return Ok(out),
            Err(e) => {
                tracing::warn!(
                    attempt,
                    budget,
                    command = %render_command(program, args),
                    error = %e,
                    "command failed"
                );
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| NodeupError::Command {
        command: render_command(program, args),
        detail: "retry budget was zero".to_string(),
    }))
}

//! Power-state inhibition during update operations.
//!
//! Wraps `systemd-inhibit` around a long-lived sleep so the host cannot
//! shut down, sleep, or react to power keys while a reconciliation is in
//! flight. Release is guaranteed on every exit path: [`PowerInhibitor`]
//! is an RAII guard whose `Drop` kills the child, so early returns,
//! `?`-propagation, and panics all release the inhibit.

use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::constants::bin;
use crate::errors::{NodeupError, NodeupResult};

const INHIBIT_MODES: &str =
    "shutdown:sleep:idle:handle-power-key:handle-suspend-key:handle-hibernate-key:handle-lid-switch";

/// Scoped power-state inhibit, held for as long as the guard lives.
#[derive(Debug)]
pub struct PowerInhibitor {
    child: Option<Child>,
}

impl PowerInhibitor {
    /// Start the inhibitor child process.
    pub async fn acquire() -> NodeupResult<Self> {
        tracing::info!("inhibiting power state changes via systemd");
        Self::spawn(
            bin::SYSTEMD_INHIBIT,
            &[
                &format!("--what={}", INHIBIT_MODES),
                &format!("--who=nodeup pid {}", std::process::id()),
                "--why=OS update in progress",
                "/bin/sleep",
                "infinity",
            ],
        )
    }

    fn spawn(program: &str, args: &[&str]) -> NodeupResult<Self> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| NodeupError::Command {
                command: crate::cmd::render_command(program, args),
                detail: format!("failed to spawn: {}", e),
            })?;
        Ok(Self { child: Some(child) })
    }

    /// Explicitly release the inhibit and reap the child.
    pub async fn release(mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::info!("releasing systemd inhibitor");
            if let Err(e) = child.start_kill() {
                tracing::warn!(error = %e, "failed to signal inhibitor child");
            }
            let _ = child.wait().await;
        }
        tracing::info!("released systemd inhibitor");
    }
}

impl Drop for PowerInhibitor {
    fn drop(&mut self) {
        // Best-effort: kill_on_drop reaps the child if this signal is
        // missed. Only reached when release() was not called.
        if let Some(child) = &mut self.child {
            tracing::info!("releasing systemd inhibitor on drop");
            let _ = child.start_kill();
        }
    }
}

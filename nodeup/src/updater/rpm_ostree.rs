//! rpm-ostree backed implementation of [`NodeUpdater`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::cmd::CommandRunner;
use crate::constants::{bin, origin, paths};
use crate::errors::{NodeupError, NodeupResult};
use crate::resolve::CommitResolver;

use super::{quote_space_split, Deployment, KargOp, KernelArgument, NodeUpdater};

/// Top-level shape of `rpm-ostree status --json`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RpmOstreeState {
    deployments: Vec<Deployment>,
}

/// Scan an ordered deployment list for the booted entry.
///
/// A healthy host has exactly one `booted` deployment. Should the host
/// tool ever report more than one, the first in list order wins — a
/// deterministic tie-break rather than an assumption that single-boot is
/// guaranteed. Zero booted entries is a host-state error; the host is
/// running, so one of its deployments must be booted.
fn booted_deployment_from_state(state: RpmOstreeState) -> NodeupResult<Deployment> {
    state
        .deployments
        .into_iter()
        .find(|d| d.booted)
        .ok_or_else(|| NodeupError::HostState("not currently booted in a deployment".to_string()))
}

/// [`NodeUpdater`] for CoreOS-variant hosts, wrapping `rpm-ostree`.
///
/// Single-threaded from the caller's perspective: every operation blocks
/// (awaits) for the duration of the external command it wraps. The design
/// assumes at most one reconciliation in flight per host.
pub struct RpmOstreeClient {
    runner: Arc<dyn CommandRunner>,
}

impl RpmOstreeClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn run(&self, noun: &str, args: &[&str]) -> NodeupResult<Vec<u8>> {
        let mut full: Vec<&str> = Vec::with_capacity(args.len() + 1);
        full.push(noun);
        full.extend_from_slice(args);
        self.runner.run(bin::RPM_OSTREE, &full).await
    }

    /// Whether `arg` is a prefix of any currently active kernel argument.
    async fn is_kernel_arg_in_use(&self, arg: &str) -> NodeupResult<bool> {
        let current = self.get_kernel_args().await?;
        Ok(current.iter().any(|v| v.starts_with(arg)))
    }
}

#[async_trait]
impl NodeUpdater for RpmOstreeClient {
    async fn get_booted_deployment(&self) -> NodeupResult<Deployment> {
        let output = self.run("status", &["--json"]).await?;
        let state: RpmOstreeState = serde_json::from_slice(&output).map_err(|e| {
            let raw = String::from_utf8_lossy(&output);
            tracing::error!(error = %e, output = %raw, "malformed rpm-ostree status output");
            NodeupError::Parse {
                command: format!("{} status --json", bin::RPM_OSTREE),
                detail: format!("{}; output: {}", e, raw),
            }
        })?;
        booted_deployment_from_state(state)
    }

    async fn get_booted_os_image_url(&self) -> NodeupResult<(String, String)> {
        let booted = self.get_booted_deployment().await?;
        Ok((booted.image_url(), booted.version))
    }

    async fn get_status(&self) -> NodeupResult<String> {
        let output = self.run("status", &[]).await?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn get_kernel_args(&self) -> NodeupResult<Vec<String>> {
        let output = self.run("kargs", &[]).await?;
        Ok(quote_space_split(&String::from_utf8_lossy(&output)))
    }

    async fn rebase(&self, image_url: &str, content_dir: &Path) -> NodeupResult<bool> {
        // Previous state is read for continuity logging only; it does not
        // gate the rebase.
        let booted = self.get_booted_deployment().await?;
        let previous = booted.image_url();
        if !previous.is_empty() {
            tracing::info!(previous = %previous, "previous pivot");
        } else if let Some(custom) = booted.custom_origin.first() {
            tracing::info!(origin = %custom, "previous custom origin");
        } else {
            tracing::info!("current origin is not custom");
        }

        tracing::info!(image = %image_url, "updating OS");

        let repo = content_dir.join(paths::OS_REPO_SUBDIR);
        let resolver = CommitResolver::new(Arc::clone(&self.runner));
        let resolved = resolver.resolve(image_url, &repo).await?;

        match &resolved.version {
            Some(version) => {
                tracing::info!(version = %version, checksum = %resolved.checksum, "pivoting")
            }
            None => tracing::info!(checksum = %resolved.checksum, "pivoting"),
        }

        // Recorded as the origin spec so a later get_booted_os_image_url
        // can recover the image reference.
        let custom_origin = format!("{}{}", origin::PIVOT_SCHEME, image_url);
        let repo_spec = format!("{}:{}", repo.display(), resolved.checksum);
        tracing::info!(
            repo = %repo.display(),
            custom_origin = %custom_origin,
            checksum = %resolved.checksum,
            "executing rebase"
        );

        self.run(
            "rebase",
            &[
                "--experimental",
                &repo_spec,
                "--custom-origin-url",
                &custom_origin,
                "--custom-origin-description",
                origin::DESCRIPTION,
            ],
        )
        .await?;

        // Reaching the rebase step implies a target distinct from an
        // already-applied one was resolved.
        Ok(true)
    }

    async fn set_kernel_args(&self, args: &[KernelArgument]) -> NodeupResult<String> {
        let mut flags: Vec<String> = Vec::new();
        for request in args {
            // A composite quoted value reconciles as N independent tokens.
            for token in quote_space_split(&request.arg) {
                match request.op {
                    KargOp::Append => flags.push(format!("--append={}", token)),
                    KargOp::Delete => {
                        if self.is_kernel_arg_in_use(&token).await? {
                            flags.push(format!("--delete={}", token));
                        }
                    }
                }
            }
        }

        // Nothing to change: do not issue an empty kargs invocation.
        if flags.is_empty() {
            return Ok(String::new());
        }

        let flag_refs: Vec<&str> = flags.iter().map(|f| f.as_str()).collect();
        let output = self.run("kargs", &flag_refs).await?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn remove_pending_deployment(&self) -> NodeupResult<()> {
        self.run("cleanup", &["-p"]).await?;
        Ok(())
    }

    async fn run_rpm_ostree(&self, noun: &str, args: &[&str]) -> NodeupResult<Vec<u8>> {
        self.run(noun, args).await
    }
}

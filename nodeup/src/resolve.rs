//! Resolution of a desired image reference to a concrete OS commit.
//!
//! Registries vary in whether they expose commit metadata without a full
//! pull, so resolution is a cascade of inspection sources tried in order:
//!
//! 1. direct metadata inspection (skopeo, no layer transfer) — a failure
//!    here means "unavailable", fall through;
//! 2. pull the image (bounded retries) and inspect it locally (podman) —
//!    failures here are hard errors; the pulled image is always removed
//!    afterwards, best-effort;
//! 3. if neither source yields the commit label: treat the local ostree
//!    repository as the source of truth — exactly one ref resolves,
//!    anything else is an unrecoverable ambiguity.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::cmd::{run_with_retries, CommandRunner};
use crate::constants::{bin, labels, paths, retry};
use crate::errors::{NodeupError, NodeupResult};

/// Transient result of inspecting an image's metadata.
///
/// Only the OS-commit-checksum and display-version labels are
/// semantically significant; everything else is discarded once they are
/// extracted.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ImageInspection {
    pub digest: String,
    pub repo_digests: Vec<String>,
    pub labels: Option<HashMap<String, String>>,
    pub architecture: String,
    pub os: String,
}

impl ImageInspection {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .as_ref()
            .and_then(|l| l.get(name))
            .map(|v| v.as_str())
    }
}

/// A resolved OS commit, plus the display version when the image
/// supplied one (used only for log messages).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommit {
    pub checksum: String,
    pub version: Option<String>,
}

/// One way of obtaining image metadata.
///
/// `Ok(None)` means this source is unavailable and the next one should be
/// tried; `Err` aborts the whole resolution.
#[async_trait]
pub trait InspectSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn inspect(
        &self,
        runner: &dyn CommandRunner,
        image_url: &str,
    ) -> NodeupResult<Option<ImageInspection>>;
}

/// Direct registry inspection via skopeo. No layers are transferred.
///
/// Any failure (registry without metadata support, auth, network) is
/// treated as "unavailable" so the pull fallback gets its chance.
pub struct DirectInspect;

#[async_trait]
impl InspectSource for DirectInspect {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn inspect(
        &self,
        runner: &dyn CommandRunner,
        image_url: &str,
    ) -> NodeupResult<Option<ImageInspection>> {
        let reference = format!("docker://{}", image_url);
        let output = match runner.run(bin::SKOPEO, &["inspect", &reference]).await {
            Ok(output) => output,
            Err(e) => {
                tracing::info!(error = %e, "direct inspect unavailable, falling back");
                return Ok(None);
            }
        };
        let inspection: ImageInspection = serde_json::from_slice(&output).map_err(|e| {
            let raw = String::from_utf8_lossy(&output);
            tracing::error!(error = %e, output = %raw, "malformed skopeo inspect output");
            NodeupError::Parse {
                command: format!("{} inspect {}", bin::SKOPEO, reference),
                detail: format!("{}; output: {}", e, raw),
            }
        })?;
        Ok(Some(inspection))
    }
}

/// Pull the image (retried; pulls are network operations subject to
/// transient failure), then inspect the pulled copy locally.
pub struct PulledInspect {
    authfile: std::path::PathBuf,
}

impl Default for PulledInspect {
    fn default() -> Self {
        Self {
            authfile: std::path::PathBuf::from(paths::KUBELET_AUTH_FILE),
        }
    }
}

impl PulledInspect {
    /// Use a specific pull-secret path. Used by tests.
    pub fn with_authfile(authfile: impl Into<std::path::PathBuf>) -> Self {
        Self {
            authfile: authfile.into(),
        }
    }

    async fn pull_and_inspect(
        &self,
        runner: &dyn CommandRunner,
        image_url: &str,
    ) -> NodeupResult<ImageInspection> {
        let authfile = self.authfile.to_string_lossy().into_owned();
        let mut pull_args: Vec<&str> = vec!["pull", "-q"];
        if self.authfile.exists() {
            pull_args.push("--authfile");
            pull_args.push(authfile.as_str());
        }
        pull_args.push(image_url);

        run_with_retries(runner, retry::NET_COMMANDS, bin::PODMAN, &pull_args).await?;

        let output = runner
            .run(bin::PODMAN, &["inspect", "--type=image", image_url])
            .await?;
        // podman inspect emits a one-element array for a single image.
        let mut parsed: Vec<ImageInspection> = serde_json::from_slice(&output).map_err(|e| {
            let raw = String::from_utf8_lossy(&output);
            tracing::error!(error = %e, output = %raw, "malformed podman inspect output");
            NodeupError::Parse {
                command: format!("{} inspect --type=image {}", bin::PODMAN, image_url),
                detail: format!("{}; output: {}", e, raw),
            }
        })?;
        parsed.pop().ok_or_else(|| NodeupError::Parse {
            command: format!("{} inspect --type=image {}", bin::PODMAN, image_url),
            detail: "empty inspection array".to_string(),
        })
    }
}

#[async_trait]
impl InspectSource for PulledInspect {
    fn name(&self) -> &'static str {
        "pulled"
    }

    async fn inspect(
        &self,
        runner: &dyn CommandRunner,
        image_url: &str,
    ) -> NodeupResult<Option<ImageInspection>> {
        tracing::info!(image = %image_url, "falling back to pulled inspect");
        let result = self.pull_and_inspect(runner, image_url).await;

        // Best-effort cleanup of the pulled image, regardless of outcome.
        // A cleanup failure never overrides the primary result.
        if let Err(e) = runner.run(bin::PODMAN, &["rmi", image_url]).await {
            tracing::warn!(image = %image_url, error = %e, "failed to remove pulled image");
        }

        result.map(Some)
    }
}

/// Resolves an image reference to an OS commit through the ordered
/// inspection-source cascade, with the local repository as final
/// fallback.
pub struct CommitResolver {
    runner: Arc<dyn CommandRunner>,
    sources: Vec<Box<dyn InspectSource>>,
}

impl CommitResolver {
    /// Resolver with the production cascade: direct inspect, then pulled
    /// inspect.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_sources(
            runner,
            vec![Box::new(DirectInspect), Box::new(PulledInspect::default())],
        )
    }

    /// Resolver with an explicit source list. Used by tests to exercise
    /// the cascade strategy-by-strategy.
    pub fn with_sources(runner: Arc<dyn CommandRunner>, sources: Vec<Box<dyn InspectSource>>) -> Self {
        Self { runner, sources }
    }

    /// Resolve `image_url` to an OS commit, consulting the ostree
    /// repository at `repo` when the image supplies no commit label.
    pub async fn resolve(&self, image_url: &str, repo: &Path) -> NodeupResult<ResolvedCommit> {
        let mut checksum: Option<String> = None;
        let mut version: Option<String> = None;

        for source in &self.sources {
            if let Some(inspection) = source.inspect(self.runner.as_ref(), image_url).await? {
                tracing::debug!(source = source.name(), "image metadata obtained");
                checksum = inspection.label(labels::OSTREE_COMMIT).map(|s| s.to_string());
                version = inspection.label(labels::VERSION).map(|s| s.to_string());
                break;
            }
        }

        let checksum = match checksum {
            Some(checksum) => checksum,
            None => {
                tracing::info!(
                    label = labels::OSTREE_COMMIT,
                    repo = %repo.display(),
                    "no commit label in image metadata, inspecting local repository"
                );
                self.resolve_from_repo(repo).await?
            }
        };

        Ok(ResolvedCommit { checksum, version })
    }

    /// Final fallback: exactly one ref in the local repository resolves
    /// to the commit; zero or many is an unrecoverable ambiguity.
    async fn resolve_from_repo(&self, repo: &Path) -> NodeupResult<String> {
        let repo_arg = repo.display().to_string();
        let output = self
            .runner
            .run(bin::OSTREE, &["refs", "--repo", &repo_arg])
            .await?;
        let text = String::from_utf8_lossy(&output);
        let refs: Vec<&str> = text
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();

        match refs.as_slice() {
            [single] => {
                tracing::info!(reference = %single, "using repository ref");
                let output = self
                    .runner
                    .run(bin::OSTREE, &["rev-parse", "--repo", &repo_arg, single])
                    .await?;
                Ok(String::from_utf8_lossy(&output).trim().to_string())
            }
            [] => Err(NodeupError::HostState("no refs found in repo".to_string())),
            _ => Err(NodeupError::HostState(
                "multiple refs found in repo".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;

    fn inspection_json(commit: Option<&str>, version: Option<&str>) -> String {
        let mut labels = Vec::new();
        if let Some(commit) = commit {
            labels.push(format!(r#""com.coreos.ostree-commit": "{}""#, commit));
        }
        if let Some(version) = version {
            labels.push(format!(r#""version": "{}""#, version));
        }
        format!(
            r#"{{"Digest": "sha256:d1", "RepoDigests": [], "Labels": {{{}}},
                "Architecture": "amd64", "Os": "linux"}}"#,
            labels.join(", ")
        )
    }

    fn resolver(runner: FakeRunner) -> (CommitResolver, Arc<FakeRunner>) {
        let shared = Arc::new(runner);
        let resolver = CommitResolver::new(Arc::clone(&shared) as Arc<dyn CommandRunner>);
        (resolver, shared)
    }

    #[tokio::test]
    async fn test_direct_inspect_short_circuits_cascade() {
        let runner = FakeRunner::new();
        runner.on_ok(
            bin::SKOPEO,
            &["inspect"],
            inspection_json(Some("commit-a"), Some("47.1")).as_bytes(),
        );
        let (resolver, fake) = resolver(runner);

        let resolved = resolver
            .resolve("registry.example/os:v2", Path::new("/ostree/repo"))
            .await
            .expect("direct inspect supplies the label");
        assert_eq!(resolved.checksum, "commit-a");
        assert_eq!(resolved.version.as_deref(), Some("47.1"));

        // Neither the pull fallback nor the repository fallback ran.
        assert_eq!(fake.count(bin::PODMAN, &[]), 0);
        assert_eq!(fake.count(bin::OSTREE, &[]), 0);
    }

    #[tokio::test]
    async fn test_pull_fallback_on_direct_failure() {
        let runner = FakeRunner::new();
        runner.on_err(bin::SKOPEO, &["inspect"], "registry refused metadata");
        runner.on_ok(bin::PODMAN, &["pull"], b"");
        runner.on_ok(
            bin::PODMAN,
            &["inspect"],
            format!("[{}]", inspection_json(Some("commit-b"), None)).as_bytes(),
        );
        runner.on_ok(bin::PODMAN, &["rmi"], b"");
        let (resolver, fake) = resolver(runner);

        let resolved = resolver
            .resolve("registry.example/os:v2", Path::new("/ostree/repo"))
            .await
            .expect("pulled inspect supplies the label");
        assert_eq!(resolved.checksum, "commit-b");
        assert_eq!(resolved.version, None);

        // The pulled image was discarded afterwards.
        assert_eq!(fake.count(bin::PODMAN, &["rmi"]), 1);
        assert_eq!(fake.count(bin::OSTREE, &[]), 0);
    }

    #[tokio::test]
    async fn test_pull_retries_bounded_then_error() {
        let runner = FakeRunner::new();
        runner.on_err(bin::SKOPEO, &["inspect"], "unavailable");
        runner.fail_times(bin::PODMAN, &["pull"], 10, "network down");
        runner.on_ok(bin::PODMAN, &["rmi"], b"");
        let (resolver, fake) = resolver(runner);

        let err = resolver
            .resolve("registry.example/os:v2", Path::new("/ostree/repo"))
            .await
            .expect_err("pull budget exhausted");
        assert!(matches!(err, NodeupError::Command { .. }));
        assert_eq!(fake.count(bin::PODMAN, &["pull"]), 5);
    }

    #[tokio::test]
    async fn test_cleanup_failure_never_overrides_result() {
        let runner = FakeRunner::new();
        runner.on_err(bin::SKOPEO, &["inspect"], "unavailable");
        runner.on_ok(bin::PODMAN, &["pull"], b"");
        runner.on_ok(
            bin::PODMAN,
            &["inspect"],
            format!("[{}]", inspection_json(Some("commit-c"), None)).as_bytes(),
        );
        runner.on_err(bin::PODMAN, &["rmi"], "image busy");
        let (resolver, _) = resolver(runner);

        let resolved = resolver
            .resolve("registry.example/os:v2", Path::new("/ostree/repo"))
            .await
            .expect("rmi failure is logged, not propagated");
        assert_eq!(resolved.checksum, "commit-c");
    }

    #[tokio::test]
    async fn test_missing_label_falls_back_to_single_repo_ref() {
        let runner = FakeRunner::new();
        runner.on_ok(
            bin::SKOPEO,
            &["inspect"],
            inspection_json(None, Some("47.1")).as_bytes(),
        );
        runner.on_ok(bin::OSTREE, &["refs"], b"rhcos/47\n");
        runner.on_ok(bin::OSTREE, &["rev-parse"], b"commit-d\n");
        let (resolver, fake) = resolver(runner);

        let resolved = resolver
            .resolve("registry.example/os:v2", Path::new("/ostree/repo"))
            .await
            .expect("single ref resolves");
        assert_eq!(resolved.checksum, "commit-d");
        // Version from the image labels is still carried for logging.
        assert_eq!(resolved.version.as_deref(), Some("47.1"));

        // Direct inspect succeeded (without the label), so the pull
        // fallback must not have run.
        assert_eq!(fake.count(bin::PODMAN, &[]), 0);
        let calls = fake.calls();
        assert_eq!(
            calls.last().map(|(_, args)| args[3].clone()),
            Some("rhcos/47".to_string())
        );
    }

    #[tokio::test]
    async fn test_ambiguous_repo_refs_fail_resolution() {
        let runner = FakeRunner::new();
        runner.on_ok(bin::SKOPEO, &["inspect"], inspection_json(None, None).as_bytes());
        runner.on_ok(bin::OSTREE, &["refs"], b"ref-a\nref-b\n");
        let (resolver, _) = resolver(runner);

        let err = resolver
            .resolve("registry.example/os:v2", Path::new("/ostree/repo"))
            .await
            .expect_err("two refs are ambiguous");
        assert!(matches!(err, NodeupError::HostState(_)));
    }

    #[tokio::test]
    async fn test_empty_repo_fails_resolution() {
        let runner = FakeRunner::new();
        runner.on_ok(bin::SKOPEO, &["inspect"], inspection_json(None, None).as_bytes());
        runner.on_ok(bin::OSTREE, &["refs"], b"\n");
        let (resolver, _) = resolver(runner);

        let err = resolver
            .resolve("registry.example/os:v2", Path::new("/ostree/repo"))
            .await
            .expect_err("zero refs cannot be resolved");
        assert!(matches!(err, NodeupError::HostState(_)));
    }
}

//! [`NodeUpdater`] stub for hosts without atomic update support.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::constants::paths;
use crate::errors::{NodeupError, NodeupResult};

use super::{Deployment, KernelArgument, NodeUpdater};

/// Capability-set stub for non-CoreOS hosts.
///
/// Presents the identical surface as the real client so reconciliation
/// logic never branches on host type. Every mutating operation fails with
/// the single [`NodeupError::Unsupported`] sentinel; the stub never
/// invokes an external command.
pub struct UnsupportedHostClient {
    cmdline_path: PathBuf,
}

impl Default for UnsupportedHostClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UnsupportedHostClient {
    pub fn new() -> Self {
        Self {
            cmdline_path: PathBuf::from(paths::CMDLINE_FILE),
        }
    }

    /// Read the kernel command line from a specific file. Used by tests.
    pub fn with_cmdline_path(path: impl Into<PathBuf>) -> Self {
        Self {
            cmdline_path: path.into(),
        }
    }
}

#[async_trait]
impl NodeUpdater for UnsupportedHostClient {
    async fn get_booted_deployment(&self) -> NodeupResult<Deployment> {
        // Callers expect some deployment to exist structurally even on
        // hosts with no deployment concept.
        Ok(Deployment::default())
    }

    async fn get_booted_os_image_url(&self) -> NodeupResult<(String, String)> {
        Err(NodeupError::Unsupported)
    }

    async fn get_status(&self) -> NodeupResult<String> {
        Err(NodeupError::Unsupported)
    }

    async fn get_kernel_args(&self) -> NodeupResult<Vec<String>> {
        // The live kernel command line comes straight from the kernel's
        // boot-parameter exposure point; no quote-awareness needed since
        // this path does not originate from rpm-ostree's tokenizer.
        let content = tokio::fs::read_to_string(&self.cmdline_path).await?;
        Ok(content
            .trim_end_matches('\n')
            .split(' ')
            .map(|s| s.to_string())
            .collect())
    }

    async fn rebase(&self, _image_url: &str, _content_dir: &Path) -> NodeupResult<bool> {
        tracing::info!("rebase is not supported on this system");
        Err(NodeupError::Unsupported)
    }

    async fn set_kernel_args(&self, _args: &[KernelArgument]) -> NodeupResult<String> {
        Err(NodeupError::Unsupported)
    }

    async fn remove_pending_deployment(&self) -> NodeupResult<()> {
        Err(NodeupError::Unsupported)
    }

    async fn run_rpm_ostree(&self, _noun: &str, _args: &[&str]) -> NodeupResult<Vec<u8>> {
        Err(NodeupError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::mem::discriminant;

    #[tokio::test]
    async fn test_booted_deployment_is_zero_value_not_error() {
        let stub = UnsupportedHostClient::new();
        let d = stub
            .get_booted_deployment()
            .await
            .expect("zero-value deployment");
        assert_eq!(d, Deployment::default());
    }

    #[tokio::test]
    async fn test_all_mutating_operations_share_one_sentinel() {
        let stub = UnsupportedHostClient::new();
        let sentinel = discriminant(&NodeupError::Unsupported);

        let errs = vec![
            stub.rebase("img", Path::new("/tmp")).await.map(|_| ()),
            stub.set_kernel_args(&[KernelArgument::append("a=1")])
                .await
                .map(|_| ()),
            stub.remove_pending_deployment().await,
            stub.run_rpm_ostree("status", &[]).await.map(|_| ()),
            stub.get_status().await.map(|_| ()),
            stub.get_booted_os_image_url().await.map(|_| ()),
        ];
        for res in errs {
            let err = res.expect_err("stub operation must fail");
            assert_eq!(discriminant(&err), sentinel);
        }
    }

    #[tokio::test]
    async fn test_kernel_args_read_from_cmdline_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp cmdline");
        write!(file, "root=UUID=123 ro quiet\n").expect("write cmdline");

        let stub = UnsupportedHostClient::with_cmdline_path(file.path());
        let args = stub.get_kernel_args().await.expect("cmdline parse");
        assert_eq!(
            args,
            vec!["root=UUID=123".to_string(), "ro".to_string(), "quiet".to_string()]
        );
    }
}

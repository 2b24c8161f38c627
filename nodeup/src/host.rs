//! Host operating system identification and updater construction.
//!
//! Variant selection happens exactly once per process lifetime. Failing
//! to determine the host identity is fatal: the process cannot proceed
//! without knowing which capability profile to expose.

use std::path::Path;
use std::sync::Arc;

use crate::cmd::CommandRunner;
use crate::constants::paths;
use crate::errors::{NodeupError, NodeupResult};
use crate::updater::{NodeUpdater, RpmOstreeClient, UnsupportedHostClient};

/// Parsed subset of `/etc/os-release`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OsRelease {
    pub id: String,
    pub variant_id: Option<String>,
    pub name: Option<String>,
    pub version_id: Option<String>,
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

impl OsRelease {
    /// Parse os-release contents: `KEY=value` lines, values optionally
    /// double-quoted, `#` comments and blank lines ignored.
    pub fn parse(contents: &str) -> Self {
        let mut os = Self::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = unquote(value);
            match key.trim() {
                "ID" => os.id = value.to_string(),
                "VARIANT_ID" => os.variant_id = Some(value.to_string()),
                "NAME" => os.name = Some(value.to_string()),
                "VERSION_ID" => os.version_id = Some(value.to_string()),
                _ => {}
            }
        }
        os
    }

    /// Read and parse an os-release file. An unreadable file or one
    /// without an `ID` field is a host-state error.
    pub fn load_from(path: &Path) -> NodeupResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            NodeupError::HostState(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))
        })?;
        let os = Self::parse(&contents);
        if os.id.is_empty() {
            return Err(NodeupError::HostState(format!(
                "{} has no ID field",
                path.display()
            )));
        }
        Ok(os)
    }

    /// Read the running host's identity from `/etc/os-release`.
    pub fn load() -> NodeupResult<Self> {
        Self::load_from(Path::new(paths::OS_RELEASE_FILE))
    }

    /// Whether this host supports atomic, image-based OS updates.
    pub fn is_coreos_variant(&self) -> bool {
        matches!(self.id.as_str(), "rhcos" | "fedora-coreos" | "coreos")
            || self.variant_id.as_deref() == Some("coreos")
    }
}

/// Pick the updater implementation for an already-identified host.
pub fn node_updater_for(os: &OsRelease, runner: Arc<dyn CommandRunner>) -> Box<dyn NodeUpdater> {
    if os.is_coreos_variant() {
        Box::new(RpmOstreeClient::new(runner))
    } else {
        tracing::warn!(
            id = %os.id,
            "host operating system is not a CoreOS variant, update functionality is disabled"
        );
        Box::new(UnsupportedHostClient::new())
    }
}

/// Identify the running host and construct the matching [`NodeUpdater`].
///
/// Called once at startup; an error here is unrecoverable for the caller.
pub fn new_node_updater(runner: Arc<dyn CommandRunner>) -> NodeupResult<Box<dyn NodeUpdater>> {
    let os = OsRelease::load()?;
    Ok(node_updater_for(&os, runner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RHCOS: &str = r#"
NAME="Red Hat Enterprise Linux CoreOS"
ID="rhcos"
VERSION_ID="4.7"
VARIANT_ID=coreos
"#;

    const UBUNTU: &str = r#"
# comment line
NAME="Ubuntu"
ID=ubuntu
VERSION_ID="22.04"
"#;

    #[test]
    fn test_parse_quoted_and_unquoted_values() {
        let os = OsRelease::parse(RHCOS);
        assert_eq!(os.id, "rhcos");
        assert_eq!(os.variant_id.as_deref(), Some("coreos"));
        assert_eq!(os.name.as_deref(), Some("Red Hat Enterprise Linux CoreOS"));
        assert_eq!(os.version_id.as_deref(), Some("4.7"));
    }

    #[test]
    fn test_coreos_variant_detection() {
        assert!(OsRelease::parse(RHCOS).is_coreos_variant());
        assert!(OsRelease::parse("ID=fedora-coreos\n").is_coreos_variant());
        assert!(OsRelease::parse("ID=fedora\nVARIANT_ID=coreos\n").is_coreos_variant());
        assert!(!OsRelease::parse(UBUNTU).is_coreos_variant());
        assert!(!OsRelease::parse("ID=rhel\n").is_coreos_variant());
    }

    #[test]
    fn test_load_from_fixture_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp os-release");
        write!(file, "{}", UBUNTU).expect("write fixture");
        let os = OsRelease::load_from(file.path()).expect("fixture parses");
        assert_eq!(os.id, "ubuntu");
    }

    #[test]
    fn test_load_missing_file_is_fatal_error() {
        let err = OsRelease::load_from(Path::new("/nonexistent/os-release"))
            .expect_err("missing identity is unrecoverable");
        assert!(matches!(err, NodeupError::HostState(_)));
    }

    #[test]
    fn test_load_without_id_is_fatal_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp os-release");
        write!(file, "NAME=\"Mystery OS\"\n").expect("write fixture");
        let err = OsRelease::load_from(file.path()).expect_err("no ID field");
        assert!(matches!(err, NodeupError::HostState(_)));
    }

    #[tokio::test]
    async fn test_variant_selection_picks_stub_for_non_coreos() {
        use crate::testing::FakeRunner;

        let os = OsRelease::parse(UBUNTU);
        let updater = node_updater_for(&os, Arc::new(FakeRunner::new()));
        // The stub fails every mutating operation with the sentinel.
        let err = updater
            .remove_pending_deployment()
            .await
            .expect_err("stub variant");
        assert!(matches!(err, NodeupError::Unsupported));
    }
}

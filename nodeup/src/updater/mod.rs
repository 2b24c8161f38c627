//! The node updater capability set and its host-state types.
//!
//! [`NodeUpdater`] is the abstraction callers depend on. Which of the two
//! implementations backs it is decided once, at construction, by
//! [`crate::host::new_node_updater`]; callers never branch on host type.

mod rpm_ostree;
mod unsupported;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::origin;
use crate::errors::NodeupResult;

pub use rpm_ostree::RpmOstreeClient;
pub use unsupported::UnsupportedHostClient;

/// One entry in the host's ordered deployment list.
///
/// Field names track the machine-readable output of
/// `rpm-ostree status --json`. A `Deployment` is a read-only snapshot:
/// it is produced fresh on every query and never cached across
/// reconciliation passes, since a concurrent external rebase can change
/// host state at any time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployment {
    pub id: String,
    pub osname: String,
    pub serial: i32,
    pub checksum: String,
    pub version: String,
    pub timestamp: u64,
    pub booted: bool,
    pub origin: String,
    /// Ordered pair of custom-origin URL and human description, when the
    /// deployment carries one.
    #[serde(rename = "custom-origin")]
    pub custom_origin: Vec<String>,
}

impl Deployment {
    /// The image URL recorded in this deployment's custom origin, or an
    /// empty string when the origin is absent or not image-sourced
    /// (e.g. set by a manual operator intervention).
    pub fn image_url(&self) -> String {
        match self.custom_origin.first() {
            Some(url) => url
                .strip_prefix(origin::PIVOT_SCHEME)
                .unwrap_or("")
                .to_string(),
            None => String::new(),
        }
    }
}

/// Kernel-argument operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KargOp {
    Append,
    Delete,
}

/// A requested kernel-argument mutation.
///
/// The argument text may be a quoted, space-separated composite of
/// multiple `key=value` tokens; it is expanded into independent tokens
/// before being diffed or applied.
#[derive(Debug, Clone)]
pub struct KernelArgument {
    pub op: KargOp,
    pub arg: String,
}

impl KernelArgument {
    pub fn append(arg: impl Into<String>) -> Self {
        Self {
            op: KargOp::Append,
            arg: arg.into(),
        }
    }

    pub fn delete(arg: impl Into<String>) -> Self {
        Self {
            op: KargOp::Delete,
            arg: arg.into(),
        }
    }
}

/// How to interact with the host around OS content deployment.
#[async_trait]
pub trait NodeUpdater: Send + Sync {
    /// The currently booted deployment.
    async fn get_booted_deployment(&self) -> NodeupResult<Deployment>;

    /// `(image_url, version)` of the booted deployment. The URL is empty
    /// when the custom origin is absent or not image-sourced; that is
    /// advisory telemetry, not an error.
    async fn get_booted_os_image_url(&self) -> NodeupResult<(String, String)>;

    /// Raw human-readable status text for diagnostics.
    async fn get_status(&self) -> NodeupResult<String>;

    /// The host's currently active kernel arguments, one token each.
    async fn get_kernel_args(&self) -> NodeupResult<Vec<String>>;

    /// Atomically rebase the host onto the OS commit resolved from
    /// `image_url`, using the ostree repository under `content_dir`.
    /// Returns whether a change was made.
    async fn rebase(&self, image_url: &str, content_dir: &Path) -> NodeupResult<bool>;

    /// Reconcile the requested kernel-argument mutations against the
    /// host's active arguments, issuing at most one combined host
    /// command. Returns the command's raw output, or an empty string
    /// when nothing needed to change.
    async fn set_kernel_args(&self, args: &[KernelArgument]) -> NodeupResult<String>;

    /// Remove any pending (staged but not yet booted) deployment.
    async fn remove_pending_deployment(&self) -> NodeupResult<()>;

    /// Direct passthrough to the host update tool.
    async fn run_rpm_ostree(&self, noun: &str, args: &[&str]) -> NodeupResult<Vec<u8>>;
}

/// Split on whitespace unless inside a double-quoted span.
///
/// `boo=bar="YIPPIE KA YAY" baz foo` splits into
/// `["boo=bar=\"YIPPIE KA YAY\"", "baz", "foo"]` — quoted spaces stay
/// inside a single token, and the quotes themselves are preserved.
pub fn quote_space_split(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in s.chars() {
        if ch == '"' {
            quoted = !quoted;
        }
        if ch.is_whitespace() && !quoted {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_quote_space_split_plain() {
        assert_eq!(
            quote_space_split("a=1 b=2 c"),
            vec!["a=1".to_string(), "b=2".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_quote_space_split_preserves_quoted_spaces() {
        assert_eq!(
            quote_space_split(r#"boo=bar="YIPPIE KA YAY" baz foo"#),
            vec![
                r#"boo=bar="YIPPIE KA YAY""#.to_string(),
                "baz".to_string(),
                "foo".to_string()
            ]
        );
    }

    #[test]
    fn test_quote_space_split_collapses_runs_and_edges() {
        assert_eq!(
            quote_space_split("  a=1   b=2\n"),
            vec!["a=1".to_string(), "b=2".to_string()]
        );
        assert!(quote_space_split("").is_empty());
        assert!(quote_space_split("   ").is_empty());
    }

    #[test]
    fn test_image_url_round_trips_pivot_origin() {
        let d = Deployment {
            custom_origin: vec![
                "pivot://registry.example/os:v2".to_string(),
                "Managed by nodeup".to_string(),
            ],
            ..Default::default()
        };
        assert_eq!(d.image_url(), "registry.example/os:v2");
    }

    #[test]
    fn test_image_url_empty_for_untagged_or_missing_origin() {
        let d = Deployment::default();
        assert_eq!(d.image_url(), "");

        let d = Deployment {
            custom_origin: vec!["manually-set-by-operator".to_string()],
            ..Default::default()
        };
        assert_eq!(d.image_url(), "");
    }

    proptest! {
        /// Without quotes, the tokenizer agrees with plain whitespace
        /// splitting.
        #[test]
        fn prop_unquoted_matches_whitespace_split(s in "[a-z0-9=. ]{0,40}") {
            let expected: Vec<String> =
                s.split_whitespace().map(|t| t.to_string()).collect();
            prop_assert_eq!(quote_space_split(&s), expected);
        }

        /// Tokens never contain unquoted whitespace and re-joining loses
        /// nothing but separators.
        #[test]
        fn prop_tokens_preserve_non_space_content(s in "[a-z0-9=\" ]{0,40}") {
            let tokens = quote_space_split(&s);
            let joined: String = tokens.concat();
            let original: String = s.chars().filter(|c| *c != ' ').collect();
            // Quoted spaces survive inside tokens, so the joined tokens
            // contain at least every non-space character of the input.
            for ch in original.chars() {
                prop_assert!(joined.contains(ch));
            }
        }
    }
}

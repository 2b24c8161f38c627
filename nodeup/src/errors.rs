//! Error types shared across the orchestrator.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type NodeupResult<T> = Result<T, NodeupError>;

/// All errors surfaced by nodeup operations.
///
/// The variants map onto distinct handling policies: `Command` failures
/// carry the full command line for diagnostics, `HostState` errors are
/// never retried, `Parse` errors carry the raw offending output, and
/// `Unsupported` is the single sentinel returned by every mutating
/// operation on hosts without atomic update support.
#[derive(Error, Debug)]
pub enum NodeupError {
    /// An external command could not be spawned or exited non-zero.
    #[error("command `{command}` failed: {detail}")]
    Command { command: String, detail: String },

    /// Host state that should not occur on a healthy running system,
    /// e.g. no booted deployment or an ambiguous local repository.
    #[error("host state error: {0}")]
    HostState(String),

    /// Malformed machine-readable output from a host tool.
    #[error("failed to parse output of `{command}`: {detail}")]
    Parse { command: String, detail: String },

    /// Sentinel for hosts that are not a CoreOS variant. Mutating
    /// operations on the unsupported-host client always return this.
    #[error("operating system is not a CoreOS variant")]
    Unsupported,

    /// Failure inside the plugin harness (registration or execution).
    #[error("plugin error: {0}")]
    Plugin(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

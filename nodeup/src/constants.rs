//! Well-known binaries, labels, paths, and budgets.
//!
//! Everything the orchestrator assumes about the host environment is
//! collected here so the contract with external tools stays visible in
//! one place.

/// External binaries wrapped by the orchestrator.
pub mod bin {
    /// The atomic host update tool.
    pub const RPM_OSTREE: &str = "/usr/bin/rpm-ostree";

    /// Direct image metadata inspection (no pull).
    pub const SKOPEO: &str = "skopeo";

    /// Containerization-tool fallback for pull + local inspect.
    pub const PODMAN: &str = "podman";

    /// Local OS-content repository primitives (refs, rev-parse).
    pub const OSTREE: &str = "ostree";

    /// Power-state inhibition wrapper.
    pub const SYSTEMD_INHIBIT: &str = "systemd-inhibit";
}

/// Image labels that are contractually significant.
pub mod labels {
    /// Label carrying the OS commit checksum embedded in an OS image.
    pub const OSTREE_COMMIT: &str = "com.coreos.ostree-commit";

    /// Label carrying the human-readable display version.
    pub const VERSION: &str = "version";
}

/// Well-known host paths.
pub mod paths {
    /// Pull secret written by the cluster; used by podman when present.
    pub const KUBELET_AUTH_FILE: &str = "/var/lib/kubelet/config.json";

    /// Live kernel command line, used on hosts without rpm-ostree.
    pub const CMDLINE_FILE: &str = "/proc/cmdline";

    /// Host OS identification.
    pub const OS_RELEASE_FILE: &str = "/etc/os-release";

    /// Location of the ostree repository inside an extracted OS content
    /// directory.
    pub const OS_REPO_SUBDIR: &str = "srv/repo";
}

/// Retry budgets.
pub mod retry {
    /// Attempts for commands that pull data from the network.
    pub const NET_COMMANDS: u32 = 5;
}

/// Custom-origin metadata recorded on rebased deployments.
pub mod origin {
    /// Scheme tag marking a custom origin as image-sourced. Only origins
    /// carrying this prefix round-trip back into an image URL.
    pub const PIVOT_SCHEME: &str = "pivot://";

    /// Human description attached to deployments created by nodeup.
    pub const DESCRIPTION: &str = "Managed by nodeup";
}

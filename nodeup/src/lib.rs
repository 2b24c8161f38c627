//! nodeup — node-side OS update orchestrator for atomic hosts.
//!
//! This crate reconciles the immutable OS image deployed on a machine
//! against a desired container-image reference. The host's deployment
//! store (rpm-ostree) is the only source of truth and the only durable
//! state; every operation here wraps an external host tool invocation.
//!
//! The central abstraction is the [`NodeUpdater`] capability set. Two
//! implementations exist: [`updater::RpmOstreeClient`] for CoreOS-variant
//! hosts with atomic update support, and [`updater::UnsupportedHostClient`]
//! for everything else. [`host::new_node_updater`] picks between them once,
//! at construction, based on `/etc/os-release`.

pub mod cmd;
pub mod constants;
pub mod errors;
pub mod host;
pub mod inhibit;
pub mod plugins;
pub mod resolve;
pub mod testing;
pub mod updater;

pub use cmd::{CommandRunner, HostCommandRunner};
pub use errors::{NodeupError, NodeupResult};
pub use host::new_node_updater;
pub use updater::{Deployment, KargOp, KernelArgument, NodeUpdater};

pub mod booted;
pub mod cleanup;
pub mod kargs;
pub mod rebase;
pub mod status;

//! Shared plumbing for the refit crates: path handling, atomic writes,
//! project discovery and the JSON configuration file.

pub mod config;
pub mod fs_utils;
pub mod project;

pub use config::{ConfigError, RefitConfig};
pub use fs_utils::{atomic_write, FsError};

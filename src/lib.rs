//! Library interface for setup-release
//!
//! Resolves a release of a GitHub-hosted tool, installs the binary for the
//! current runner, and caches it between runs. The binary in `main.rs` is a
//! thin CLI over [`setup::Setup`].

pub mod api;
pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod install;
pub mod platform;
pub mod report;
pub mod resolve;
pub mod setup;
pub mod workflow;

// Re-export commonly used types
pub use config::SetupConfig;
pub use error::{Result, SetupError};
pub use setup::{Setup, SetupOutcome};

//! Command implementations for the setup-release CLI
//!
//! - **install**: resolve, install and report a release binary
//! - **cache**: inspect or clear the local tool cache

pub mod cache;
pub mod install;

pub use cache::cache;
pub use install::{InstallArgs, install};

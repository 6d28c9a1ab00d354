//! Run configuration.
//!
//! Everything the pipeline needs from the outside world (token, API URL, host
//! facts, directories) is collected here by the caller, so library code never
//! reads ambient process state.

use crate::api::DEFAULT_API_URL;
use crate::cache;
use crate::error::{Result, SetupError};
use crate::platform::Host;
use crate::resolve::VersionRequest;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SetupConfig {
    /// `owner/name` of the repository publishing releases
    pub repo: String,
    /// Executable name, without a platform extension
    pub tool: String,
    pub version: VersionRequest,
    pub token: Option<String>,
    pub cache_enabled: bool,
    pub cache_dir: PathBuf,
    /// Root under which each installation gets its own directory
    pub install_root: PathBuf,
    pub api_url: String,
    pub host: Host,
}

impl SetupConfig {
    /// Configuration for `repo` with every other setting at its default.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::InvalidConfig`] unless `repo` looks like `owner/name`.
    pub fn new(repo: &str) -> Result<Self> {
        let name = repo_name(repo)?;

        Ok(Self {
            repo: repo.to_string(),
            tool: name.to_string(),
            version: VersionRequest::Latest,
            token: None,
            cache_enabled: true,
            cache_dir: cache::default_cache_dir(),
            install_root: default_install_root(),
            api_url: DEFAULT_API_URL.to_string(),
            host: Host::current(),
        })
    }
}

fn repo_name(repo: &str) -> Result<&str> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(name)
        }
        _ => Err(SetupError::InvalidConfig(format!(
            "repository must be `owner/name`, got `{}`",
            repo
        ))),
    }
}

/// Per-job scratch root ($RUNNER_TEMP/setup-release or the system temp dir)
pub fn default_install_root() -> PathBuf {
    std::env::var_os("RUNNER_TEMP")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join("setup-release")
}

//! The end-to-end setup run.
//!
//! ```text
//! DETECT → RESOLVE → CACHE_LOOKUP ─ hit ──────────────────────────────────────┐
//!                                 └ miss → DOWNLOAD → EXTRACT → CACHE_STORE ─┴→ PATH → REPORT
//! ```
//!
//! Every step is sequential and any fatal error aborts the run. Cache
//! failures are the only recoverable kind and are handled inside
//! [`CacheManager`].

use crate::api::{GitHubApi, ReleaseApi};
use crate::cache::{CacheKey, CacheManager, CacheStore, DirectoryStore};
use crate::config::SetupConfig;
use crate::download::Downloader;
use crate::error::Result;
use crate::install::{InstallResult, Installer};
use crate::platform::{Host, Platform};
use crate::report::Reporter;
use crate::resolve::{ResolvedRelease, Resolver, VersionRequest};
use crate::workflow::WorkflowEnv;
use std::path::PathBuf;
use tracing::info;

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct SetupOutcome {
    pub platform: Platform,
    pub resolved: ResolvedRelease,
    pub install: InstallResult,
}

pub struct Setup<A, S> {
    host: Host,
    tool: String,
    version: VersionRequest,
    install_root: PathBuf,
    resolver: Resolver<A>,
    cache: CacheManager<S>,
    installer: Installer,
    env: WorkflowEnv,
}

impl Setup<GitHubApi, DirectoryStore> {
    /// Wire the GitHub API and on-disk cache from `config`.
    pub fn from_config(config: &SetupConfig, env: WorkflowEnv) -> Result<Self> {
        let api = GitHubApi::new(&config.api_url, config.token.clone())?;
        let store = DirectoryStore::new(&config.cache_dir);
        Self::new(config, api, store, env)
    }
}

impl<A: ReleaseApi, S: CacheStore> Setup<A, S> {
    pub fn new(config: &SetupConfig, api: A, store: S, env: WorkflowEnv) -> Result<Self> {
        let downloader = Downloader::new(config.token.clone(), &config.api_url)?;

        Ok(Self {
            host: config.host.clone(),
            tool: config.tool.clone(),
            version: config.version.clone(),
            install_root: config.install_root.clone(),
            resolver: Resolver::new(api, &config.repo),
            cache: CacheManager::new(store, config.cache_enabled),
            installer: Installer::new(downloader, &config.tool),
            env,
        })
    }

    pub fn workflow_env(&self) -> &WorkflowEnv {
        &self.env
    }

    /// Run the pipeline once.
    pub async fn run(&self) -> Result<SetupOutcome> {
        // No network before the platform is known to be supported
        let platform = self.host.detect()?;
        info!(%platform, "Detected platform");

        let resolved = self.resolver.resolve(&self.version, platform).await?;

        let key = CacheKey::new(&self.tool, &resolved.tag, platform);
        let dest = self.install_root.join(key.as_str());

        let install = match self.cache.try_restore(&key, &dest) {
            Some(dir) => InstallResult {
                binary_path: std::path::absolute(dir.join(key.executable_name()))?,
                cache_hit: true,
            },
            None => {
                let binary_path = self.installer.install(&resolved, platform, &dest).await?;
                self.cache.store(&key, &dest);
                InstallResult {
                    binary_path,
                    cache_hit: false,
                }
            }
        };

        self.env.add_path(install.install_dir())?;
        Reporter::new(self.env.clone()).report(&resolved, &install);

        info!(
            repo = %self.resolver.repo(),
            tag = %resolved.tag,
            path = %install.binary_path.display(),
            cache_hit = install.cache_hit,
            "Setup complete"
        );

        Ok(SetupOutcome {
            platform,
            resolved,
            install,
        })
    }
}

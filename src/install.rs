//! Fresh installation of a resolved release asset.

use crate::download::{Downloader, sha256_file};
use crate::error::Result;
use crate::extract;
use crate::platform::Platform;
use crate::resolve::ResolvedRelease;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the tool ended up and whether the cache provided it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallResult {
    /// Absolute path of the executable.
    pub binary_path: PathBuf,
    pub cache_hit: bool,
}

impl InstallResult {
    /// Directory to put on PATH.
    pub fn install_dir(&self) -> &Path {
        self.binary_path.parent().unwrap_or(&self.binary_path)
    }
}

/// Downloads and unpacks release assets for one tool.
pub struct Installer {
    downloader: Downloader,
    tool: String,
}

impl Installer {
    pub fn new(downloader: Downloader, tool: impl Into<String>) -> Self {
        Self {
            downloader,
            tool: tool.into(),
        }
    }

    /// Download, extract and place the tool executable from `resolved` into `dest`.
    ///
    /// The archive is fetched into a scratch directory that is removed when
    /// this returns. Returns the absolute path of the executable.
    pub async fn install(
        &self,
        resolved: &ResolvedRelease,
        platform: Platform,
        dest: &Path,
    ) -> Result<PathBuf> {
        let scratch = tempfile::Builder::new()
            .prefix("setup-release-")
            .tempdir()?;
        let archive_path = scratch.path().join(&resolved.asset_name);

        self.downloader
            .download(&resolved.asset_url, &archive_path, &resolved.asset_name)
            .await?;

        let extracted = scratch.path().join("extracted");
        extract::extract_archive(&archive_path, &resolved.asset_name, &extracted)?;

        let executable = platform.executable_name(&self.tool);
        let binary = extract::place_executable(&extracted, &executable, dest)?;
        let binary = std::path::absolute(&binary)?;

        info!(
            tool = %self.tool,
            tag = %resolved.tag,
            binary = %binary.display(),
            sha256 = %sha256_file(&binary)?,
            "Installed release binary"
        );

        Ok(binary)
    }
}

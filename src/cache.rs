//! Binary cache keyed by (tool, release tag, platform).
//!
//! The store maps a [`CacheKey`] to a directory holding the installed binary.
//! Caching only saves a download: every failure here is logged as a warning
//! and the run continues as if the cache missed.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   <key>/
//!     entry.json   # key, tool, tag, platform, binary sha256, stored_at
//!     files/       # the install directory as it was stored
//! ```

use crate::download::sha256_file;
use crate::error::CacheError;
use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const MANIFEST_FILE: &str = "entry.json";
const FILES_DIR: &str = "files";

/// Get the cache root ($RUNNER_TOOL_CACHE/setup-release, ~/.cache/setup-release or equivalent)
pub fn default_cache_dir() -> PathBuf {
    if let Some(tool_cache) = std::env::var_os("RUNNER_TOOL_CACHE") {
        PathBuf::from(tool_cache).join("setup-release")
    } else if let Some(cache_home) = std::env::var_os("XDG_CACHE_HOME") {
        PathBuf::from(cache_home).join("setup-release")
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".cache/setup-release")
    } else {
        PathBuf::from(".cache/setup-release")
    }
}

/// Deterministic identifier for one installed binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    tool: String,
    tag: String,
    platform: Platform,
    key: String,
}

impl CacheKey {
    pub fn new(tool: &str, tag: &str, platform: Platform) -> Self {
        // Readable prefix for humans, digest of the raw parts for uniqueness
        let mut hasher = Sha256::new();
        for part in [tool, tag, platform.os.as_str(), platform.arch.as_str()] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        let digest = format!("{:x}", hasher.finalize());

        let key = format!(
            "{}-{}-{}-{}-{}",
            sanitize(tool),
            sanitize(tag),
            platform.os.as_str(),
            platform.arch.as_str(),
            &digest[..16]
        );

        Self {
            tool: tool.to_string(),
            tag: tag.to_string(),
            platform,
            key,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Executable file name stored under this key.
    pub fn executable_name(&self) -> String {
        self.platform.executable_name(&self.tool)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Key/directory storage backing the cache.
pub trait CacheStore {
    /// Materialize the directory stored under `key` into `dest`. `Ok(false)` on miss.
    fn restore(&self, key: &CacheKey, dest: &Path) -> Result<bool, CacheError>;

    /// Store the contents of `dir` under `key`.
    fn save(&self, key: &CacheKey, dir: &Path) -> Result<(), CacheError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryManifest {
    key: String,
    tool: String,
    tag: String,
    platform: String,
    binary: String,
    sha256: String,
    stored_at: String,
}

/// Filesystem-backed store, one directory per key.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Keys of all complete entries in the store.
    pub fn entries(&self) -> Result<Vec<String>, CacheError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.join(MANIFEST_FILE).is_file() {
                keys.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Total bytes used by the store.
    pub fn size(&self) -> Result<u64, CacheError> {
        calculate_dir_size(&self.root)
    }

    /// Remove every entry, including staging leftovers. Returns the number of entries removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let count = self.entries()?.len();
        if self.root.exists() {
            for entry in fs::read_dir(&self.root)? {
                let path = entry?.path();
                if path.is_dir() {
                    fs::remove_dir_all(&path)?;
                }
            }
        }
        Ok(count)
    }

    fn restore_entry(&self, key: &CacheKey, entry: &Path, dest: &Path) -> Result<(), CacheError> {
        let manifest_path = entry.join(MANIFEST_FILE);
        let manifest: EntryManifest = serde_json::from_str(&fs::read_to_string(&manifest_path)?)?;
        if manifest.key != key.as_str() {
            return Err(CacheError::Corrupt {
                key: key.to_string(),
                reason: format!("manifest is for {}", manifest.key),
            });
        }

        if dest.exists() {
            fs::remove_dir_all(dest)?;
        }
        copy_dir(&entry.join(FILES_DIR), dest)?;

        let binary = dest.join(&manifest.binary);
        let actual = if binary.is_file() {
            sha256_file(&binary)?
        } else {
            String::new()
        };
        if actual != manifest.sha256 {
            let _ = fs::remove_dir_all(dest);
            return Err(CacheError::Corrupt {
                key: key.to_string(),
                reason: format!("{} does not match stored digest", manifest.binary),
            });
        }

        Ok(())
    }
}

impl CacheStore for DirectoryStore {
    fn restore(&self, key: &CacheKey, dest: &Path) -> Result<bool, CacheError> {
        let entry = self.entry_dir(key);
        if !entry.join(MANIFEST_FILE).is_file() {
            return Ok(false);
        }

        match self.restore_entry(key, &entry, dest) {
            Ok(()) => Ok(true),
            Err(e @ (CacheError::Corrupt { .. } | CacheError::Manifest(_))) => {
                // Drop the broken entry so the next successful install can replace it
                let _ = fs::remove_dir_all(&entry);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, key: &CacheKey, dir: &Path) -> Result<(), CacheError> {
        let entry = self.entry_dir(key);
        if entry.join(MANIFEST_FILE).is_file() {
            debug!(%key, "Entry already stored");
            return Ok(());
        }

        let binary = key.executable_name();
        let sha256 = sha256_file(&dir.join(&binary))?;

        fs::create_dir_all(&self.root)?;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}.", key.as_str()))
            .tempdir_in(&self.root)?;

        copy_dir(dir, &staging.path().join(FILES_DIR))?;
        let manifest = EntryManifest {
            key: key.to_string(),
            tool: key.tool().to_string(),
            tag: key.tag().to_string(),
            platform: key.platform().to_string(),
            binary,
            sha256,
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        fs::write(
            staging.path().join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        if let Err(e) = fs::rename(staging.path(), &entry) {
            // A concurrent run stored the same key first; its content is identical
            if entry.join(MANIFEST_FILE).is_file() {
                debug!(%key, "Entry stored concurrently, dropping duplicate");
                return Ok(());
            }
            return Err(e.into());
        }

        Ok(())
    }
}

/// Best-effort cache in front of a [`CacheStore`].
pub struct CacheManager<S> {
    store: S,
    enabled: bool,
}

impl<S: CacheStore> CacheManager<S> {
    pub fn new(store: S, enabled: bool) -> Self {
        Self { store, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn store_ref(&self) -> &S {
        &self.store
    }

    /// Restore the directory stored under `key` into `dest`.
    ///
    /// Returns `None` on a miss, when caching is disabled, or when the store
    /// fails; failures are logged and never propagated.
    pub fn try_restore(&self, key: &CacheKey, dest: &Path) -> Option<PathBuf> {
        if !self.enabled {
            debug!(%key, "Caching disabled, skipping restore");
            return None;
        }

        match self.store.restore(key, dest) {
            Ok(true) => {
                info!(%key, dir = %dest.display(), "Cache hit");
                Some(dest.to_path_buf())
            }
            Ok(false) => {
                info!(%key, "Cache miss");
                None
            }
            Err(e) => {
                warn!(%key, error = %e, "Cache restore failed, treating as miss");
                None
            }
        }
    }

    /// Store `dir` under `key`. Failures are logged and never propagated.
    pub fn store(&self, key: &CacheKey, dir: &Path) {
        if !self.enabled {
            debug!(%key, "Caching disabled, skipping store");
            return;
        }

        match self.store.save(key, dir) {
            Ok(()) => info!(%key, "Stored in cache"),
            Err(e) => warn!(%key, error = %e, "Cache store failed, continuing"),
        }
    }
}

fn copy_dir(src: &Path, dst: &Path) -> Result<(), CacheError> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| CacheError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| CacheError::Corrupt {
                key: src.display().to_string(),
                reason: e.to_string(),
            })?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            // fs::copy carries permission bits, so executables stay executable
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn calculate_dir_size(path: &Path) -> Result<u64, CacheError> {
    let mut total = 0u64;

    if !path.exists() {
        return Ok(0);
    }

    for entry in WalkDir::new(path).follow_links(false).max_open(64) {
        let entry = entry.map_err(|e| CacheError::Io(e.into()))?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(|e| CacheError::Io(e.into()))?.len();
        }
    }

    Ok(total)
}

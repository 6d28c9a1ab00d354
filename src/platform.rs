//! Platform detection for selecting the correct release asset.
//!
//! Release assets encode the target platform in their file name with an OS
//! token and an architecture token, e.g. `tool_1.2.3_linux_amd64.tar.gz` or
//! `tool-v1.2.3-darwin-arm64.tar.gz`. This module maps the running host to
//! those tokens.
//!
//! # Supported Platforms
//!
//! | OS        | Architectures    | Archive   |
//! |-----------|------------------|-----------|
//! | `linux`   | `amd64`, `arm64` | `.tar.gz` |
//! | `darwin`  | `amd64`, `arm64` | `.tar.gz` |
//! | `windows` | `amd64`, `arm64` | `.zip`    |
//!
//! # Examples
//!
//! ```no_run
//! use setup_release::platform::Platform;
//!
//! fn main() -> anyhow::Result<()> {
//!     let platform = Platform::detect()?;
//!     println!("This runner needs: {}", platform);
//!     // Output: "linux/amd64" on a hosted Ubuntu runner
//!     Ok(())
//! }
//! ```

use crate::error::{Result, SetupError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Darwin,
    Windows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Windows => "windows",
        }
    }

    /// Spellings accepted in asset names, preferred first.
    pub fn tokens(&self) -> &'static [&'static str] {
        match self {
            Os::Linux => &["linux"],
            Os::Darwin => &["darwin", "macos", "apple-darwin"],
            Os::Windows => &["windows", "win64"],
        }
    }
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        }
    }

    /// Spellings accepted in asset names, preferred first.
    pub fn tokens(&self) -> &'static [&'static str] {
        match self {
            Arch::Amd64 => &["amd64", "x86_64", "x64"],
            Arch::Arm64 => &["arm64", "aarch64"],
        }
    }
}

/// The (OS, architecture) pair a run fetches assets for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Detect the platform of the running host.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::UnsupportedPlatform`] when the host is not one of
    /// the six supported OS/architecture combinations.
    pub fn detect() -> Result<Self> {
        Host::current().detect()
    }

    /// Every supported platform.
    pub fn all() -> [Platform; 6] {
        [
            Platform::new(Os::Linux, Arch::Amd64),
            Platform::new(Os::Linux, Arch::Arm64),
            Platform::new(Os::Darwin, Arch::Amd64),
            Platform::new(Os::Darwin, Arch::Arm64),
            Platform::new(Os::Windows, Arch::Amd64),
            Platform::new(Os::Windows, Arch::Arm64),
        ]
    }

    /// Archive suffixes used for this platform's assets, preferred first.
    pub fn archive_suffixes(&self) -> &'static [&'static str] {
        match self.os {
            Os::Windows => &[".zip"],
            _ => &[".tar.gz", ".tgz"],
        }
    }

    /// File name of the tool executable on this platform.
    pub fn executable_name(&self, tool: &str) -> String {
        match self.os {
            Os::Windows => format!("{}.exe", tool),
            _ => tool.to_string(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os.as_str(), self.arch.as_str())
    }
}

/// Raw host facts as reported by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub os: String,
    pub arch: String,
}

impl Host {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Host facts of the compiled target.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map host facts to a supported platform.
    pub fn detect(&self) -> Result<Platform> {
        // Rust reports "macos"/"aarch64"; runners and asset names often say "darwin"/"arm64"
        let os = match self.os.to_ascii_lowercase().as_str() {
            "linux" => Some(Os::Linux),
            "macos" | "darwin" => Some(Os::Darwin),
            "windows" => Some(Os::Windows),
            _ => None,
        };
        let arch = match self.arch.to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Some(Arch::Amd64),
            "aarch64" | "arm64" => Some(Arch::Arm64),
            _ => None,
        };

        match (os, arch) {
            (Some(os), Some(arch)) => Ok(Platform::new(os, arch)),
            _ => Err(SetupError::UnsupportedPlatform {
                os: self.os.clone(),
                arch: self.arch.clone(),
            }),
        }
    }
}

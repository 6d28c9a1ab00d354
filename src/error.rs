use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Release not found: {repo}@{version}")]
    ReleaseNotFound { repo: String, version: String },

    #[error("No asset for {platform} in release {tag}{}", suggestion_suffix(.suggestions))]
    AssetNotFound {
        tag: String,
        platform: String,
        suggestions: Vec<String>,
    },

    #[error("GitHub API rate limit: {0}")]
    RateLimited(String),

    #[error("Asset URL is not a valid HTTPS URL: {0}")]
    InvalidAssetUrl(String),

    #[error("GitHub API error: {0}")]
    Api(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (closest: {})", suggestions.join(", "))
    }
}

impl SetupError {
    /// Pipeline stage the error aborted.
    pub fn stage(&self) -> &'static str {
        match self {
            SetupError::InvalidConfig(_) => "configure",
            SetupError::UnsupportedPlatform { .. } => "detect",
            SetupError::ReleaseNotFound { .. }
            | SetupError::AssetNotFound { .. }
            | SetupError::RateLimited(_)
            | SetupError::InvalidAssetUrl(_)
            | SetupError::Api(_)
            | SetupError::Http(_)
            | SetupError::Json(_) => "resolve",
            SetupError::Download(_) => "download",
            SetupError::Extraction(_) => "extract",
            SetupError::Io(_) => "install",
        }
    }

    /// Actionable advice shown under the error message.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            SetupError::UnsupportedPlatform { .. } => {
                Some("supported runners are linux, darwin and windows on amd64 or arm64")
            }
            SetupError::ReleaseNotFound { .. } => {
                Some("check the version format, e.g. `latest`, `v1.2.3` or `1.2.3`")
            }
            SetupError::AssetNotFound { .. } => {
                Some("this release does not publish a build for the current runner")
            }
            SetupError::RateLimited(_) => Some(
                "supply a valid token with `--token`, the `token` input, or GITHUB_TOKEN",
            ),
            SetupError::Download(_) => Some("re-run the job; the release host may be unavailable"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SetupError>;

/// Cache-subsystem failures. Logged and swallowed, never fatal.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cache manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Corrupt cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

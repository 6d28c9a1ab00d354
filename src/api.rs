//! GitHub Releases API client.
//!
//! The resolver only needs two read-only queries, "latest release" and
//! "release by tag", so the collaborator is the small [`ReleaseApi`] trait.
//! [`GitHubApi`] implements it over `reqwest`; tests substitute a mock server
//! or an in-memory fake.
//!
//! A missing release is not an error at this layer: lookups return
//! [`Lookup::NotFound`] and the resolver decides what to try next.
//!
//! # Rate limits
//!
//! Anonymous requests share a small per-IP quota. When GitHub reports that
//! quota as exhausted (403/429 with `x-ratelimit-remaining: 0`) or rejects the
//! token (401), the client returns [`SetupError::RateLimited`], whose hint
//! tells the user to supply a token. An authenticated request that runs out
//! of quota is a plain [`SetupError::Api`] error: a token is already in use.

use crate::error::{Result, SetupError};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Release metadata from the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// Downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// Outcome of a single release query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Release),
    NotFound,
}

impl Lookup {
    pub fn found(self) -> Option<Release> {
        match self {
            Lookup::Found(release) => Some(release),
            Lookup::NotFound => None,
        }
    }
}

/// Read-only access to a repository's published releases.
#[async_trait]
pub trait ReleaseApi: Send + Sync {
    /// Most recent release, as the host defines "latest".
    async fn latest_release(&self, repo: &str) -> Result<Lookup>;

    /// Release whose tag matches `tag` exactly.
    async fn release_by_tag(&self, repo: &str, tag: &str) -> Result<Lookup>;
}

/// GitHub REST API client
#[derive(Clone)]
pub struct GitHubApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl GitHubApi {
    /// Create a client against `base_url`, authenticating with `token` if present.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("setup-release/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = Url::parse(base_url)
            .map_err(|e| SetupError::InvalidConfig(format!("API URL {}: {}", base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// `<base>/repos/<owner>/<name>/<tail...>` with every part percent-encoded
    /// as a single path segment.
    fn endpoint(&self, repo: &str, tail: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SetupError::InvalidConfig(format!("API URL {}", self.base_url)))?
            .pop_if_empty()
            .push("repos")
            .extend(repo.split('/'))
            .extend(tail);
        Ok(url)
    }

    async fn get_release(&self, url: Url) -> Result<Lookup> {
        debug!(%url, authenticated = self.is_authenticated(), "Querying release");

        let mut request = self
            .client
            .get(url.clone())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(Lookup::NotFound);
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(SetupError::RateLimited(
                "GitHub rejected the supplied token (HTTP 401)".to_string(),
            ));
        }

        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            let exhausted = response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.trim() == "0");
            let body = response.text().await.unwrap_or_default();

            if exhausted
                || status == StatusCode::TOO_MANY_REQUESTS
                || body.to_lowercase().contains("rate limit")
            {
                if self.is_authenticated() {
                    warn!(%url, %status, "Authenticated quota exhausted");
                    return Err(SetupError::Api(format!(
                        "authenticated request quota exhausted (HTTP {}); wait for the limit to reset",
                        status.as_u16()
                    )));
                }
                return Err(SetupError::RateLimited(format!(
                    "anonymous request quota exhausted (HTTP {})",
                    status.as_u16()
                )));
            }

            warn!(%url, %status, "GitHub API refused request");
            return Err(SetupError::Api(format!("HTTP {} for {}", status, url)));
        }

        if !status.is_success() {
            warn!(%url, %status, "GitHub API returned unexpected status");
            return Err(SetupError::Api(format!("HTTP {} for {}", status, url)));
        }

        let release: Release = response.json().await?;
        Ok(Lookup::Found(release))
    }
}

#[async_trait]
impl ReleaseApi for GitHubApi {
    async fn latest_release(&self, repo: &str) -> Result<Lookup> {
        let url = self.endpoint(repo, &["releases", "latest"])?;
        self.get_release(url).await
    }

    async fn release_by_tag(&self, repo: &str, tag: &str) -> Result<Lookup> {
        let url = self.endpoint(repo, &["releases", "tags", tag])?;
        self.get_release(url).await
    }
}

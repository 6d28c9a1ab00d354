//! Version resolution and asset selection.
//!
//! Turns a requested version token into a concrete release tag and the asset
//! built for the current platform.
//!
//! # Tag Normalization
//!
//! Projects are inconsistent about a leading `v` on tags. An explicit request
//! is looked up literally first, then with the `v` toggled, so `1.0.0` and
//! `v1.0.0` resolve to the same release whichever spelling the project uses.
//!
//! # Latest
//!
//! `latest` is passed through to the host's "latest release" query. That is
//! the most recently published non-prerelease, which is not necessarily the
//! highest semantic version when releases are published out of order.

use crate::api::{Asset, Lookup, Release, ReleaseApi};
use crate::error::{Result, SetupError};
use crate::platform::Platform;
use reqwest::Url;
use std::fmt;
use tracing::{debug, info};

/// Requested version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    Latest,
    Tag(String),
}

impl VersionRequest {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("latest") {
            VersionRequest::Latest
        } else {
            VersionRequest::Tag(trimmed.to_string())
        }
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRequest::Latest => f.write_str("latest"),
            VersionRequest::Tag(tag) => f.write_str(tag),
        }
    }
}

/// A concrete release tag and the asset selected for the run's platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    pub tag: String,
    pub asset_url: String,
    pub asset_name: String,
}

impl ResolvedRelease {
    /// Build from a release and one of its assets, validating the download URL.
    pub fn new(tag: &str, asset: &Asset) -> Result<Self> {
        if tag.is_empty() {
            return Err(SetupError::Api("release has an empty tag name".to_string()));
        }
        validate_asset_url(&asset.browser_download_url)?;

        Ok(Self {
            tag: tag.to_string(),
            asset_url: asset.browser_download_url.clone(),
            asset_name: asset.name.clone(),
        })
    }
}

/// Require HTTPS, except for loopback mirrors.
fn validate_asset_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw).map_err(|_| SetupError::InvalidAssetUrl(raw.to_string()))?;
    let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));

    match url.scheme() {
        "https" => Ok(()),
        "http" if loopback => Ok(()),
        _ => Err(SetupError::InvalidAssetUrl(raw.to_string())),
    }
}

/// Resolves version requests against one repository.
pub struct Resolver<A> {
    api: A,
    repo: String,
}

impl<A: ReleaseApi> Resolver<A> {
    pub fn new(api: A, repo: impl Into<String>) -> Self {
        Self {
            api,
            repo: repo.into(),
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Resolve `request` to a release tag and the asset for `platform`.
    ///
    /// # Errors
    ///
    /// - [`SetupError::ReleaseNotFound`] if no release matches
    /// - [`SetupError::AssetNotFound`] if the release has no asset for `platform`
    /// - [`SetupError::RateLimited`] if the API quota is exhausted
    pub async fn resolve(
        &self,
        request: &VersionRequest,
        platform: Platform,
    ) -> Result<ResolvedRelease> {
        let release = self
            .find_release(request)
            .await?
            .found()
            .ok_or_else(|| SetupError::ReleaseNotFound {
                repo: self.repo.clone(),
                version: request.to_string(),
            })?;

        let asset = select_asset(&release.assets, platform).ok_or_else(|| {
            SetupError::AssetNotFound {
                tag: release.tag_name.clone(),
                platform: platform.to_string(),
                suggestions: suggest_assets(&release, platform),
            }
        })?;

        let resolved = ResolvedRelease::new(&release.tag_name, asset)?;
        info!(
            repo = %self.repo,
            %request,
            tag = %resolved.tag,
            asset = %resolved.asset_name,
            "Resolved release"
        );
        Ok(resolved)
    }

    /// Find the release for `request`, trying each tag spelling in turn.
    pub async fn find_release(&self, request: &VersionRequest) -> Result<Lookup> {
        match request {
            VersionRequest::Latest => self.api.latest_release(&self.repo).await,
            VersionRequest::Tag(tag) => {
                for candidate in tag_candidates(tag) {
                    debug!(repo = %self.repo, tag = %candidate, "Looking up release");
                    if let Lookup::Found(release) =
                        self.api.release_by_tag(&self.repo, &candidate).await?
                    {
                        return Ok(Lookup::Found(release));
                    }
                }
                Ok(Lookup::NotFound)
            }
        }
    }
}

/// Literal tag first, then the spelling with the leading `v` toggled.
pub fn tag_candidates(tag: &str) -> Vec<String> {
    let alternate = match tag.strip_prefix('v') {
        Some(bare) if bare.starts_with(|c: char| c.is_ascii_digit()) => bare.to_string(),
        Some(_) => return vec![tag.to_string()],
        None => format!("v{}", tag),
    };
    vec![tag.to_string(), alternate]
}

/// Pick the asset built for `platform`.
///
/// Candidates must carry the platform's archive suffix and contain both an OS
/// and an arch token as whole words. Preferred spellings outrank aliases; ties
/// keep API order.
pub fn select_asset(assets: &[Asset], platform: Platform) -> Option<&Asset> {
    assets
        .iter()
        .filter_map(|asset| asset_rank(&asset.name, platform).map(|rank| (rank, asset)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, asset)| asset)
}

fn asset_rank(name: &str, platform: Platform) -> Option<usize> {
    let lower = name.to_ascii_lowercase();
    let suffix = platform
        .archive_suffixes()
        .iter()
        .find(|suffix| lower.ends_with(*suffix))?;
    let words = word_form(&lower[..lower.len() - suffix.len()]);

    let os_rank = platform
        .os
        .tokens()
        .iter()
        .position(|token| words.contains(&word_form(token)))?;
    let arch_rank = platform
        .arch
        .tokens()
        .iter()
        .position(|token| words.contains(&word_form(token)))?;

    Some(os_rank + arch_rank)
}

/// `-`-delimited form with separators normalized, padded so tokens match whole words.
fn word_form(s: &str) -> String {
    let normalized: String = s
        .chars()
        .map(|c| if matches!(c, '_' | '.') { '-' } else { c })
        .collect();
    format!("-{}-", normalized.trim_matches('-'))
}

fn suggest_assets(release: &Release, platform: Platform) -> Vec<String> {
    let wanted = format!(
        "{}_{}{}",
        platform.os.as_str(),
        platform.arch.as_str(),
        platform.archive_suffixes()[0]
    );
    let mut scored: Vec<_> = release
        .assets
        .iter()
        .map(|a| (strsim::jaro_winkler(&a.name.to_ascii_lowercase(), &wanted), &a.name))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(3).map(|(_, n)| n.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn asset(name: &str) -> Asset {
        Asset {
            name: name.to_string(),
            browser_download_url: format!("https://github.com/o/tool/releases/download/v1.0.0/{}", name),
            size: 0,
        }
    }

    fn release(tag: &str, names: &[&str]) -> Release {
        Release {
            tag_name: tag.to_string(),
            name: None,
            published_at: None,
            assets: names.iter().map(|n| asset(n)).collect(),
        }
    }

    /// In-memory release host that records every query.
    struct FakeApi {
        latest: Option<Release>,
        releases: Vec<Release>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn new(releases: Vec<Release>) -> Self {
            Self {
                latest: releases.first().cloned(),
                releases,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReleaseApi for FakeApi {
        async fn latest_release(&self, _repo: &str) -> Result<Lookup> {
            self.queries.lock().unwrap().push("latest".into());
            Ok(self.latest.clone().map_or(Lookup::NotFound, Lookup::Found))
        }

        async fn release_by_tag(&self, _repo: &str, tag: &str) -> Result<Lookup> {
            self.queries.lock().unwrap().push(tag.to_string());
            Ok(self
                .releases
                .iter()
                .find(|r| r.tag_name == tag)
                .cloned()
                .map_or(Lookup::NotFound, Lookup::Found))
        }
    }

    const STANDARD_ASSETS: &[&str] = &[
        "checksums.txt",
        "tool_1.0.0_darwin_amd64.tar.gz",
        "tool_1.0.0_darwin_arm64.tar.gz",
        "tool_1.0.0_linux_amd64.tar.gz",
        "tool_1.0.0_linux_amd64.tar.gz.sha256",
        "tool_1.0.0_linux_arm64.tar.gz",
        "tool_1.0.0_windows_amd64.zip",
        "tool_1.0.0_windows_arm64.zip",
    ];

    #[test]
    fn test_version_request_parse() {
        assert_eq!(VersionRequest::parse("latest"), VersionRequest::Latest);
        assert_eq!(VersionRequest::parse(" LATEST "), VersionRequest::Latest);
        assert_eq!(VersionRequest::parse(""), VersionRequest::Latest);
        assert_eq!(
            VersionRequest::parse("v1.2.3"),
            VersionRequest::Tag("v1.2.3".into())
        );
    }

    #[test]
    fn test_tag_candidates() {
        assert_eq!(tag_candidates("1.0.0"), vec!["1.0.0", "v1.0.0"]);
        assert_eq!(tag_candidates("v1.0.0"), vec!["v1.0.0", "1.0.0"]);
        assert_eq!(tag_candidates("nightly"), vec!["nightly", "vnightly"]);
        assert_eq!(tag_candidates("very-old"), vec!["very-old"]);
    }

    #[test]
    fn test_every_platform_matches_a_standard_asset() {
        let assets: Vec<_> = STANDARD_ASSETS.iter().map(|n| asset(n)).collect();
        for platform in Platform::all() {
            let selected = select_asset(&assets, platform)
                .unwrap_or_else(|| panic!("no asset for {}", platform));
            assert!(selected.name.contains(platform.os.as_str()));
            assert!(selected.name.contains(platform.arch.as_str()));
        }
    }

    #[test]
    fn test_select_asset_aliases() {
        let assets = vec![
            asset("tool-x86_64-unknown-linux-musl.tar.gz"),
            asset("tool-aarch64-apple-darwin.tar.gz"),
            asset("tool-x86_64-pc-windows-msvc.zip"),
        ];
        let pick = |os, arch| select_asset(&assets, Platform::new(os, arch)).map(|a| a.name.as_str());

        assert_eq!(pick(Os::Linux, Arch::Amd64), Some("tool-x86_64-unknown-linux-musl.tar.gz"));
        assert_eq!(pick(Os::Darwin, Arch::Arm64), Some("tool-aarch64-apple-darwin.tar.gz"));
        assert_eq!(pick(Os::Windows, Arch::Amd64), Some("tool-x86_64-pc-windows-msvc.zip"));
        assert_eq!(pick(Os::Linux, Arch::Arm64), None);
    }

    #[test]
    fn test_select_asset_prefers_primary_tokens() {
        let assets = vec![asset("tool-linux-x64.tar.gz"), asset("tool-linux-amd64.tar.gz")];
        let selected = select_asset(&assets, Platform::new(Os::Linux, Arch::Amd64)).unwrap();
        assert_eq!(selected.name, "tool-linux-amd64.tar.gz");
    }

    #[test]
    fn test_select_asset_requires_whole_words() {
        // "darwin" must not match inside "notdarwin", nor "arm64" inside "arm64e"
        let assets = vec![asset("tool-notdarwin-arm64e.tar.gz")];
        assert!(select_asset(&assets, Platform::new(Os::Darwin, Arch::Arm64)).is_none());
    }

    #[test]
    fn test_resolved_release_rejects_plain_http() {
        let mut a = asset("tool_linux_amd64.tar.gz");
        a.browser_download_url = "http://example.com/tool_linux_amd64.tar.gz".into();
        assert!(matches!(
            ResolvedRelease::new("v1.0.0", &a),
            Err(SetupError::InvalidAssetUrl(_))
        ));

        a.browser_download_url = "http://127.0.0.1:8080/tool_linux_amd64.tar.gz".into();
        assert!(ResolvedRelease::new("v1.0.0", &a).is_ok());
    }

    #[tokio::test]
    async fn test_tag_normalization_is_idempotent() {
        let platform = Platform::new(Os::Linux, Arch::Amd64);

        for tag in ["v1.0.0", "1.0.0"] {
            let resolver = Resolver::new(FakeApi::new(vec![release(tag, STANDARD_ASSETS)]), "o/tool");
            let with_v = resolver
                .resolve(&VersionRequest::parse("v1.0.0"), platform)
                .await
                .unwrap();
            let bare = resolver
                .resolve(&VersionRequest::parse("1.0.0"), platform)
                .await
                .unwrap();
            assert_eq!(with_v, bare);
            assert_eq!(with_v.tag, tag);
        }
    }

    #[tokio::test]
    async fn test_literal_tag_is_tried_first() {
        let api = FakeApi::new(vec![release("v1.0.0", STANDARD_ASSETS)]);
        let resolver = Resolver::new(api, "o/tool");
        resolver
            .resolve(&VersionRequest::parse("1.0.0"), Platform::new(Os::Linux, Arch::Amd64))
            .await
            .unwrap();

        assert_eq!(*resolver.api.queries.lock().unwrap(), vec!["1.0.0", "v1.0.0"]);
    }

    #[tokio::test]
    async fn test_latest_passes_through() {
        let api = FakeApi::new(vec![
            release("v1.0.0", STANDARD_ASSETS),
            release("v2.0.0", STANDARD_ASSETS),
        ]);
        let resolver = Resolver::new(api, "o/tool");
        let resolved = resolver
            .resolve(&VersionRequest::Latest, Platform::new(Os::Darwin, Arch::Arm64))
            .await
            .unwrap();

        // Whatever the host calls latest, not the highest version
        assert_eq!(resolved.tag, "v1.0.0");
        assert_eq!(resolved.asset_name, "tool_1.0.0_darwin_arm64.tar.gz");
        assert_eq!(*resolver.api.queries.lock().unwrap(), vec!["latest"]);
    }

    #[tokio::test]
    async fn test_nonexistent_tag_is_release_not_found() {
        let resolver = Resolver::new(FakeApi::new(vec![release("v1.0.0", STANDARD_ASSETS)]), "o/tool");
        let err = resolver
            .resolve(&VersionRequest::parse("v999.999.999"), Platform::new(Os::Linux, Arch::Amd64))
            .await
            .unwrap_err();

        assert!(matches!(err, SetupError::ReleaseNotFound { ref version, .. } if version == "v999.999.999"));
    }

    #[tokio::test]
    async fn test_missing_platform_asset_suggests_names() {
        let resolver = Resolver::new(
            FakeApi::new(vec![release("v1.0.0", &["tool_1.0.0_linux_386.tar.gz", "checksums.txt"])]),
            "o/tool",
        );
        let err = resolver
            .resolve(&VersionRequest::parse("v1.0.0"), Platform::new(Os::Linux, Arch::Amd64))
            .await
            .unwrap_err();

        match err {
            SetupError::AssetNotFound { tag, suggestions, .. } => {
                assert_eq!(tag, "v1.0.0");
                assert_eq!(suggestions[0], "tool_1.0.0_linux_386.tar.gz");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

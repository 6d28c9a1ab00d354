//! Release asset download with progress tracking

use crate::error::{Result, SetupError};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::io::IsTerminal;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// SHA256 of a file as lowercase hex
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// HTTP downloader for release assets
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    token: Option<String>,
    token_hosts: Vec<String>,
}

impl Downloader {
    /// The token is only sent to github.com and to the host serving `api_url`
    /// (plus its parent when that host is `api.<domain>`).
    pub fn new(token: Option<String>, api_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("setup-release/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut token_hosts = vec!["github.com".to_string()];
        let api_host = Url::parse(api_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        if let Some(host) = api_host {
            if let Some(parent) = host.strip_prefix("api.") {
                token_hosts.push(parent.to_string());
            }
            token_hosts.push(host);
        }

        Ok(Self {
            client,
            token: token.filter(|t| !t.is_empty()),
            token_hosts,
        })
    }

    /// Token to attach when fetching `url`, if its host is trusted.
    fn token_for(&self, url: &str) -> Option<&str> {
        let token = self.token.as_deref()?;
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        self.token_hosts
            .iter()
            .any(|h| h.eq_ignore_ascii_case(host))
            .then_some(token)
    }

    /// Download `url` to `output_path` in a single attempt. Returns the byte count.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Download`] on transport failure or a non-2xx status.
    pub async fn download(&self, url: &str, output_path: &Path, label: &str) -> Result<u64> {
        debug!(%url, path = %output_path.display(), "Downloading asset");

        let mut request = self.client.get(url);
        if let Some(token) = self.token_for(url) {
            request = request.bearer_auth(token);
        } else if self.token.is_some() {
            debug!(%url, "Asset host is not trusted with the token");
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| SetupError::Download(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SetupError::Download(format!("HTTP {} for {}", status, url)));
        }

        let pb = progress_bar(label, response.content_length());

        let mut file = fs::File::create(output_path).await?;
        let mut downloaded: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SetupError::Download(format!("{}: {}", url, e)))?
        {
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }

        file.flush().await?;
        pb.finish_and_clear();

        info!(%url, bytes = downloaded, "Downloaded asset");
        Ok(downloaded)
    }
}

/// Byte progress on an interactive terminal, hidden in CI logs
fn progress_bar(label: &str, total: Option<u64>) -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total.unwrap_or(0));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(format!("⬇ {}", label));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use tempfile::TempDir;

    #[test]
    fn test_sha256_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data");
        std::fs::write(&path, b"hello").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn download_writes_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/asset.tar.gz")
            .match_header("authorization", "Bearer t0ken")
            .with_status(200)
            .with_body("archive bytes")
            .expect(1)
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let out = temp.path().join("asset.tar.gz");
        let downloader = Downloader::new(Some("t0ken".into()), &server.url()).unwrap();
        let bytes = downloader
            .download(&format!("{}/asset.tar.gz", server.url()), &out, "asset")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, 13);
        assert_eq!(std::fs::read(&out).unwrap(), b"archive bytes");
    }

    #[tokio::test]
    async fn download_fails_on_error_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.zip")
            .with_status(404)
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let downloader = Downloader::new(None, &server.url()).unwrap();
        let err = downloader
            .download(
                &format!("{}/missing.zip", server.url()),
                &temp.path().join("missing.zip"),
                "missing",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SetupError::Download(ref msg) if msg.contains("404")));
        assert_eq!(err.stage(), "download");
    }

    #[tokio::test]
    async fn token_is_withheld_from_foreign_hosts() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/asset.tar.gz")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("archive bytes")
            .expect(1)
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let downloader =
            Downloader::new(Some("t0ken".into()), "https://ghe.example.com/api/v3").unwrap();
        downloader
            .download(
                &format!("{}/asset.tar.gz", server.url()),
                &temp.path().join("asset.tar.gz"),
                "asset",
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[test]
    fn token_hosts_cover_github_and_api_parent() {
        let downloader = Downloader::new(Some("t".into()), "https://api.github.com").unwrap();
        assert_eq!(
            downloader.token_for("https://github.com/o/tool/releases/download/v1/a.zip"),
            Some("t")
        );
        assert_eq!(downloader.token_for("https://mirror.example.com/a.zip"), None);

        let ghe = Downloader::new(Some("t".into()), "https://ghe.example.com/api/v3").unwrap();
        assert_eq!(ghe.token_for("https://ghe.example.com/o/tool/a.zip"), Some("t"));
    }
}

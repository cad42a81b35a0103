//! Release metadata retrieval.
//!
//! The planner and manifest sync consume releases through the
//! [`ReleaseClient`] trait; [`GitHubClient`] is the GitHub-API-backed
//! implementation used by the CLI.

use std::path::{Path, PathBuf};
use serde::Deserialize;
use thiserror::Error;

use crate::archive;
use crate::identity::RepositoryIdentity;

/// Which release of a repository to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Tag(String),
}

impl VersionSelector {
    pub fn tag(&self) -> Option<&str> {
        match self {
            VersionSelector::Latest => None,
            VersionSelector::Tag(tag) => Some(tag),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseAsset {
    pub file_name: String,
    pub download_url: String,
}

/// One release: the resolved tag plus its downloadable assets.
#[derive(Debug, Clone)]
pub struct Release {
    pub tag: String,
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// The repository has no releases, or the requested tag does not
    /// exist. Surfaced immediately, without retries.
    #[error("no release found for {reference} ({selector})")]
    NotFound {
        reference: String,
        selector: String,
    },
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Archive(#[from] archive::ArchiveError),
}

/// Remote release/asset metadata retrieval and raw downloads.
pub trait ReleaseClient: Send + Sync {
    fn fetch_release(
        &self,
        identity: &RepositoryIdentity,
        selector: &VersionSelector,
    ) -> Result<Release, FetchError>;

    /// Downloads a URL into `dest_dir`, returning the local file path.
    fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    tag_name: String,
    #[serde(default)]
    assets: Vec<ApiAsset>,
}

#[derive(Debug, Deserialize)]
struct ApiAsset {
    name: String,
    browser_download_url: String,
}

/// GitHub-style release API client. Honors `GITHUB_TOKEN` for private
/// repositories and rate limits.
pub struct GitHubClient {
    client: reqwest::blocking::Client,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new() -> Self {
        GitHubClient {
            client: reqwest::blocking::Client::new(),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }

    fn api_url(identity: &RepositoryIdentity, selector: &VersionSelector) -> String {
        let base = format!(
            "https://api.{}/repos/{}/{}/releases",
            identity.host(),
            identity.owner(),
            identity.short_name()
        );
        match selector {
            VersionSelector::Latest => format!("{base}/latest"),
            VersionSelector::Tag(tag) => format!("{base}/tags/{tag}"),
        }
    }
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseClient for GitHubClient {
    fn fetch_release(
        &self,
        identity: &RepositoryIdentity,
        selector: &VersionSelector,
    ) -> Result<Release, FetchError> {
        let url = Self::api_url(identity, selector);
        let mut request = self
            .client
            .get(&url)
            .header("User-Agent", "roost")
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request.send()?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(FetchError::NotFound {
                reference: identity.reference_name(),
                selector: match selector {
                    VersionSelector::Latest => "latest".to_string(),
                    VersionSelector::Tag(tag) => tag.clone(),
                },
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let release: ApiRelease = response.json()?;
        Ok(Release {
            tag: release.tag_name,
            assets: release
                .assets
                .into_iter()
                .map(|asset| ReleaseAsset {
                    file_name: asset.name,
                    download_url: asset.browser_download_url,
                })
                .collect(),
        })
    }

    fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        Ok(archive::download_to(url, dest_dir)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_shapes() {
        let identity = RepositoryIdentity::parse("owner/repo").unwrap();
        assert_eq!(
            GitHubClient::api_url(&identity, &VersionSelector::Latest),
            "https://api.github.com/repos/owner/repo/releases/latest"
        );
        assert_eq!(
            GitHubClient::api_url(&identity, &VersionSelector::Tag("1.0.0".to_string())),
            "https://api.github.com/repos/owner/repo/releases/tags/1.0.0"
        );
    }
}

//! GitHub REST release listing.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header;
use serde::Deserialize;
use tracing::debug;

use crate::error::InstallError;

/// Releases requested per page; the maximum the API allows.
pub const PER_PAGE: u32 = 100;

/// A release as listed by the API. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubRelease {
    /// Tag as published, e.g. `v1.2.3` or `nightly`.
    pub tag_name: String,
    /// Drafts are never installed.
    #[serde(default)]
    pub draft: bool,
    /// Uploaded files, in upload order.
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

/// A file attached to a release.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubAsset {
    /// File name, matched against target triples.
    pub name: String,
    /// Public download link.
    pub browser_download_url: String,
}

#[derive(Debug, Deserialize)]
struct GithubApiError {
    message: String,
}

/// One page of a release listing, newest first as the API returns it.
#[derive(Debug, Clone, Default)]
pub struct ReleasePage {
    /// Releases on this page.
    pub releases: Vec<GithubRelease>,
    /// Whether the server advertised a following page.
    pub has_next: bool,
}

/// A paginated source of releases for a repository.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch page `page` (1-based).
    async fn fetch_page(&self, owner: &str, repo: &str, page: u32)
    -> Result<ReleasePage, InstallError>;
}

/// [`ReleaseSource`] backed by `GET /repos/{owner}/{repo}/releases`.
#[derive(Debug, Clone)]
pub struct GitHubReleases {
    client: Client,
    api_url: String,
}

impl GitHubReleases {
    /// `client` should come from [`super::build_github_client`] so the token
    /// and user agent are attached.
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    fn page_url(&self, owner: &str, repo: &str, page: u32) -> String {
        format!(
            "{}/repos/{owner}/{repo}/releases?per_page={PER_PAGE}&page={page}",
            self.api_url
        )
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleases {
    async fn fetch_page(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<ReleasePage, InstallError> {
        let listing_error = |message: String| InstallError::ReleaseListing {
            owner: owner.to_string(),
            name: repo.to_string(),
            message,
        };

        let url = self.page_url(owner, repo, page);
        debug!(%url, "Fetching release page");

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| listing_error(format!("page {page}: {e}")))?;

        // grab what we need before `text()` consumes the response
        let status = response.status();
        let has_next = response
            .headers()
            .get(header::LINK)
            .and_then(|link| link.to_str().ok())
            .is_some_and(|link| link.contains(r#"rel="next""#));

        let body = response
            .text()
            .await
            .map_err(|e| listing_error(format!("page {page}: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GithubApiError>(&body)
                .map_or(body, |err| err.message);
            return Err(listing_error(format!("{message} ({status})")));
        }

        let releases: Vec<GithubRelease> = serde_json::from_str(&body)
            .map_err(|e| listing_error(format!("invalid JSON on page {page}: {e}")))?;
        debug!(page, count = releases.len(), has_next, "Fetched release page");

        Ok(ReleasePage { releases, has_next })
    }
}

//! Release listings and release selection
/// GitHub REST release listing.
pub mod github;
/// Release and asset selection.
pub mod matcher;

pub use github::{GitHubReleases, GithubAsset, GithubRelease, ReleasePage, ReleaseSource};
pub use matcher::{release_pages, resolve_release, select_asset};

use reqwest::header;
use thiserror::Error;

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Failure to construct the API client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The token contains bytes that cannot go in a header.
    #[error("GitHub token is not a valid header value")]
    InvalidToken(#[from] header::InvalidHeaderValue),

    /// TLS backend or client configuration failed.
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Build an HTTP client, authenticated when a token is given.
///
/// The same client downloads assets, so the token also reaches
/// `browser_download_url` (which GitHub accepts for private repositories).
pub fn build_github_client(token: Option<&str>) -> Result<reqwest::Client, ClientError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(crate::USER_AGENT),
    );

    if let Some(t) = token.map(str::trim).filter(|t| !t.is_empty()) {
        let mut value = header::HeaderValue::from_str(&format!("Bearer {t}"))?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
    }

    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .build()?)
}

//! Picks the release and asset to install.
//!
//! Pages are pulled lazily; as soon as one page contains a qualifying release
//! no further pages are requested. Within the listing the first qualifying
//! release wins, so the API's ordering (newest first) decides ties.

use std::pin::pin;

use futures::stream::{self, Stream, TryStreamExt};
use prebuilt_schema::{PlatformTargets, ReleaseCandidate, VersionConstraint, normalize_version};
use semver::Version;
use tracing::{debug, info};

use super::github::{GithubAsset, GithubRelease, ReleasePage, ReleaseSource};
use crate::error::InstallError;

/// Lazily page through the releases of `owner/repo`.
///
/// The stream ends after a page without a `next` link or after an empty page.
pub fn release_pages<'a>(
    source: &'a dyn ReleaseSource,
    owner: &'a str,
    repo: &'a str,
) -> impl Stream<Item = Result<ReleasePage, InstallError>> + 'a {
    stream::try_unfold(Some(1), move |next| next_page(source, owner, repo, next))
}

async fn next_page(
    source: &dyn ReleaseSource,
    owner: &str,
    repo: &str,
    next: Option<u32>,
) -> Result<Option<(ReleasePage, Option<u32>)>, InstallError> {
    let Some(page) = next else {
        return Ok(None);
    };
    let fetched = source.fetch_page(owner, repo, page).await?;
    if fetched.releases.is_empty() {
        return Ok(None);
    }
    let following = fetched.has_next.then(|| page + 1);
    Ok(Some((fetched, following)))
}

/// First asset naming one of `targets`, trying targets in preference order.
pub fn select_asset<'a>(
    release: &'a GithubRelease,
    targets: &PlatformTargets,
) -> Option<&'a GithubAsset> {
    targets.iter().find_map(|target| {
        release
            .assets
            .iter()
            .find(|asset| asset.name.contains(target))
    })
}

fn satisfies(tag: &str, constraint: Option<&VersionConstraint>) -> bool {
    match constraint {
        None => true,
        Some(constraint) => Version::parse(normalize_version(tag))
            .is_ok_and(|version| constraint.matches_version(&version)),
    }
}

fn qualify(
    release: &GithubRelease,
    constraint: Option<&VersionConstraint>,
    targets: &PlatformTargets,
) -> Option<ReleaseCandidate> {
    if release.draft {
        debug!(tag = %release.tag_name, "Skipping draft release");
        return None;
    }
    if !satisfies(&release.tag_name, constraint) {
        return None;
    }
    let asset = select_asset(release, targets)?;
    Some(ReleaseCandidate {
        tag: release.tag_name.clone(),
        version: normalize_version(&release.tag_name).to_string(),
        asset_name: asset.name.clone(),
        download_url: asset.browser_download_url.clone(),
    })
}

/// Find the release of `owner/name` to install.
///
/// `constraint` is an npm-style range; it is parsed before any request is made.
/// A missing or blank range accepts every non-draft release, non-semver tags
/// included. An explicit `*` only accepts semver releases without a prerelease.
pub async fn resolve_release(
    source: &dyn ReleaseSource,
    owner: &str,
    name: &str,
    constraint: Option<&str>,
    targets: &PlatformTargets,
) -> Result<ReleaseCandidate, InstallError> {
    let parsed = constraint
        .filter(|c| !c.trim().is_empty())
        .map(VersionConstraint::parse)
        .transpose()?;

    let mut pages = pin!(release_pages(source, owner, name));
    let mut page_no = 0u32;
    while let Some(page) = pages.try_next().await? {
        page_no += 1;
        let found = page
            .releases
            .iter()
            .find_map(|release| qualify(release, parsed.as_ref(), targets));
        if let Some(candidate) = found {
            info!(
                %owner, %name, tag = %candidate.tag, asset = %candidate.asset_name,
                "Selected release"
            );
            return Ok(candidate);
        }
        debug!(page = page_no, releases = page.releases.len(), "No qualifying release on page");
    }

    Err(InstallError::NoMatchingRelease {
        owner: owner.to_string(),
        name: name.to_string(),
        constraint: constraint.map(str::to_string),
    })
}

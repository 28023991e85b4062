//! Install orchestration: cache lookup, release resolution, fetch, commit.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use prebuilt_schema::{InstalledPackage, PackageRequest, Platform, VersionConstraint};
use tracing::{debug, info, instrument};

use crate::cache::{CacheError, ToolCache, version_from_dir};
use crate::error::InstallError;
use crate::io::ArtifactFetcher;
use crate::permissions::{PermissionOutcome, ensure_executable};
use crate::registry::{ReleaseSource, resolve_release};
use crate::reporter::{NullReporter, Reporter};

/// Ensures packages are present in the tool cache.
///
/// Repeated calls with the same request are answered from the cache without
/// touching the network.
pub struct Installer {
    source: Arc<dyn ReleaseSource>,
    cache: Arc<dyn ToolCache>,
    fetcher: ArtifactFetcher,
    platform: Platform,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("fetcher", &self.fetcher)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl Installer {
    /// An installer that reports nothing; see [`Installer::with_reporter`].
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        cache: Arc<dyn ToolCache>,
        fetcher: ArtifactFetcher,
        platform: Platform,
    ) -> Self {
        Self {
            source,
            cache,
            fetcher,
            platform,
            reporter: Arc::new(NullReporter),
        }
    }

    /// Send progress and failures to `reporter`.
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Make `request` available in the cache and return where it lives.
    pub async fn ensure_installed(
        &self,
        request: &PackageRequest,
    ) -> Result<InstalledPackage, InstallError> {
        let result = self.install(request).await;
        if let Err(e) = &result {
            self.reporter.failed(&request.name, &e.to_string());
        }
        result
    }

    #[instrument(skip_all, fields(owner = %request.owner, name = %request.name))]
    async fn install(&self, request: &PackageRequest) -> Result<InstalledPackage, InstallError> {
        let name = request.name.as_str();
        let constraint = request.constraint();
        if let Some(constraint) = constraint {
            VersionConstraint::parse(constraint)?;
        }

        if let Some(dir) = self.cache.find(name, request.cache_spec())? {
            let version = installed_version(&dir)?;
            debug!(%version, ?dir, "Cache hit");
            self.reporter.cached(name, &version);
            return Ok(installed(request, dir, version));
        }

        self.reporter.resolving(&request.owner, name, constraint);
        let targets = self.platform.targets()?;
        let candidate = resolve_release(
            self.source.as_ref(),
            &request.owner,
            name,
            constraint,
            &targets,
        )
        .await?;
        self.reporter.resolved(name, &candidate);

        let artifact = self
            .fetcher
            .fetch(
                &candidate.download_url,
                name,
                &candidate.version,
                &self.reporter,
            )
            .await?;

        let outcome = ensure_executable(
            artifact.root(),
            name,
            request.explicit_binary_path.as_deref(),
            &self.platform.os,
        )?;
        if let PermissionOutcome::Fixed(location) = &outcome {
            info!(path = ?location.path(), "Marked binary executable");
        }

        let dir = self
            .commit(artifact.root(), name, &candidate.version)
            .await?;
        drop(artifact);

        let version = installed_version(&dir)?;
        info!(%version, ?dir, "Installed");
        self.reporter
            .done(name, &version, &dir.display().to_string());
        Ok(installed(request, dir, version))
    }

    /// Copy the extracted tree into the cache off the async runtime.
    async fn commit(&self, root: &Path, name: &str, version: &str) -> Result<PathBuf, CacheError> {
        let cache = Arc::clone(&self.cache);
        let root_owned = root.to_path_buf();
        let name = name.to_string();
        let version = version.to_string();
        tokio::task::spawn_blocking(move || cache.commit(&root_owned, &name, &version))
            .await
            .map_err(|e| CacheError::Io {
                path: root.to_path_buf(),
                source: io::Error::other(e),
            })?
    }
}

fn installed_version(dir: &Path) -> Result<String, CacheError> {
    version_from_dir(dir)
        .map(str::to_string)
        .ok_or_else(|| CacheError::InvalidKey(dir.display().to_string()))
}

fn installed(request: &PackageRequest, directory: PathBuf, version: String) -> InstalledPackage {
    InstalledPackage {
        owner: request.owner.clone(),
        name: request.name.clone(),
        version,
        binary_path: request
            .explicit_binary_path
            .as_ref()
            .map(|path| directory.join(path)),
        directory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DirectoryCache;
    use crate::registry::{GitHubReleases, GithubAsset, GithubRelease, ReleasePage};
    use async_trait::async_trait;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use mockito::{Matcher, Server};
    use prebuilt_schema::{Arch, Os, ReleaseCandidate};
    use reqwest::Client;
    use std::fs;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::{TempDir, tempdir};

    const ASSET: &str = "toolx-x86_64-unknown-linux-musl.tar.gz";

    fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, *body).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// Serves one page of releases and counts requests.
    struct CountingSource {
        releases: Vec<GithubRelease>,
        requests: AtomicU32,
    }

    impl CountingSource {
        fn new(releases: Vec<GithubRelease>) -> Arc<Self> {
            Arc::new(Self {
                releases,
                requests: AtomicU32::new(0),
            })
        }

        fn requests(&self) -> u32 {
            self.requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReleaseSource for CountingSource {
        async fn fetch_page(
            &self,
            _owner: &str,
            _repo: &str,
            page: u32,
        ) -> Result<ReleasePage, InstallError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let releases = if page == 1 {
                self.releases.clone()
            } else {
                Vec::new()
            };
            Ok(ReleasePage {
                releases,
                has_next: false,
            })
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<String>>,
    }

    impl RecordingReporter {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl Reporter for RecordingReporter {
        fn resolving(&self, owner: &str, name: &str, _: Option<&str>) {
            self.push(format!("resolving {owner}/{name}"));
        }
        fn resolved(&self, _: &str, candidate: &ReleaseCandidate) {
            self.push(format!("resolved {}", candidate.tag));
        }
        fn downloading(&self, _: &str, _: &str, _: u64, _: Option<u64>) {}
        fn extracting(&self, _: &str, version: &str) {
            self.push(format!("extracting {version}"));
        }
        fn cached(&self, _: &str, version: &str) {
            self.push(format!("cached {version}"));
        }
        fn done(&self, _: &str, version: &str, _: &str) {
            self.push(format!("done {version}"));
        }
        fn failed(&self, name: &str, _: &str) {
            self.push(format!("failed {name}"));
        }
    }

    fn release(tag: &str, url: &str) -> GithubRelease {
        GithubRelease {
            tag_name: tag.to_string(),
            draft: false,
            assets: vec![GithubAsset {
                name: ASSET.to_string(),
                browser_download_url: url.to_string(),
            }],
        }
    }

    fn installer(tmp: &TempDir, source: Arc<dyn ReleaseSource>) -> Installer {
        let root = tmp.path().join("cache");
        let cache = Arc::new(DirectoryCache::with_arch(&root, &Arch::X86_64));
        let fetcher = ArtifactFetcher::new(Client::new(), crate::tmp_path(&root));
        Installer::new(
            source,
            cache,
            fetcher,
            Platform::new(Arch::X86_64, Os::Linux),
        )
    }

    async fn serve_asset(server: &mut Server, hits: usize) -> mockito::Mock {
        server
            .mock("GET", format!("/dl/{ASSET}").as_str())
            .with_status(200)
            .with_body(tar_gz(&[
                ("toolx-2.3.1/toolx", b"#!/bin/sh\necho toolx\n"),
                ("toolx-2.3.1/LICENSE", b"MIT"),
            ]))
            .expect(hits)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_end_to_end_against_github_api() {
        let mut server = Server::new_async().await;
        let download = serve_asset(&mut server, 1).await;
        let url = format!("{}/dl/{ASSET}", server.url());
        let listing = format!(
            r#"[
                {{"tag_name":"v2.3.1","draft":false,"prerelease":false,"assets":[{{"name":"{ASSET}","browser_download_url":"{url}"}}]}},
                {{"tag_name":"v1.9.0","draft":false,"prerelease":false,"assets":[{{"name":"{ASSET}","browser_download_url":"{url}"}}]}}
            ]"#
        );
        let api = server
            .mock("GET", "/repos/acme/toolx/releases")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_body(listing)
            .create_async()
            .await;

        let tmp = tempdir().unwrap();
        let source = Arc::new(GitHubReleases::new(Client::new(), server.url()));
        let installer = installer(&tmp, source);

        let request = PackageRequest::new("acme", "toolx").with_version_constraint("^2.0.0");
        let package = installer.ensure_installed(&request).await.unwrap();

        api.assert_async().await;
        download.assert_async().await;
        assert_eq!(package.version, "2.3.1");
        assert_eq!(package.owner, "acme");
        assert_eq!(package.name, "toolx");
        assert_eq!(
            package.directory,
            tmp.path().join("cache/toolx/2.3.1/x86_64")
        );
        assert!(package.directory.join("toolx").is_file());
        assert!(package.directory.join("LICENSE").is_file());
        assert_eq!(package.binary_path, None);
    }

    #[tokio::test]
    async fn test_second_install_is_served_from_cache() {
        let mut server = Server::new_async().await;
        let download = serve_asset(&mut server, 1).await;
        let url = format!("{}/dl/{ASSET}", server.url());

        let tmp = tempdir().unwrap();
        let source = CountingSource::new(vec![release("v2.3.1", &url)]);
        let reporter = Arc::new(RecordingReporter::default());
        let installer = installer(&tmp, source.clone()).with_reporter(reporter.clone());

        for constraint in ["", "^2"] {
            let request = PackageRequest::new("acme", "toolx").with_version_constraint(constraint);
            let first = installer.ensure_installed(&request).await.unwrap();
            let second = installer.ensure_installed(&request).await.unwrap();
            assert_eq!(first, second);
            assert_eq!(second.version, "2.3.1");
        }

        assert_eq!(source.requests(), 1);
        download.assert_async().await;
        assert_eq!(
            reporter.events(),
            vec![
                "resolving acme/toolx",
                "resolved v2.3.1",
                "extracting 2.3.1",
                "done 2.3.1",
                "cached 2.3.1",
                "cached 2.3.1",
                "cached 2.3.1",
            ]
        );
    }

    /// Cache that never touches the disk.
    struct MemoryCache(Mutex<Vec<(String, PathBuf)>>);

    impl ToolCache for MemoryCache {
        fn find(&self, name: &str, _: &str) -> Result<Option<PathBuf>, CacheError> {
            let entries = self.0.lock().unwrap();
            Ok(entries.iter().find(|(n, _)| n == name).map(|(_, p)| p.clone()))
        }

        fn commit(&self, _: &Path, name: &str, version: &str) -> Result<PathBuf, CacheError> {
            let dir = PathBuf::from("/virtual").join(name).join(version).join("x86_64");
            self.0.lock().unwrap().push((name.to_string(), dir.clone()));
            Ok(dir)
        }
    }

    #[tokio::test]
    async fn test_version_is_read_from_cache_layout() {
        let tmp = tempdir().unwrap();
        let source = CountingSource::new(Vec::new());
        let cache = Arc::new(MemoryCache(Mutex::new(vec![(
            "toolx".to_string(),
            PathBuf::from("/virtual/toolx/9.9.9/x86_64"),
        )])));
        let installer = Installer::new(
            source.clone(),
            cache,
            ArtifactFetcher::new(Client::new(), tmp.path().join(".tmp")),
            Platform::new(Arch::X86_64, Os::Linux),
        );

        let package = installer
            .ensure_installed(&PackageRequest::new("acme", "toolx").with_binary_path("toolx"))
            .await
            .unwrap();

        assert_eq!(package.version, "9.9.9");
        assert_eq!(
            package.binary_path,
            Some(PathBuf::from("/virtual/toolx/9.9.9/x86_64/toolx"))
        );
        assert_eq!(source.requests(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_installed_binary_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let mut server = Server::new_async().await;
        let _download = serve_asset(&mut server, 1).await;
        let url = format!("{}/dl/{ASSET}", server.url());

        let tmp = tempdir().unwrap();
        let installer = installer(&tmp, CountingSource::new(vec![release("v2.3.1", &url)]));

        let request = PackageRequest::new("acme", "toolx");
        let package = installer.ensure_installed(&request).await.unwrap();

        let mode = fs::metadata(package.directory.join("toolx"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[tokio::test]
    async fn test_explicit_binary_path_is_reported() {
        let mut server = Server::new_async().await;
        let _download = server
            .mock("GET", format!("/dl/{ASSET}").as_str())
            .with_status(200)
            .with_body(tar_gz(&[("bin/tx", b"bin"), ("README", b"hi")]))
            .create_async()
            .await;
        let url = format!("{}/dl/{ASSET}", server.url());

        let tmp = tempdir().unwrap();
        let installer = installer(&tmp, CountingSource::new(vec![release("v1.0.0", &url)]));

        let request = PackageRequest::new("acme", "toolx").with_binary_path("bin/tx");
        let package = installer.ensure_installed(&request).await.unwrap();

        assert_eq!(
            package.binary_path,
            Some(package.directory.join("bin").join("tx"))
        );
        assert!(package.binary_path.unwrap().is_file());
    }

    #[tokio::test]
    async fn test_no_match_leaves_cache_empty() {
        let tmp = tempdir().unwrap();
        let source = CountingSource::new(vec![release("v1.9.0", "http://unused.invalid/x")]);
        let reporter = Arc::new(RecordingReporter::default());
        let installer = installer(&tmp, source).with_reporter(reporter.clone());

        let request = PackageRequest::new("acme", "toolx").with_version_constraint("^2.0.0");
        let err = installer.ensure_installed(&request).await.unwrap_err();

        assert!(matches!(err, InstallError::NoMatchingRelease { .. }));
        assert!(!tmp.path().join("cache").join("toolx").exists());
        assert_eq!(reporter.events().last().unwrap(), "failed toolx");
    }

    #[tokio::test]
    async fn test_download_failure_commits_nothing() {
        let mut server = Server::new_async().await;
        let _download = server
            .mock("GET", format!("/dl/{ASSET}").as_str())
            .with_status(404)
            .create_async()
            .await;
        let url = format!("{}/dl/{ASSET}", server.url());

        let tmp = tempdir().unwrap();
        let installer = installer(&tmp, CountingSource::new(vec![release("v2.3.1", &url)]));

        let err = installer
            .ensure_installed(&PackageRequest::new("acme", "toolx"))
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::DownloadFailed(_)));
        assert!(!tmp.path().join("cache").join("toolx").exists());
        // scratch workspaces are cleaned up
        let leftovers = fs::read_dir(tmp.path().join("cache").join(".tmp"))
            .map(Iterator::count)
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_invalid_constraint_fails_before_any_work() {
        let tmp = tempdir().unwrap();
        let source = CountingSource::new(Vec::new());
        let installer = installer(&tmp, source.clone());

        let request = PackageRequest::new("acme", "toolx").with_version_constraint(">=banana");
        let err = installer.ensure_installed(&request).await.unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(source.requests(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_platform_after_cache_miss() {
        let tmp = tempdir().unwrap();
        let source = CountingSource::new(Vec::new());
        let root = tmp.path().join("cache");
        let installer = Installer::new(
            source.clone(),
            Arc::new(DirectoryCache::with_arch(&root, &Arch::X86)),
            ArtifactFetcher::new(Client::new(), crate::tmp_path(&root)),
            Platform::new(Arch::X86, Os::FreeBsd),
        );

        let err = installer
            .ensure_installed(&PackageRequest::new("acme", "toolx"))
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::UnsupportedPlatform(_)));
        assert_eq!(source.requests(), 0);
    }
}

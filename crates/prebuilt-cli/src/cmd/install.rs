use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use prebuilt_core::io::ArtifactFetcher;
use prebuilt_core::registry::{GitHubReleases, build_github_client};
use prebuilt_core::{DirectoryCache, Installer, tmp_path};
use prebuilt_schema::{InstalledPackage, PackageRequest, Platform};
use tracing::debug;

use crate::GlobalArgs;
use crate::ui::TermReporter;

/// File GitHub Actions reads extra `PATH` entries from.
pub const GITHUB_PATH_ENV: &str = "GITHUB_PATH";
/// File GitHub Actions reads step outputs from.
pub const GITHUB_OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// Install `owner/name` and print the directory (or the full result as JSON).
pub async fn install(
    global: &GlobalArgs,
    owner: &str,
    name: &str,
    version: Option<&str>,
    bin: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let root = global.cache_root()?;
    debug!(root = ?root, api = %global.api_url, "Using cache");

    let client = build_github_client(global.github_token.as_deref())?;
    let installer = Installer::new(
        Arc::new(GitHubReleases::new(client.clone(), global.api_url.as_str())),
        Arc::new(DirectoryCache::new(&root)),
        ArtifactFetcher::new(client, tmp_path(&root)),
        Platform::current(),
    )
    .with_reporter(Arc::new(TermReporter::stderr(global.quiet)));

    let mut request = PackageRequest::new(owner, name);
    if let Some(version) = version {
        request = request.with_version_constraint(version);
    }
    if let Some(bin) = bin {
        request = request.with_binary_path(bin);
    }

    let package = installer.ensure_installed(&request).await?;
    export_to_actions(&package)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&package)?);
    } else {
        println!("{}", package.directory.display());
    }
    Ok(())
}

/// Add the package to `$GITHUB_PATH` and `$GITHUB_OUTPUT` when running in Actions.
pub fn export_to_actions(package: &InstalledPackage) -> Result<()> {
    if let Some(path) = env_file(GITHUB_PATH_ENV) {
        append_lines(&path, &[package.directory.display().to_string()])?;
    }
    if let Some(path) = env_file(GITHUB_OUTPUT_ENV) {
        append_lines(
            &path,
            &[
                format!("version={}", package.version),
                format!("dir={}", package.directory.display()),
            ],
        )?;
    }
    Ok(())
}

fn env_file(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn append_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    for line in lines {
        writeln!(file, "{line}").with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

//! prebuilt - install release binaries from GitHub
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Resolves a GitHub release matching the host platform and an optional
//! version range, unpacks its asset into a shared tool cache and prints the
//! directory to put on `PATH`. Inside GitHub Actions the directory is also
//! appended to `$GITHUB_PATH`.

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use prebuilt_core::registry::DEFAULT_API_URL;

#[derive(Debug, Parser)]
#[command(name = "prebuilt")]
#[command(author, version, about = "Install prebuilt release binaries from GitHub")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Token for the GitHub API (raises rate limits, grants private repos)
    #[arg(long, env = "GITHUB_TOKEN", global = true, hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", global = true, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Tool cache directory
    #[arg(long, env = prebuilt_core::CACHE_DIR_ENV, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Only print results and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl GlobalArgs {
    /// The cache root: the flag, then `RUNNER_TOOL_CACHE`, then the user cache dir.
    pub fn cache_root(&self) -> Result<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(prebuilt_core::try_cache_root)
            .context("Could not determine a cache directory; pass --cache-dir")
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install a package from its GitHub releases
    Install {
        /// Repository owner
        owner: String,
        /// Repository name (also the binary name)
        name: String,
        /// Version range, e.g. `^2`, `1.x`, `>=1.4 <2`
        #[arg(long, short = 'v')]
        version: Option<String>,
        /// Path of the executable inside the archive
        #[arg(long)]
        bin: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the release targets this machine can run
    Targets,
    /// Look up a package in the cache without installing
    Find {
        /// Package name
        name: String,
        /// Version range (defaults to any)
        #[arg(long, short = 'v')]
        version: Option<String>,
    },
}

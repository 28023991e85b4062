//! prebuilt CLI

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use prebuilt_cli::cmd;
use prebuilt_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // stdout carries results only
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Install {
            owner,
            name,
            version,
            bin,
            json,
        } => {
            cmd::install::install(&cli.global, &owner, &name, version.as_deref(), bin, json)
                .await?;
        }
        Commands::Targets => cmd::targets::targets()?,
        Commands::Find { name, version } => {
            if !cmd::find::find(&cli.global, &name, version.as_deref())? {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

// cutdraft CLI entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

mod commands;
mod config;
mod draft_dir;
mod output;

use config::GlobalConfig;

#[derive(Parser)]
#[command(name = "cutdraft", about = "Assemble video editor drafts from structured requests")]
struct Cli {
    /// Config file (default: ~/.cutdraft/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => GlobalConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GlobalConfig::load(),
    };
    debug!(?config, "configuration loaded");
    commands::run(cli.command, &config)
}

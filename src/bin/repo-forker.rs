//! CLI for the repo-forker tool.
//!
//! Exit codes: `0` when the run finished, `2` for config errors, `1` for any
//! other setup error, `3` with `--strict` when at least one fork failed.

use anyhow::{Context, Result};
use clap::Parser;
use repo_forker::bitbucket::DEFAULT_API_BASE;
use repo_forker::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_SETUP_ERROR: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_FORK_FAILED: u8 = 3;

#[derive(Parser)]
#[command(name = "repo-forker")]
#[command(
    author,
    version,
    about = "Fork the Bitbucket repositories listed in a config file",
    long_about = None
)]
struct Cli {
    /// Path to the fork config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Bitbucket API base URL
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Retries after a failed connect (timeouts are never retried, the fork may exist)
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Log the requests without sending them
    #[arg(long)]
    dry_run: bool,

    /// Exit non-zero when any fork fails
    #[arg(long)]
    strict: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(summary) if cli.strict && summary.has_failures() => ExitCode::from(EXIT_FORK_FAILED),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            let code = match e.downcast_ref::<ForkerError>() {
                Some(err) if err.is_config_error() => EXIT_CONFIG_ERROR,
                _ => EXIT_SETUP_ERROR,
            };
            ExitCode::from(code)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "repo_forker=debug"
    } else {
        "repo_forker=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

fn run(cli: &Cli) -> Result<ForkSummary> {
    let config = ForkConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    tracing::info!(
        config = %cli.config.display(),
        owner = %config.owner,
        repos = config.repos.len(),
        "Loaded fork config"
    );

    let mut options = ForkOptions::new()
        .api_base(&cli.api_base)
        .timeout(Duration::from_secs(cli.timeout))
        .retries(cli.retries);
    if cli.dry_run {
        options = options.dry_run();
    }

    let forker = Forker::new(config, options).context("Failed to set up Bitbucket client")?;
    Ok(forker.fork_all())
}

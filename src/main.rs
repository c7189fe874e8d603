// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Command-line interface for the qoda harvester.
//!
//! Settings come from built-in defaults, an optional YAML file and command
//! line flags, in increasing precedence. The JSON artifact is written only
//! when the whole run succeeds.

use std::{path::PathBuf, process, sync::Arc, time::Duration};

use clap::{ArgAction, Parser};
use indicatif::ProgressBar;
use qoda::{Error, GitHubHost, GunningFog, HarvestConfig, Harvester, load_config, write_records};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Command line interface for harvesting documentation readability.
#[derive(Debug, Parser,)]
#[command(
    name = "qoda",
    version,
    about = "Harvest documentation size and readability of popular GitHub repositories"
)]
struct Cli
{
    /// Optional YAML file with harvest settings.
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf,>,

    /// GitHub personal access token.
    #[arg(long = "token", env = "QODA_GITHUB_PAT", hide_env_values = true, value_name = "TOKEN")]
    token: Option<String,>,

    /// Minimum stargazer count of discovered repositories.
    #[arg(long = "min-stars", value_name = "COUNT")]
    min_stars: Option<u64,>,

    /// Number of repositories to discover.
    #[arg(long = "sample-size", value_name = "COUNT")]
    sample_size: Option<usize,>,

    /// Documentation extension; repeat to configure several.
    #[arg(long = "extension", value_name = "EXT", action = ArgAction::Append)]
    extensions: Vec<String,>,

    /// Maximum number of documentation files scored per repository.
    #[arg(long = "max-files", value_name = "COUNT")]
    max_files: Option<usize,>,

    /// Destination of the JSON artifact.
    #[arg(long = "output", value_name = "PATH")]
    output: Option<PathBuf,>,

    /// Number of repositories processed at the same time.
    #[arg(long = "concurrency", value_name = "COUNT")]
    concurrency: Option<usize,>,

    /// Score the README of repositories without documentation files.
    #[arg(long = "readme-fallback", action = ArgAction::SetTrue)]
    readme_fallback: bool,

    /// Output formatted JSON for easier inspection.
    #[arg(long = "pretty", action = ArgAction::SetTrue)]
    pretty: bool,

    /// Cancel the run after this many seconds without writing output.
    #[arg(long = "deadline-secs", value_name = "SECONDS")]
    deadline_secs: Option<u64,>,
}

/// Entry point that reports errors and sets the appropriate exit status.
#[tokio::main]
async fn main()
{
    init_tracing();

    if let Err(error,) = run(Cli::parse(),).await {
        eprintln!("{}", error.to_display_string());
        process::exit(1,);
    }
}

fn init_tracing()
{
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info",),),)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr,),)
        .init();
}

/// Executes a harvest described by the parsed arguments.
///
/// # Errors
///
/// Propagates credential, configuration, harvest and output errors.
async fn run(cli: Cli,) -> Result<(), Error,>
{
    let token = require_token(cli.token.as_deref(),)?.to_owned();
    let config = resolve_config(&cli,)?;
    let output = config.output.clone();
    let pretty = config.pretty;

    info!(
        "Harvesting up to {} repositories with at least {} stars ({} workers)",
        config.sample_size, config.min_stars, config.concurrency
    );

    let host = Arc::new(GitHubHost::new(&token,)?,);
    let harvester =
        Harvester::new(config, host, Arc::new(GunningFog,),).with_progress(ProgressBar::new(0,),);

    let deadline = cli.deadline_secs.map(Duration::from_secs,);
    let records = harvester.run_until(shutdown_signal(deadline,),).await?;

    write_records(&output, &records, pretty,)
}

/// Returns the trimmed token or a validation error when it is missing.
fn require_token(token: Option<&str,>,) -> Result<&str, Error,>
{
    token.map(str::trim,).filter(|value| !value.is_empty(),).ok_or_else(|| {
        Error::validation("missing GitHub token: set QODA_GITHUB_PAT or pass --token",)
    },)
}

/// Builds the effective configuration from the optional file and the flags.
fn resolve_config(cli: &Cli,) -> Result<HarvestConfig, Error,>
{
    let mut config = match cli.config.as_deref() {
        Some(path,) => load_config(path,)?,
        None => HarvestConfig::default(),
    };

    if let Some(min_stars,) = cli.min_stars {
        config.min_stars = min_stars;
    }
    if let Some(sample_size,) = cli.sample_size {
        config.sample_size = sample_size;
    }
    if !cli.extensions.is_empty() {
        config.doc_extensions = cli.extensions.clone();
    }
    if let Some(max_files,) = cli.max_files {
        config.max_files_per_repo = max_files;
    }
    if let Some(output,) = &cli.output {
        config.output = output.clone();
    }
    if let Some(concurrency,) = cli.concurrency {
        config.concurrency = concurrency;
    }
    config.readme_fallback |= cli.readme_fallback;
    config.pretty |= cli.pretty;

    config.validate()
}

/// Resolves on Ctrl-C or once `deadline` has elapsed.
async fn shutdown_signal(deadline: Option<Duration,>,)
{
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok((),) => info!("Interrupt received"),
            Err(error,) => {
                warn!("Failed to listen for interrupts: {}", error);
                std::future::pending::<(),>().await;
            }
        }
    };

    match deadline {
        Some(limit,) => {
            tokio::select! {
                () = interrupt => {}
                () = tokio::time::sleep(limit) => warn!("Deadline of {:?} reached", limit),
            }
        }
        None => interrupt.await,
    }
}

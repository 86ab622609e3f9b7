//! Command-line entry point for genbank-dl

use clap::{Parser, Subcommand};
use genbank_dl::{Config, Pipeline};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fetch GenBank release archives and select records by organism")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Classify and count only; write no output files
    #[arg(long)]
    dry_run: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Hide progress bars
    #[arg(long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Download archives missing from the release directory
    Fetch,
    /// Filter archives already in the release directory
    Filter,
    /// Fetch, then filter
    Run,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    tokio::select! {
        result = run(&args) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "genbank-dl failed");
                ExitCode::FAILURE
            }
        },
        _ = wait_for_signal() => {
            tracing::warn!("interrupted; in-flight work was cancelled");
            ExitCode::from(130)
        }
    }
}

async fn run(args: &Args) -> genbank_dl::Result<()> {
    let mut config = Config::load(&args.config)?;
    if args.dry_run {
        config.dry_run = true;
    }
    let pipeline = Pipeline::new(config)?.with_progress_display(!args.quiet);

    match args.command {
        Command::Fetch => {
            let report = pipeline.fetch().await?;
            tracing::info!(
                transferred = report.transferred.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "fetch finished"
            );
            emit(args.json, &report)
        }
        Command::Filter => {
            let report = pipeline.filter().await?;
            tracing::info!(selected = report.total_matched(), "filter finished");
            emit(args.json, &report)
        }
        Command::Run => {
            let report = pipeline.run().await?;
            tracing::info!(
                transferred = report.fetch.transferred.len(),
                failed_fetches = report.fetch.failed.len(),
                selected = report.filter.total_matched(),
                "run finished"
            );
            emit(args.json, &report)
        }
    }
}

fn emit<T: Serialize>(json: bool, report: &T) -> genbank_dl::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for Ctrl+C only");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        std::future::pending::<()>().await;
    }
}

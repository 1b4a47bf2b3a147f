//! CLI entry point for the page loader.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use page_loader::download::HttpClient;
use page_loader::page::{PageLoader, PageRequest};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));

    // stdout carries only the saved page path
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(&args).await {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<PathBuf> {
    let config = args.loader_config()?;
    let request = PageRequest::new(&args.url, &args.output)?;
    let client = HttpClient::with_timeout(Duration::from_secs(args.timeout));
    let loader = PageLoader::new(Arc::new(client), config)?;

    let result = loader
        .load(&request)
        .await
        .with_context(|| format!("failed to load {}", request.url))?;

    info!(
        page = %result.saved_page_path.display(),
        assets = result.assets_downloaded,
        skipped = result.asset_failures.len(),
        "download complete"
    );

    std::path::absolute(&result.saved_page_path).with_context(|| {
        format!(
            "cannot resolve absolute path of {}",
            result.saved_page_path.display()
        )
    })
}

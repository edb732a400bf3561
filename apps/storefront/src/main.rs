mod commands;
mod config;
mod render;

use std::{io, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{HttpCatalogClient, TokioTicker};
use tracing_subscriber::EnvFilter;

use crate::commands::{Command, CommandContext};

#[derive(Parser, Debug)]
#[command(about = "Browse the app catalog from the terminal")]
struct Args {
    /// Overrides the configured catalog service URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref());
    if let Some(api_url) = args.api_url {
        settings.api_url = config::normalize_api_url(&api_url);
    }
    tracing::info!("storefront: using catalog service at {}", settings.api_url);

    let client = HttpCatalogClient::new(&settings.api_url, settings.request_timeout())
        .with_context(|| format!("invalid catalog service url {}", settings.api_url))?;
    let ctx = CommandContext {
        service: Arc::new(client),
        ticker: Arc::new(TokioTicker::current()?),
        featured_limit: settings.featured_limit,
        carousel_interval: settings.carousel_interval(),
    };

    // The carousel runs for its requested ticks on top of the fetch budget.
    let budget = match &args.command {
        Command::Carousel { ticks } => settings.batch_timeout().saturating_add(
            settings
                .carousel_interval()
                .saturating_mul(u32::try_from(*ticks).unwrap_or(u32::MAX)),
        ),
        _ => settings.batch_timeout(),
    };

    let mut stdout = io::stdout();
    tokio::time::timeout(budget, commands::dispatch(args.command, &ctx, &mut stdout))
        .await
        .with_context(|| format!("command timed out after {}ms", budget.as_millis()))??;

    Ok(())
}

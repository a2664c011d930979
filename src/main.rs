// src/main.rs
mod config;
mod extractors;
mod fetch;
mod pipeline;
mod server;
mod utils;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use config::ScraperConfig;
use fetch::{ChromeLauncher, PageFetcher};
use pipeline::Pipeline;
use server::{AppState, Pipelines};
use utils::{AppError, DiagnosticStore};

/// Sports odds, news and league table scrapers behind a JSON API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Chrome/Chromium binary (overrides GOOGLE_CHROME_BIN)
    #[arg(long, global = true)]
    chrome_path: Option<PathBuf>,

    /// Directory for failure snapshots (overrides SCRAPER_DIAGNOSTICS_DIR)
    #[arg(long, global = true)]
    diagnostics_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one scraper and print its JSON result
    Scrape {
        #[arg(value_enum)]
        domain: Domain,
    },
    /// Print the page markup a scraper would parse, without extracting anything
    Fetch {
        #[arg(value_enum)]
        domain: Domain,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Domain {
    LeagueOdds,
    News,
    LeagueTables,
    OddsBoard,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::debug!("Starting with args: {:?}", args);

    // 3. Environment first, flags on top
    let mut config = ScraperConfig::from_env()?;
    if let Some(path) = args.chrome_path {
        config.chrome_path = Some(path);
    }
    if let Some(dir) = args.diagnostics_dir {
        config.diagnostics_dir = dir;
    }

    match args.command {
        Command::Serve { host, port } => {
            if let Some(h) = host {
                config.host = h;
            }
            if let Some(p) = port {
                config.port = p;
            }
            let addr: SocketAddr = config
                .bind_address()
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid listen address {}: {}", config.bind_address(), e)))?;

            let state = Arc::new(AppState { fetcher: build_fetcher(&config)?, pipelines: Pipelines::default() });
            server::serve(addr, state).await
        }
        Command::Scrape { domain } => {
            let fetcher = build_fetcher(&config)?;
            let pipelines = Pipelines::default();
            match domain {
                Domain::LeagueOdds => scrape_once(&pipelines.league_odds, &fetcher).await,
                Domain::News => scrape_once(&pipelines.news, &fetcher).await,
                Domain::LeagueTables => scrape_once(&pipelines.league_tables, &fetcher).await,
                Domain::OddsBoard => scrape_once(&pipelines.odds_board, &fetcher).await,
            }
        }
        Command::Fetch { domain } => {
            let fetcher = build_fetcher(&config)?;
            let pipelines = Pipelines::default();
            match domain {
                Domain::LeagueOdds => dump_page(&pipelines.league_odds, &fetcher).await,
                Domain::News => dump_page(&pipelines.news, &fetcher).await,
                Domain::LeagueTables => dump_page(&pipelines.league_tables, &fetcher).await,
                Domain::OddsBoard => dump_page(&pipelines.odds_board, &fetcher).await,
            }
        }
    }
}

fn build_fetcher(config: &ScraperConfig) -> Result<PageFetcher, AppError> {
    let http = fetch::client::build_http_client(&config.user_agent, config.http_timeout)
        .map_err(|e| AppError::Config(format!("Could not build HTTP client: {}", e)))?;
    let launcher = ChromeLauncher::new(config.chrome_path.clone(), config.user_agent.clone());
    Ok(PageFetcher::new(http, Arc::new(launcher), DiagnosticStore::new(&config.diagnostics_dir))
        .with_overhead(config.render_overhead))
}

async fn dump_page<P: Pipeline>(pipeline: &P, fetcher: &PageFetcher) -> Result<(), AppError> {
    let markup = fetcher.fetch(&pipeline.target(), pipeline.mode()).await.map_err(|e| {
        tracing::error!("Fetching '{}' failed: {}", pipeline.name(), e);
        AppError::Pipeline(pipeline.name())
    })?;
    tracing::info!("Fetched {} bytes for '{}'", markup.len(), pipeline.name());
    println!("{}", markup);
    Ok(())
}

async fn scrape_once<P: Pipeline>(pipeline: &P, fetcher: &PageFetcher) -> Result<(), AppError> {
    let report = pipeline::run(pipeline, fetcher).await;
    tracing::info!("Scrape '{}' ended in {:?} ({} record(s) skipped)", pipeline.name(), report.state, report.skipped);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_failure() {
        tracing::error!("Scrape '{}' failed with status {}", pipeline.name(), report.status_code());
        return Err(AppError::Pipeline(pipeline.name()));
    }
    Ok(())
}

//! Audiobook Crawler CLI
//!
//! Local entry point for searches and magnet lookups.

use std::path::PathBuf;

use audiobook_crawler::{
    AudiobookCrawler,
    clients::ClientSettings,
    config,
    error::Result,
    models::Config,
    services::MirrorRegistry,
};
use clap::{Parser, Subcommand};
use serde::Serialize;

/// abb-crawler - Audiobook Torrent Crawler
#[derive(Parser, Debug)]
#[command(
    name = "abb-crawler",
    version,
    about = "Mirror-aware audiobook torrent crawler"
)]

struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search listings across result pages
    Search {
        query: String,

        /// Pages to fetch (default: crawler.page_limit)
        #[arg(long)]
        pages: Option<u32>,
    },

    /// Show a details page
    Details {
        url: String,

        /// Bypass the details cache
        #[arg(long)]
        refresh: bool,
    },

    /// Build the magnet link for a details page
    Magnet { url: String },

    /// Probe mirrors and print the active one
    Mirror,

    /// Validate the configuration
    Validate,
}

/// Initialize logging from the config level, or debug when verbose.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(crawler: &AudiobookCrawler, command: Command) -> Result<()> {
    match command {
        Command::Search { query, pages } => {
            let pages = pages.unwrap_or(crawler.config().crawler.page_limit);
            let books = crawler.search_pages(&query, pages).await?;
            log::info!("Found {} results for {:?}", books.len(), query);
            print_json(&books)
        }

        Command::Details { url, refresh } => {
            let details = if refresh {
                crawler.refresh_details(&url).await?
            } else {
                crawler.get_details(&url).await?
            };
            print_json(&details)
        }

        Command::Magnet { url } => {
            println!("{}", crawler.magnet_link(&url).await?);
            Ok(())
        }

        Command::Mirror => {
            println!("{}", crawler.active_mirror().await?);
            Ok(())
        }

        Command::Validate => validate(crawler.config()),
    }
}

fn validate(config: &Config) -> Result<()> {
    let registry = MirrorRegistry::from_config(&config.site);
    log::info!("{} mirror candidates", registry.len());
    for host in registry.hosts() {
        println!("mirror: {host}");
    }

    if config.client.kind.is_some() || config.client.url.is_some() {
        let settings = ClientSettings::resolve(&config.client)?;
        println!(
            "client: {} at {} (category {:?})",
            settings.kind, settings.base_url, settings.category
        );
    }

    println!("Configuration OK");
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_all(Some(&cli.config))?;
    init_logging(cli.verbose, &config.logging.level);

    log::debug!("Loaded configuration from {}", cli.config.display());

    if let Command::Validate = cli.command {
        return validate(&config);
    }

    let crawler = AudiobookCrawler::new(config)?;

    let outcome = tokio::select! {
        result = run(&crawler, cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted, shutting down");
            Ok(())
        }
    };

    crawler.shutdown().await;
    outcome
}

//! Harvester CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use harvester::{
    error::Result,
    models::Config,
    pipeline,
    services::{HttpRenderer, SelectorExtractor},
    storage::LocalArchive,
};

/// harvester - Incremental job listing crawler
#[derive(Parser, Debug)]
#[command(name = "harvester", version, about = "Incremental job listing crawler")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the listing and archive new postings
    Crawl {
        /// Override the listing URL from the config
        #[arg(long)]
        base_url: Option<String>,

        /// Skip the pause between pages (local testing only)
        #[arg(long)]
        no_delay: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Show archive and mirror status
    Info,

    /// Regenerate the mirror from the archive
    Mirror,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    log::debug!("Using configuration from {}", cli.config.display());

    let storage = LocalArchive::new(&config.paths.archive_file, &config.paths.mirror_file);

    match cli.command {
        Command::Crawl { base_url, no_delay } => {
            if let Some(url) = base_url {
                config.source.base_url = url;
            }
            if no_delay {
                log::warn!("Page delay disabled; do not use against a live source");
                config.crawler.page_delay_ms = 0;
            }
            config.validate()?;

            let renderer = HttpRenderer::new(&config.crawler, &config.source.page_param)?;
            let extractor = SelectorExtractor::new(&config.extractor)?;
            let summary = pipeline::run_crawler(&config, &renderer, &extractor, &storage).await?;

            let elapsed = summary.end_time - summary.start_time;
            log::info!(
                "Crawl complete: {} pages, {} collected, {} appended in {}s",
                summary.report.pages_fetched,
                summary.report.records.len(),
                summary.appended.len(),
                elapsed.num_seconds()
            );
        }

        Command::Validate => {
            pipeline::run_validate(&config)?;
            log::info!("All validations passed!");
        }

        Command::Info => {
            pipeline::run_info(&storage).await?;
        }

        Command::Mirror => match pipeline::regenerate_mirror(&storage).await? {
            Some(meta) => log::info!(
                "Mirror written to {} ({} jobs) at {}",
                meta.location,
                meta.record_count,
                meta.timestamp.to_rfc3339()
            ),
            None => log::warn!(
                "No archive at {}; nothing to mirror",
                storage.archive_path().display()
            ),
        },
    }

    Ok(())
}

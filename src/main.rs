//! Haodoo-Shelf command-line entry point

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use haodoo_shelf::config::{self, expand_tilde, Settings};
use haodoo_shelf::{CatalogStore, Crawler, Downloader, ShelfError};
use tracing_subscriber::EnvFilter;

/// Haodoo-Shelf: a patient catalog crawler and EPUB archiver
///
/// Walks the category index, builds a resumable CSV catalog of every book,
/// then downloads the EPUB files one at a time with a polite delay. Re-run
/// after any interruption; completed books are never fetched twice.
#[derive(Parser, Debug)]
#[command(name = "haodoo-shelf")]
#[command(version)]
#[command(about = "Crawl a book catalog and archive its EPUB files", long_about = None)]
struct Cli {
    /// Category index URL the crawl starts from
    #[arg(long, default_value = config::DEFAULT_START_URL, value_name = "URL")]
    start_url: String,

    /// Path of the catalog table
    #[arg(long, default_value = config::DEFAULT_OUTPUT, value_name = "PATH")]
    output: PathBuf,

    /// Directory downloads are placed under
    #[arg(long, default_value = config::DEFAULT_DOWNLOAD_DIR, value_name = "DIR")]
    download_dir: String,

    /// Seconds to sleep between downloads
    #[arg(long, default_value_t = config::DEFAULT_SLEEP_SECS, value_name = "SECS")]
    sleep: f64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT_SECS, value_name = "SECS")]
    timeout: u64,

    /// User-Agent header sent with every request
    #[arg(long, default_value = config::DEFAULT_USER_AGENT, value_name = "UA")]
    user_agent: String,

    /// Limit the number of categories crawled (0 = unlimited)
    #[arg(long, default_value_t = 0, value_name = "N")]
    max_categories: usize,

    /// Limit the number of new books collected per run (0 = unlimited)
    #[arg(long, default_value_t = 0, value_name = "N")]
    max_books: usize,

    /// Only crawl and build the catalog table
    #[arg(long)]
    crawl: bool,

    /// Only download using an existing catalog table
    #[arg(long)]
    download: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let settings = Settings {
        start_url: cli.start_url,
        output: cli.output,
        download_dir: expand_tilde(&cli.download_dir),
        sleep: Duration::from_secs_f64(cli.sleep),
        timeout: Duration::from_secs(cli.timeout),
        user_agent: cli.user_agent,
        max_categories: cli.max_categories,
        max_books: cli.max_books,
    };

    // Neither flag means both stages, in sequence.
    let do_crawl = cli.crawl || !cli.download;
    let do_download = cli.download || !cli.crawl;

    if do_download && !do_crawl && !settings.output.exists() {
        return Err(ShelfError::CatalogMissing(settings.output.clone()))
            .context("run a crawl first or pass --output");
    }

    let mut store = CatalogStore::load(&settings.output)
        .with_context(|| format!("failed to load catalog {}", settings.output.display()))?;
    if !store.is_empty() {
        tracing::info!(
            "loaded {} records from {}",
            store.len(),
            settings.output.display()
        );
    }

    if do_crawl {
        let crawler = Crawler::new(settings.clone())?;
        crawler.run(&mut store).await.context("crawl failed")?;
        println!(
            "Crawl complete: {} books -> {}",
            store.len(),
            settings.output.display()
        );
    }

    if do_download {
        let downloader = Downloader::new(settings.clone())?;
        let summary = downloader
            .run(&mut store)
            .await
            .context("download stage failed")?;
        println!(
            "Download stage complete: {} done, {} no_epub, {} missing, {} errors",
            summary.done, summary.no_epub, summary.missing, summary.errors
        );
    }

    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("haodoo_shelf=info,warn"),
            1 => EnvFilter::new("haodoo_shelf=debug,info"),
            2 => EnvFilter::new("haodoo_shelf=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use listing_ingest::assets::{AssetDownloader, HttpImageFetcher};
use listing_ingest::config::ScrapeConfig;
use listing_ingest::scrapers::ChromeDriver;
use listing_ingest::storage::SqliteListingRepository;
use listing_ingest::{scrape_listings, ListingOutcome};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrape rental listings into the property catalog")]
struct Args {
    /// Listing detail URLs to scrape, in order
    urls: Vec<String>,

    /// File with one listing URL per line (`#` starts a comment)
    #[arg(long, env = "LISTING_URLS_FILE")]
    urls_file: Option<PathBuf>,

    /// Catalog database
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://listings.db")]
    database_url: String,

    /// Base directory for downloaded images
    #[arg(long, env = "DOWNLOADS_DIR", default_value = "downloads")]
    downloads_dir: PathBuf,

    /// Show the browser window
    #[arg(long, env = "SCRAPER_HEADFUL")]
    headful: bool,

    /// Timeout for a single image request, in seconds
    #[arg(long, env = "IMAGE_TIMEOUT_SECS", default_value_t = 30)]
    image_timeout_secs: u64,

    /// Write the per-listing report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long, value_enum, env = "LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,
}

impl Args {
    async fn collect_urls(&self) -> Result<Vec<String>> {
        let mut urls = self.urls.clone();

        if let Some(path) = &self.urls_file {
            let contents = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            urls.extend(parse_url_list(&contents));
        }

        Ok(urls)
    }

    fn scrape_config(&self) -> ScrapeConfig {
        let mut config = ScrapeConfig::default();
        config.browser.headless = !self.headful;
        config.assets.base_dir = self.downloads_dir.clone();
        config.assets.fetch_timeout = Duration::from_secs(self.image_timeout_secs);
        config
    }
}

fn parse_url_list(contents: &str) -> impl Iterator<Item = String> + '_ {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,listing_ingest=info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(args.log_format);

    let urls = args.collect_urls().await?;
    if urls.is_empty() {
        anyhow::bail!("No listing URLs given");
    }

    let config = args.scrape_config();
    let store = SqliteListingRepository::connect(&args.database_url)
        .await
        .with_context(|| format!("Failed to open catalog at {}", args.database_url))?;
    let fetcher = HttpImageFetcher::new(&config.assets, &config.browser.user_agent)?;
    let assets = AssetDownloader::new(fetcher, config.assets.clone());

    info!(count = urls.len(), "Scraping listings");
    let report = scrape_listings(&ChromeDriver, &store, &assets, &urls, &config).await?;

    for (i, listing) in report.listings.iter().enumerate() {
        let id = listing.external_id.as_deref().unwrap_or("-");
        match &listing.outcome {
            ListingOutcome::Stored {
                upsert,
                images_saved,
                images_failed,
            } => println!(
                "{}. {id} {upsert:?} ({images_saved} images, {images_failed} failed)",
                i + 1
            ),
            ListingOutcome::StoredWithoutRecord { reason, .. } => {
                println!("{}. {id} not stored: {reason}", i + 1)
            }
            ListingOutcome::ExtractFailed => println!("{}. {id} extraction failed", i + 1),
            ListingOutcome::Failed { reason } => println!("{}. {id} failed: {reason}", i + 1),
        }
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Saved batch report");
    }

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Done"
    );
    Ok(())
}

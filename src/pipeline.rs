//! Batch orchestration: one browser, one page at a time, every listing
//! isolated from the failures of the others.

use std::ops::Deref;
use std::sync::Arc;

use serde::Serialize;
use tokio::task;
use tracing::{error, info, info_span, warn, Instrument};

use crate::assets::AssetDownloader;
use crate::config::ScrapeConfig;
use crate::error::{Result, ScrapeError};
use crate::models::{external_id_from_url, ExtractedData};
use crate::scrapers::consent::{resolve_consent, ConsentState};
use crate::scrapers::extractor::extract_listing;
use crate::scrapers::traits::{BrowserDriver, BrowserSession, ImageFetcher, PageHandle};
use crate::storage::{ListingStore, UpsertOutcome};

/// What happened to a single listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ListingOutcome {
    Stored {
        upsert: UpsertOutcome,
        images_saved: usize,
        images_failed: usize,
    },
    /// Extraction worked but the catalog write failed; images were still attempted
    StoredWithoutRecord {
        reason: String,
        images_saved: usize,
        images_failed: usize,
    },
    ExtractFailed,
    Failed {
        reason: String,
    },
}

impl ListingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ListingOutcome::Stored { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingReport {
    pub url: String,
    pub external_id: Option<String>,
    pub consent: Option<ConsentState>,
    pub outcome: ListingOutcome,
}

/// Per-listing results of one batch, in input order
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub listings: Vec<ListingReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.listings.iter().filter(|l| l.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.listings.len() - self.succeeded()
    }
}

/// Closes the browser when dropped, including during unwinding
struct SessionGuard<S: BrowserSession>(S);

impl<S: BrowserSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.0
    }
}

impl<S: BrowserSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Closes the page when dropped, including during unwinding
struct PageGuard<P: PageHandle>(P);

impl<P: PageHandle> Deref for PageGuard<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.0
    }
}

impl<P: PageHandle> Drop for PageGuard<P> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Scrape every URL in order with a single browser process.
///
/// Only a browser launch failure is returned as an error; everything that
/// goes wrong for an individual listing, including a panic while the page is
/// being driven, is logged and recorded in the returned report.
///
/// Browser calls block, so they run on tokio's blocking pool and the caller's
/// runtime stays responsive for the whole batch.
pub async fn scrape_listings<D, S, F>(
    driver: &D,
    store: &S,
    assets: &AssetDownloader<F>,
    urls: &[String],
    config: &ScrapeConfig,
) -> Result<BatchReport>
where
    D: BrowserDriver,
    S: ListingStore + ?Sized,
    F: ImageFetcher,
{
    let session = driver
        .launch(&config.launch_config())
        .map_err(ScrapeError::BrowserLaunch)?;
    let session = Arc::new(SessionGuard(session));
    let config = Arc::new(config.clone());

    info!(count = urls.len(), "Starting scrape batch");
    let mut report = BatchReport::default();

    for (position, url) in urls.iter().enumerate() {
        let span = info_span!("listing", position = position + 1, url = %url);
        let listing = scrape_one(&session, store, assets, url, &config)
            .instrument(span)
            .await;
        report.listings.push(listing);
    }

    release(session, "browser").await;
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Scrape batch finished"
    );
    Ok(report)
}

/// What the browser phase of one listing produced
struct LoadedPage<P: PageHandle> {
    page: PageGuard<P>,
    consent: ConsentState,
    data: Option<ExtractedData>,
}

async fn scrape_one<B, S, F>(
    session: &Arc<SessionGuard<B>>,
    store: &S,
    assets: &AssetDownloader<F>,
    url: &str,
    config: &Arc<ScrapeConfig>,
) -> ListingReport
where
    B: BrowserSession,
    S: ListingStore + ?Sized,
    F: ImageFetcher,
{
    let mut report = ListingReport {
        url: url.to_string(),
        external_id: None,
        consent: None,
        outcome: ListingOutcome::ExtractFailed,
    };

    let Some(external_id) = external_id_from_url(url) else {
        let err = ScrapeError::InvalidUrl { url: url.to_string() };
        error!(error = %err, "Skipping listing");
        report.outcome = ListingOutcome::Failed {
            reason: err.to_string(),
        };
        return report;
    };
    report.external_id = Some(external_id.clone());

    let loaded = {
        let session = Arc::clone(session);
        let config = Arc::clone(config);
        let url = url.to_string();
        let external_id = external_id.clone();
        task::spawn_blocking(move || load_page(&**session, &url, &external_id, &config)).await
    };

    let LoadedPage { page, consent, data } = match loaded {
        Ok(Ok(loaded)) => loaded,
        Ok(Err(err)) => {
            error!(external_id = %external_id, error = %err, "Failed to load listing page");
            report.outcome = ListingOutcome::Failed {
                reason: err.to_string(),
            };
            return report;
        }
        Err(err) => {
            error!(external_id = %external_id, error = %err, "Listing page handling panicked");
            report.outcome = ListingOutcome::Failed {
                reason: err.to_string(),
            };
            return report;
        }
    };
    report.consent = Some(consent);

    match data {
        Some(data) => report.outcome = persist(store, assets, &external_id, &data).await,
        None => {
            let err = ScrapeError::Extraction { url: url.to_string() };
            warn!(external_id = %external_id, error = %err, "Listing skipped");
        }
    }

    release(page, "page").await;
    report
}

/// Open the page, clear the consent wall and read the listing. Blocking.
fn load_page<B: BrowserSession>(
    session: &B,
    url: &str,
    external_id: &str,
    config: &ScrapeConfig,
) -> Result<LoadedPage<B::Page>> {
    let page = open_page(session, url, config)?;
    let consent = resolve_consent(&*page, &config.consent);
    let data = extract_listing(&*page, external_id, &config.extraction);
    Ok(LoadedPage { page, consent, data })
}

fn open_page<B: BrowserSession>(
    session: &B,
    url: &str,
    config: &ScrapeConfig,
) -> Result<PageGuard<B::Page>> {
    let page_error = |source: anyhow::Error| ScrapeError::Page {
        url: url.to_string(),
        source,
    };

    let page = PageGuard(session.new_page(&config.browser).map_err(page_error)?);
    page.goto(url, config.browser.navigation_timeout)
        .map_err(page_error)?;
    Ok(page)
}

/// Write the record, then fetch its images whether or not the write worked
async fn persist<S, F>(
    store: &S,
    assets: &AssetDownloader<F>,
    external_id: &str,
    data: &ExtractedData,
) -> ListingOutcome
where
    S: ListingStore + ?Sized,
    F: ImageFetcher,
{
    let upsert = store.upsert(data).await;
    if let Err(err) = &upsert {
        error!(external_id, error = %err, "Catalog write failed");
    }

    let downloads = assets.download_all(external_id, &data.image_urls).await;
    let images_saved = downloads.saved.len();
    let images_failed = downloads.failed.len();

    match upsert {
        Ok(upsert) => {
            info!(external_id, ?upsert, images_saved, images_failed, "Listing stored");
            ListingOutcome::Stored {
                upsert,
                images_saved,
                images_failed,
            }
        }
        Err(err) => ListingOutcome::StoredWithoutRecord {
            reason: err.to_string(),
            images_saved,
            images_failed,
        },
    }
}

/// Drop a browser guard on the blocking pool, since closing talks to Chrome
async fn release<T: Send + 'static>(guard: T, what: &'static str) {
    if let Err(err) = task::spawn_blocking(move || drop(guard)).await {
        error!(error = %err, "Closing the {what} panicked");
    }
}

//! Error types for the ingestion pipeline.
//!
//! Only [`ScrapeError::BrowserLaunch`] aborts a batch. Every other variant is
//! caught at listing or image scope, logged, and folded into the batch report.

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("failed to launch browser: {0:#}")]
    BrowserLaunch(#[source] anyhow::Error),

    #[error("cannot derive an external id from {url}")]
    InvalidUrl { url: String },

    #[error("page operation failed for {url}: {source:#}")]
    Page {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("no listing data could be extracted from {url}")]
    Extraction { url: String },

    #[error("failed to persist listing {external_id}: {source}")]
    Persistence {
        external_id: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to download image {index} of listing {external_id}: {reason}")]
    ImageDownload {
        external_id: String,
        index: usize,
        reason: String,
    },
}

pub type Result<T, E = ScrapeError> = std::result::Result<T, E>;

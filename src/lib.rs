pub mod assets;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod scrapers;
pub mod storage;

#[cfg(test)]
mod testing;

pub use error::{Result, ScrapeError};
pub use pipeline::{scrape_listings, BatchReport, ListingOutcome, ListingReport};

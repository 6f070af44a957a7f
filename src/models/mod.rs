use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use url::Url;

/// Currency written on insert when the origin site does not name one
pub const DEFAULT_CURRENCY: &str = "CZK";

/// Normalized listing data produced by one scrape attempt.
///
/// Never persisted as-is: the repository maps it onto a [`PropertyRecord`]
/// and the asset downloader reads `image_urls`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedData {
    pub external_id: String,
    pub title: String,
    /// Raw numeric price as published; coerced to an integer on write
    pub price: Option<f64>,
    pub address: Option<String>,
    pub description: Option<String>,
    /// Absolute image URLs carrying the display suffix, in source order
    pub image_urls: Vec<String>,
    /// Usable area as published (may carry units, e.g. `"65 m²"`)
    pub usable_area: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub refundable_deposit: Option<String>,
    pub price_note: Option<String>,
    pub cost_of_living: Option<String>,
    pub raw_created_at: Option<String>,
    pub raw_updated_at: Option<String>,
}

/// Extra origin fields kept in the `meta_data` JSON column
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingMeta {
    pub refundable_deposit: Option<String>,
    pub price_note: Option<String>,
    pub cost_of_living: Option<String>,
    pub raw_created_at: Option<String>,
}

impl From<&ExtractedData> for ListingMeta {
    fn from(data: &ExtractedData) -> Self {
        Self {
            refundable_deposit: data.refundable_deposit.clone(),
            price_note: data.price_note.clone(),
            cost_of_living: data.cost_of_living.clone(),
            raw_created_at: data.raw_created_at.clone(),
        }
    }
}

/// A catalog row, one per external id
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PropertyRecord {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub price: i64,
    pub currency: String,
    pub usable_area: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image_urls: Json<Vec<String>>,
    pub meta_data: Json<ListingMeta>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derive the natural key of a listing from its URL: the last non-empty
/// path segment, ignoring query string and fragment.
pub fn external_id_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

pub mod sqlite;

pub use sqlite::SqliteListingRepository;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::{ExtractedData, PropertyRecord};

/// Whether an upsert created the catalog row or refreshed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Refreshed,
}

/// Catalog persistence keyed by external id
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Insert the full record, or refresh title, price and update time of
    /// an existing one.
    async fn upsert(&self, data: &ExtractedData) -> Result<UpsertOutcome>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PropertyRecord>>;
}

/// Lenient integer parsing for published figures.
///
/// Reads the leading number after stripping digit-group separators
/// (`"16 000 Kč"` → 16000, `"54,5 m²"` → 54); anything else becomes 0.
pub fn coerce_integer(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return 0;
    };

    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();

    let (sign, digits) = match compact.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, compact.as_str()),
    };

    let leading: String = digits.chars().take_while(char::is_ascii_digit).collect();
    leading.parse::<i64>().map(|value| sign * value).unwrap_or(0)
}

/// Round a published price to whole units; non-finite or missing values become 0
pub fn coerce_price(price: Option<f64>) -> i64 {
    match price {
        Some(value) if value.is_finite() => value.round() as i64,
        _ => 0,
    }
}

//! Listing extraction from the hydration state embedded in a detail page.
//!
//! The page is only asked for the raw text of the state container; locating
//! the listing inside the tree and flattening it happens here, on plain JSON,
//! so it can be exercised without a browser.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::models::ExtractedData;
use crate::scrapers::traits::PageHandle;
use crate::scrapers::types::{value_to_text, RawListing, RawText};

/// Returns the text content of the first element matching the selector
const READ_STATE_SCRIPT: &str = r#"(selector) => {
    const element = document.querySelector(selector);
    return element ? element.textContent : null;
}"#;

/// Deepest level of the state tree searched for a listing entry
const MAX_STATE_DEPTH: usize = 32;

/// Result of checking the state tree for a listing-shaped entry
#[derive(Debug)]
pub enum ShapeMatch {
    Listing(Box<RawListing>),
    NoMatch,
}

/// Pull the listing out of a loaded, settled page.
///
/// Every failure (missing container, evaluation error, malformed JSON, no
/// listing-shaped entry) is logged and reported as `None`.
pub fn extract_listing<P: PageHandle>(
    page: &P,
    external_id: &str,
    config: &ExtractionConfig,
) -> Option<ExtractedData> {
    if let Err(err) = page.wait_for_selector(&config.marker_selector, config.marker_timeout) {
        warn!(external_id, error = %err, "Hydration state container not found");
        return None;
    }

    let raw = match page.evaluate(READ_STATE_SCRIPT, &[Value::String(config.marker_selector.clone())]) {
        Ok(Value::String(raw)) => raw,
        Ok(other) => {
            warn!(external_id, kind = json_kind(&other), "Hydration state is not text");
            return None;
        }
        Err(err) => {
            warn!(external_id, error = %err, "Failed to read hydration state");
            return None;
        }
    };

    parse_listing_state(&raw, external_id, &config.display_suffix)
}

/// Parse raw hydration text and flatten the listing entry it contains
pub fn parse_listing_state(raw: &str, external_id: &str, display_suffix: &str) -> Option<ExtractedData> {
    let state: Value = match serde_json::from_str(raw) {
        Ok(state) => state,
        Err(err) => {
            warn!(external_id, error = %err, "Hydration state is not valid JSON");
            return None;
        }
    };

    match find_listing(&state) {
        ShapeMatch::Listing(listing) => {
            debug!(external_id, images = listing.images.len(), "Listing entry located");
            Some(flatten_listing(*listing, external_id, display_suffix))
        }
        ShapeMatch::NoMatch => {
            warn!(external_id, "No listing-shaped entry in hydration state");
            None
        }
    }
}

/// Depth-first search for the first entry carrying an `images` array and a
/// numeric `price` that also deserializes into [`RawListing`].
///
/// Candidates that carry the marker fields but fail the typed shape are
/// skipped rather than partially read.
pub fn find_listing(state: &Value) -> ShapeMatch {
    let mut stack: Vec<(&Value, usize)> = vec![(state, 0)];

    while let Some((node, depth)) = stack.pop() {
        if depth > MAX_STATE_DEPTH {
            continue;
        }

        match node {
            Value::Object(map) => {
                if has_listing_markers(map) {
                    match serde_json::from_value::<RawListing>(node.clone()) {
                        Ok(listing) => return ShapeMatch::Listing(Box::new(listing)),
                        Err(err) => debug!(error = %err, "Listing-like entry rejected"),
                    }
                }
                // Reverse so earlier siblings are popped first
                let children: Vec<&Value> = map.values().collect();
                stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
            }
            Value::Array(items) => {
                stack.extend(items.iter().rev().map(|child| (child, depth + 1)));
            }
            _ => {}
        }
    }

    ShapeMatch::NoMatch
}

fn has_listing_markers(map: &Map<String, Value>) -> bool {
    matches!(map.get("images"), Some(Value::Array(_))) && matches!(map.get("price"), Some(Value::Number(_)))
}

fn flatten_listing(listing: RawListing, external_id: &str, display_suffix: &str) -> ExtractedData {
    let locality = listing.locality.unwrap_or_default();
    let params = listing.params.unwrap_or_default();

    let image_urls = listing
        .images
        .iter()
        .map(|image| display_image_url(image.url(), display_suffix))
        .collect();

    ExtractedData {
        external_id: external_id.to_string(),
        title: listing.name.and_then(RawText::into_text).unwrap_or_default(),
        price: Some(listing.price),
        address: locality.address(),
        description: listing.description.and_then(RawText::into_text),
        image_urls,
        usable_area: params.usable_area.and_then(value_to_text),
        latitude: locality.latitude,
        longitude: locality.longitude,
        refundable_deposit: params.refundable_deposit.and_then(value_to_text),
        price_note: params.price_note.and_then(value_to_text),
        cost_of_living: params.cost_of_living.and_then(value_to_text),
        raw_created_at: listing
            .created_at
            .and_then(RawText::into_text)
            .or_else(|| params.created_at.and_then(value_to_text)),
        raw_updated_at: listing
            .updated_at
            .and_then(RawText::into_text)
            .or_else(|| params.updated_at.and_then(value_to_text)),
    }
}

/// Make protocol-relative URLs absolute
pub fn normalize_image_url(url: &str) -> String {
    let url = url.trim();
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

/// Absolute image URL with the display-size suffix appended
pub fn display_image_url(url: &str, display_suffix: &str) -> String {
    format!("{}{display_suffix}", normalize_image_url(url))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

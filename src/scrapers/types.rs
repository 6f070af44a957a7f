//! Typed view of the listing entry inside the origin site's hydration state.
//!
//! The state tree is internal to the site and loosely shaped, so scalar
//! fields that have been seen as both strings and numbers stay as
//! [`Value`] and are rendered to text by [`RawText`].

use serde::Deserialize;
use serde_json::Value;

/// The listing payload as found in the hydration state
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListing {
    #[serde(default)]
    pub name: Option<RawText>,
    pub price: f64,
    pub images: Vec<RawImage>,
    #[serde(default)]
    pub description: Option<RawText>,
    #[serde(default)]
    pub locality: Option<RawLocality>,
    #[serde(default)]
    pub params: Option<RawParams>,
    #[serde(default, alias = "since")]
    pub created_at: Option<RawText>,
    #[serde(default, alias = "edited")]
    pub updated_at: Option<RawText>,
}

/// Either a bare string or the site's `{ "value": ... }` wrapper
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawText {
    Plain(String),
    Wrapped { value: Value },
    Other(Value),
}

impl RawText {
    pub fn into_text(self) -> Option<String> {
        let text = match self {
            RawText::Plain(text) => text,
            RawText::Wrapped { value } | RawText::Other(value) => value_to_text(value)?,
        };
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Render a loosely-typed scalar as text; objects and arrays are rejected
pub fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawImage {
    Plain(String),
    Object {
        #[serde(alias = "href", alias = "src")]
        url: String,
    },
}

impl RawImage {
    pub fn url(&self) -> &str {
        match self {
            RawImage::Plain(url) | RawImage::Object { url } => url,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLocality {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub street_number: Option<Value>,
    #[serde(default)]
    pub city_part: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl RawLocality {
    /// Human-readable address: `"<street> <number>, <city part>, <city>"`
    pub fn address(&self) -> Option<String> {
        let street = match (&self.street, self.street_number.clone().and_then(value_to_text)) {
            (Some(street), Some(number)) => Some(format!("{street} {number}")),
            (Some(street), None) => Some(street.clone()),
            (None, _) => None,
        };

        let parts: Vec<String> = [street, self.city_part.clone(), self.city.clone()]
            .into_iter()
            .flatten()
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect();

        let mut unique: Vec<String> = Vec::with_capacity(parts.len());
        for part in parts {
            if !unique.contains(&part) {
                unique.push(part);
            }
        }

        (!unique.is_empty()).then(|| unique.join(", "))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawParams {
    #[serde(default)]
    pub usable_area: Option<Value>,
    #[serde(default)]
    pub refundable_deposit: Option<Value>,
    #[serde(default)]
    pub price_note: Option<Value>,
    #[serde(default)]
    pub cost_of_living: Option<Value>,
    #[serde(default, alias = "since")]
    pub created_at: Option<Value>,
    #[serde(default, alias = "edited")]
    pub updated_at: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn address_joins_non_empty_unique_parts() {
        let locality: RawLocality = serde_json::from_value(json!({
            "street": "Vinohradská",
            "streetNumber": 12,
            "cityPart": "Praha",
            "city": "Praha"
        }))
        .unwrap();

        assert_eq!(locality.address().as_deref(), Some("Vinohradská 12, Praha"));
    }

    #[test]
    fn address_is_none_without_parts() {
        assert_eq!(RawLocality::default().address(), None);
    }

    #[test]
    fn text_accepts_wrapped_and_numeric_values() {
        let wrapped: RawText = serde_json::from_value(json!({ "value": "Pronájem bytu 2+kk" })).unwrap();
        let numeric: RawText = serde_json::from_value(json!(42)).unwrap();
        let blank: RawText = serde_json::from_value(json!("  ")).unwrap();

        assert_eq!(wrapped.into_text().as_deref(), Some("Pronájem bytu 2+kk"));
        assert_eq!(numeric.into_text().as_deref(), Some("42"));
        assert_eq!(blank.into_text(), None);
    }

    #[test]
    fn images_accept_strings_and_objects() {
        let images: Vec<RawImage> =
            serde_json::from_value(json!(["//cdn/a.jpg", { "url": "//cdn/b.jpg" }, { "href": "//cdn/c.jpg" }]))
                .unwrap();

        let urls: Vec<&str> = images.iter().map(RawImage::url).collect();
        assert_eq!(urls, vec!["//cdn/a.jpg", "//cdn/b.jpg", "//cdn/c.jpg"]);
    }
}

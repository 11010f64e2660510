use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::core::price_parser::parse_price;
use crate::models::StockStatus;
use crate::utils::error::FetchError;

/// Stable dedup key of a listing: the canonical product URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    /// Canonicalises a product URL into an identity.
    ///
    /// Keeps scheme, lower-cased host, port and path. Query strings and fragments
    /// are tracking noise on most storefronts and are dropped, as is a trailing `/`.
    pub fn from_url(raw: &str) -> Result<Self, FetchError> {
        let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        let host = url.host_str().ok_or_else(|| FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: "URL has no host".to_string(),
        })?;

        let mut canonical = format!("{}://{}", url.scheme(), host.to_lowercase());
        if let Some(port) = url.port() {
            canonical.push_str(&format!(":{}", port));
        }
        canonical.push_str(url.path().trim_end_matches('/'));

        Ok(ListingId(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub url: String,

    // Price as shown by the store, plus its parsed value (None when indeterminate)
    pub price_raw: String,
    #[serde(default)]
    pub price_numeric: Option<Decimal>,

    pub in_stock: StockStatus,
    pub source_group: String,
    #[serde(default)]
    pub priority: bool,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListing {
    pub source_group: String,
    pub title: String,
    pub url: String,
    pub price_raw: Option<String>,
    pub in_stock: StockStatus,
    pub priority: bool,
}

impl Listing {
    pub fn new(new_listing: NewListing) -> Result<Self, FetchError> {
        let id = ListingId::from_url(&new_listing.url)?;
        let price_raw = new_listing.price_raw.unwrap_or_default();
        let price_numeric = parse_price(&price_raw);

        Ok(Self {
            id,
            title: new_listing.title.trim().to_string(),
            url: new_listing.url,
            price_raw,
            price_numeric,
            in_stock: new_listing.in_stock,
            source_group: new_listing.source_group,
            priority: new_listing.priority,
            last_seen_at: Utc::now(),
        })
    }

    pub fn has_determinate_price(&self) -> bool {
        parse_price(&self.price_raw).is_some()
    }

    pub fn mark_seen(&mut self, at: DateTime<Utc>) {
        self.last_seen_at = at;
    }
}

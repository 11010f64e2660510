use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::models::{Listing, NewListing, StockStatus};
use crate::plugins::traits::Fetcher;
use crate::utils::error::FetchError;

/// One entry of a catalog endpoint's JSON array.
#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    title: String,
    url: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    in_stock: Option<bool>,
    #[serde(default)]
    priority: bool,
}

/// Reads each source group's catalog from a JSON endpoint.
pub struct HttpCatalogFetcher {
    client: Client,
    endpoints: HashMap<String, String>,
}

impl HttpCatalogFetcher {
    pub fn new(sources: &[SourceConfig], user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        let endpoints = sources
            .iter()
            .map(|s| (s.group.clone(), s.catalog_url.clone()))
            .collect();

        Ok(Self { client, endpoints })
    }
}

#[async_trait]
impl Fetcher for HttpCatalogFetcher {
    fn name(&self) -> &'static str {
        "http_catalog"
    }

    async fn fetch_catalog(&self, source_group: &str) -> Result<Vec<Listing>, FetchError> {
        let endpoint = self
            .endpoints
            .get(source_group)
            .ok_or_else(|| FetchError::UnknownSourceGroup(source_group.to_string()))?;

        let response = self.client.get(endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: endpoint.clone(),
            });
        }

        let entries: Vec<CatalogEntry> = response.json().await?;
        let total = entries.len();

        let listings: Vec<Listing> = entries
            .into_iter()
            .filter_map(|entry| {
                let url = entry.url.clone();
                Listing::new(NewListing {
                    source_group: source_group.to_string(),
                    title: entry.title,
                    url: entry.url,
                    price_raw: entry.price,
                    in_stock: StockStatus::from(entry.in_stock),
                    priority: entry.priority,
                })
                .inspect_err(|e| {
                    tracing::warn!(source_group, url = %url, error = %e, "Skipping catalog entry");
                })
                .ok()
            })
            .collect();

        tracing::debug!(source_group, total, kept = listings.len(), "Fetched catalog");
        Ok(listings)
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::models::Listing;
use crate::utils::error::FetchError;

/// Raw evidence gathered from a listing's detail page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetailEvidence {
    pub body_text: String,
    pub final_url: Option<String>,
}

/// Retrieves the current catalog of one source group.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_catalog(&self, source_group: &str) -> Result<Vec<Listing>, FetchError>;

    async fn shutdown(&self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Loads a single listing's detail page.
///
/// Implementations enforce their own per-call timeout and release any
/// page-level resource before returning, on success and on failure.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_detail_status(&self, url: &str) -> Result<DetailEvidence, FetchError>;

    /// Releases the long-lived session behind this fetcher.
    async fn shutdown(&self) -> Result<(), FetchError> {
        Ok(())
    }
}

use chrono::Utc;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::iter;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_util::sync::CancellationToken;

use crate::config::VerificationConfig;
use crate::core::evidence::{EvidenceClassifier, EvidenceVerdict};
use crate::models::{Listing, StockStatus};
use crate::plugins::traits::DetailFetcher;
use crate::utils::error::FetchError;

/// Result of one verification batch.
///
/// `listings` holds every input listing exactly once, in no particular order.
#[derive(Debug, Clone, Default)]
pub struct VerificationOutcome {
    pub listings: Vec<Listing>,
    pub verified: usize,
    pub fallback: usize,
    pub cancelled: usize,
    pub shortcut: usize,
}

impl VerificationOutcome {
    pub fn checked(&self) -> usize {
        self.verified + self.fallback + self.shortcut
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskResult {
    Verified,
    Fallback,
    Cancelled,
    Shortcut,
}

/// Bounded pool of live detail-page re-checks for uncertain listings.
pub struct VerificationScheduler {
    detail_fetcher: Arc<dyn DetailFetcher>,
    classifier: EvidenceClassifier,
    concurrency: usize,
    retry_attempts: u32,
    backoff_min_ms: u64,
    backoff_max_ms: u64,
}

impl VerificationScheduler {
    pub fn new(detail_fetcher: Arc<dyn DetailFetcher>, config: &VerificationConfig) -> Self {
        Self {
            detail_fetcher,
            classifier: EvidenceClassifier::new(
                config.sold_out_phrases.as_slice(),
                config.in_stock_phrases.as_slice(),
            ),
            concurrency: config.concurrency.max(1),
            retry_attempts: config.retry_attempts,
            backoff_min_ms: config.backoff_min_ms.min(config.backoff_max_ms),
            backoff_max_ms: config.backoff_max_ms.max(config.backoff_min_ms),
        }
    }

    /// Releases the detail fetcher's long-lived session.
    pub async fn shutdown(&self) -> Result<(), FetchError> {
        self.detail_fetcher.shutdown().await
    }

    /// Listings with a confirmed stock status and a readable price are left alone.
    pub fn needs_verification(listing: &Listing) -> bool {
        listing.in_stock.is_uncertain() || !listing.has_determinate_price()
    }

    /// Re-checks every uncertain listing through the detail fetcher.
    ///
    /// At most `concurrency` detail fetches run at once. A failed fetch is
    /// retried with jittered backoff and resolves to out of stock once the
    /// budget is spent. After `cancel` fires, tasks that have not started yet
    /// are returned unchanged; started ones run to completion.
    pub async fn verify(
        &self,
        listings: Vec<Listing>,
        sold_out_markers: &[String],
        cancel: &CancellationToken,
    ) -> VerificationOutcome {
        let (pending, settled): (Vec<Listing>, Vec<Listing>) =
            listings.into_iter().partition(Self::needs_verification);

        let mut outcome = VerificationOutcome {
            listings: settled,
            ..VerificationOutcome::default()
        };

        if pending.is_empty() {
            return outcome;
        }

        let markers: Vec<String> = sold_out_markers
            .iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();

        tracing::debug!(
            pending = pending.len(),
            concurrency = self.concurrency,
            "Starting verification batch"
        );

        let results: Vec<(Listing, TaskResult)> = stream::iter(pending)
            .map(|listing| self.verify_one(listing, &markers, cancel))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (listing, result) in results {
            match result {
                TaskResult::Verified => outcome.verified += 1,
                TaskResult::Fallback => outcome.fallback += 1,
                TaskResult::Cancelled => outcome.cancelled += 1,
                TaskResult::Shortcut => outcome.shortcut += 1,
            }
            outcome.listings.push(listing);
        }

        metrics::counter!("verification_tasks_total", "result" => "verified").increment(outcome.verified as u64);
        metrics::counter!("verification_tasks_total", "result" => "fallback").increment(outcome.fallback as u64);
        metrics::counter!("verification_tasks_total", "result" => "cancelled").increment(outcome.cancelled as u64);

        if outcome.cancelled > 0 {
            tracing::info!(cancelled = outcome.cancelled, "Verification batch cut short by shutdown");
        }

        outcome
    }

    async fn verify_one(
        &self,
        mut listing: Listing,
        markers: &[String],
        cancel: &CancellationToken,
    ) -> (Listing, TaskResult) {
        if cancel.is_cancelled() {
            return (listing, TaskResult::Cancelled);
        }

        let title = listing.title.to_lowercase();
        if let Some(marker) = markers.iter().find(|m| title.contains(m.as_str())) {
            tracing::debug!(listing_id = %listing.id, marker = %marker, "Sold-out marker in title");
            listing.in_stock = StockStatus::OutOfStock;
            return (listing, TaskResult::Shortcut);
        }

        let attempts = AtomicU32::new(0);
        let result = {
            let detail_fetcher = &self.detail_fetcher;
            let attempts = &attempts;
            let listing_ref = &listing;

            RetryIf::spawn(
                jittered_backoff(self.backoff_min_ms, self.backoff_max_ms, self.retry_attempts),
                move || async move {
                    let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    detail_fetcher
                        .fetch_detail_status(&listing_ref.url)
                        .await
                        .inspect_err(|e| {
                            tracing::warn!(
                                listing_id = %listing_ref.id,
                                attempt,
                                error = %e,
                                "Detail fetch failed"
                            );
                        })
                },
                FetchError::is_retriable,
            )
            .await
        };

        match result {
            Ok(evidence) => {
                let verdict = self.classifier.classify(&evidence.body_text);
                if let EvidenceVerdict::Inconclusive = verdict {
                    tracing::debug!(listing_id = %listing.id, "No stock phrase on detail page, assuming sold out");
                }
                listing.in_stock = StockStatus::from(verdict.in_stock());
                listing.mark_seen(Utc::now());
                (listing, TaskResult::Verified)
            }
            Err(e) => {
                tracing::warn!(
                    listing_id = %listing.id,
                    attempts = attempts.load(Ordering::Relaxed),
                    error = %e,
                    "Verification gave up, assuming sold out"
                );
                listing.in_stock = StockStatus::OutOfStock;
                (listing, TaskResult::Fallback)
            }
        }
    }
}

/// One delay per retry, each drawn uniformly from `min_ms..=max_ms`.
fn jittered_backoff(min_ms: u64, max_ms: u64, retries: u32) -> impl Iterator<Item = Duration> {
    iter::repeat_with(move || Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms)))
        .take(retries as usize)
}

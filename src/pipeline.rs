use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, SourceConfig};
use crate::core::change_detector::detect;
use crate::core::listing_filter::ListingFilter;
use crate::core::verification::{VerificationOutcome, VerificationScheduler};
use crate::models::{ChangeSet, Listing, Snapshot};
use crate::plugins::manager::Collaborators;
use crate::plugins::traits::{Fetcher, Notifier, SnapshotStore};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    FetchFailed,
    EmptyCatalog,
    NoSnapshot,
    NothingDue,
}

/// Summary of one pass over one source group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub source_group: String,
    pub fetched: usize,
    pub added: usize,
    pub price_drops: usize,
    pub restocks: usize,
    pub verified: usize,
    pub fallback: usize,
    pub cancelled: usize,
    pub notifications_sent: usize,
    pub notification_failures: usize,
    pub persisted: bool,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl PassReport {
    fn new(source_group: &str) -> Self {
        Self {
            source_group: source_group.to_string(),
            fetched: 0,
            added: 0,
            price_drops: 0,
            restocks: 0,
            verified: 0,
            fallback: 0,
            cancelled: 0,
            notifications_sent: 0,
            notification_failures: 0,
            persisted: false,
            skipped: None,
            error: None,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn record_changes(&mut self, changes: &ChangeSet) {
        self.added = changes.added.len();
        self.price_drops = changes.price_dropped.len();
        self.restocks = changes.restocked.len();
    }

    fn record_verification(&mut self, outcome: &VerificationOutcome) {
        self.verified = outcome.checked();
        self.fallback = outcome.fallback;
        self.cancelled = outcome.cancelled;
    }
}

/// A configured source group plus the lock that serialises its snapshot writes.
///
/// Both pass kinds take `write_lock` from loading the snapshot they compare
/// against until that snapshot is persisted, so neither can overwrite the
/// other's result. Fetching and verification stay outside the lock.
struct SourceGroup {
    config: SourceConfig,
    write_lock: Mutex<()>,
}

/// Bodies of the full-scan and stock-check passes, one source group at a time.
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn SnapshotStore>,
    notifier: Arc<dyn Notifier>,
    verifier: VerificationScheduler,
    groups: Vec<Arc<SourceGroup>>,
    verify_on_full_scan: bool,
    regular_check_every_ticks: u64,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, config: &AppConfig) -> Self {
        let groups = config
            .sources
            .iter()
            .map(|source| {
                Arc::new(SourceGroup {
                    config: source.clone(),
                    write_lock: Mutex::new(()),
                })
            })
            .collect();

        Self {
            fetcher: collaborators.fetcher,
            store: collaborators.store,
            notifier: collaborators.notifier,
            verifier: VerificationScheduler::new(collaborators.detail_fetcher, &config.verification),
            groups,
            verify_on_full_scan: config.verification.verify_on_full_scan,
            regular_check_every_ticks: config.scheduler.regular_check_every_ticks.max(1),
        }
    }

    /// Releases the collaborators' long-lived resources. Errors are logged only.
    pub async fn release(&self) {
        if let Err(e) = self.fetcher.shutdown().await {
            tracing::warn!(error = %e, "Catalog fetcher did not shut down cleanly");
        }
        if let Err(e) = self.verifier.shutdown().await {
            tracing::warn!(error = %e, "Detail fetcher did not shut down cleanly");
        }
        if let Err(e) = self.notifier.shutdown().await {
            tracing::warn!(error = %e, "Notifier did not shut down cleanly");
        }
    }

    /// Fetch, detect, notify and persist every source group concurrently.
    pub async fn run_full_scan(&self, cancel: &CancellationToken) -> Vec<PassReport> {
        let passes = self.groups.iter().cloned().map(|group| async move {
            let started = Instant::now();
            let mut report = PassReport::new(&group.config.group);
            let result = self.full_scan_group(&group, cancel, &mut report).await;
            Self::finish("full_scan", report, result, started)
        });

        join_all(passes).await
    }

    /// Re-verify due listings from the stored snapshots and report restocks only.
    ///
    /// Priority listings are due on every tick, the rest on every
    /// `regular_check_every_ticks`-th tick (tick 0 included).
    pub async fn run_stock_check(&self, tick: u64, cancel: &CancellationToken) -> Vec<PassReport> {
        let include_regular = tick % self.regular_check_every_ticks == 0;

        let passes = self.groups.iter().cloned().map(|group| async move {
            let started = Instant::now();
            let mut report = PassReport::new(&group.config.group);
            let result = self
                .stock_check_group(&group, include_regular, cancel, &mut report)
                .await;
            Self::finish("stock_check", report, result, started)
        });

        join_all(passes).await
    }

    async fn full_scan_group(
        &self,
        group: &SourceGroup,
        cancel: &CancellationToken,
        report: &mut PassReport,
    ) -> Result<(), AppError> {
        let source = &group.config;
        let fetched = match self.fetcher.fetch_catalog(&source.group).await {
            Ok(listings) => listings,
            Err(e) => {
                tracing::warn!(source_group = %source.group, error = %e, "Catalog fetch failed, keeping previous snapshot");
                report.skipped = Some(SkipReason::FetchFailed);
                return Ok(());
            }
        };
        report.fetched = fetched.len();

        let filtered = ListingFilter::from_source(source).apply(fetched);
        if filtered.is_empty() {
            tracing::info!(source_group = %source.group, "Catalog is empty after filtering, keeping previous snapshot");
            report.skipped = Some(SkipReason::EmptyCatalog);
            return Ok(());
        }

        let candidates = Snapshot::new(&source.group, filtered).into_listings();
        let listings = if self.verify_on_full_scan {
            let outcome = self
                .verifier
                .verify(candidates, &source.title_sold_out_markers, cancel)
                .await;
            report.record_verification(&outcome);
            outcome.listings
        } else {
            candidates
        };

        let now = Utc::now();
        let current = Snapshot::new(
            &source.group,
            listings
                .into_iter()
                .map(|mut listing: Listing| {
                    listing.mark_seen(now);
                    listing
                })
                .collect(),
        );

        let _write = group.write_lock.lock().await;
        let previous = match self.store.load(&source.group).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(source_group = %source.group, error = %e, "Could not load snapshot, comparing against an empty one");
                Snapshot::empty(&source.group)
            }
        };

        let changes = detect(&previous, &current);
        report.record_changes(&changes);
        self.dispatch(changes, &source.group, report).await;

        self.persist(&current, report).await
    }

    async fn stock_check_group(
        &self,
        group: &SourceGroup,
        include_regular: bool,
        cancel: &CancellationToken,
        report: &mut PassReport,
    ) -> Result<(), AppError> {
        let source = &group.config;
        let stored = match self.store.load(&source.group).await {
            Ok(snapshot) if !snapshot.is_empty() => snapshot,
            Ok(_) => {
                tracing::debug!(source_group = %source.group, "No snapshot yet, waiting for a full scan");
                report.skipped = Some(SkipReason::NoSnapshot);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(source_group = %source.group, error = %e, "Could not load snapshot, skipping stock check");
                report.skipped = Some(SkipReason::NoSnapshot);
                return Ok(());
            }
        };

        let due: Vec<Listing> = stored
            .into_listings()
            .into_iter()
            .filter(|listing| listing.priority || include_regular)
            .collect();

        if due.is_empty() {
            report.skipped = Some(SkipReason::NothingDue);
            return Ok(());
        }

        let outcome = self
            .verifier
            .verify(due, &source.title_sold_out_markers, cancel)
            .await;
        report.record_verification(&outcome);

        // A full scan may have replaced the snapshot while verification ran;
        // only the stock fields are laid over whatever is stored now.
        let _write = group.write_lock.lock().await;
        let previous = self.store.load(&source.group).await?;
        let current = previous.clone().merge_stock_updates(outcome.listings);
        let changes = detect(&previous, &current).restocks_only();
        report.record_changes(&changes);
        self.dispatch(changes, &source.group, report).await;

        self.persist(&current, report).await
    }

    /// At most one notifier call per kind; empty kinds are never sent.
    async fn dispatch(&self, changes: ChangeSet, source_group: &str, report: &mut PassReport) {
        for event in changes.into_events(source_group) {
            match self.notifier.notify(&event).await {
                Ok(()) => {
                    report.notifications_sent += 1;
                    metrics::counter!("notifications_sent_total", "kind" => event.kind.as_str()).increment(1);
                }
                Err(e) => {
                    tracing::warn!(
                        source_group = %source_group,
                        kind = %event.kind,
                        notifier = self.notifier.name(),
                        error = %e,
                        "Notification failed"
                    );
                    report.notification_failures += 1;
                }
            }
        }
    }

    async fn persist(&self, snapshot: &Snapshot, report: &mut PassReport) -> Result<(), AppError> {
        self.store.persist(snapshot).await?;
        report.persisted = true;
        Ok(())
    }

    fn finish(
        kind: &'static str,
        mut report: PassReport,
        result: Result<(), AppError>,
        started: Instant,
    ) -> PassReport {
        report.duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                tracing::info!(
                    kind,
                    source_group = %report.source_group,
                    added = report.added,
                    price_drops = report.price_drops,
                    restocks = report.restocks,
                    verified = report.verified,
                    skipped = ?report.skipped,
                    duration_ms = report.duration_ms,
                    "Pass finished"
                );
                metrics::counter!("passes_total", "kind" => kind, "result" => "ok").increment(1);
            }
            Err(e) => {
                tracing::error!(
                    kind,
                    source_group = %report.source_group,
                    error = %e,
                    "Pass failed, snapshot not saved"
                );
                metrics::counter!("passes_total", "kind" => kind, "result" => "failed").increment(1);
                report.error = Some(e.to_string());
            }
        }

        report
    }
}

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::config::NotificationsConfig;
use crate::models::{ChangedListing, NotificationEvent, NotificationKind};
use crate::plugins::notifiers::LogNotifier;
use crate::plugins::traits::Notifier;
use crate::utils::error::NotifyError;

/// Posts each notification kind to its own webhook, in batches.
pub struct WebhookNotifier {
    client: Client,
    endpoints: HashMap<NotificationKind, String>,
    fallback: LogNotifier,
    batch_size: usize,
    batch_delay: Duration,
}

impl WebhookNotifier {
    pub fn new(config: &NotificationsConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let endpoints = [
            (NotificationKind::Added, &config.webhook_added),
            (NotificationKind::PriceDrop, &config.webhook_price_drop),
            (NotificationKind::Restock, &config.webhook_restock),
        ]
        .into_iter()
        .filter_map(|(kind, url)| url.clone().map(|url| (kind, url)))
        .collect();

        Ok(Self {
            client,
            endpoints,
            fallback: LogNotifier::new(),
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
        })
    }

    pub fn has_endpoint(&self, kind: NotificationKind) -> bool {
        self.endpoints.contains_key(&kind)
    }

    fn payload(event: &NotificationEvent, batch: &[&ChangedListing]) -> Value {
        let listings: Vec<Value> = batch
            .iter()
            .map(|item| {
                json!({
                    "id": item.listing.id.as_str(),
                    "title": item.listing.title,
                    "url": item.listing.url,
                    "price": item.listing.price_raw,
                    "old_price": item.old_price,
                    "in_stock": item.listing.in_stock,
                })
            })
            .collect();

        json!({
            "kind": event.kind,
            "source_group": event.source_group,
            "listings": listings,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let Some(endpoint) = self.endpoints.get(&event.kind) else {
            return self.fallback.notify(event).await;
        };

        // The same listing never goes out twice in one event
        let mut seen = HashSet::new();
        let items: Vec<&ChangedListing> = event
            .items
            .iter()
            .filter(|item| seen.insert(&item.listing.id))
            .collect();

        for (index, batch) in items.chunks(self.batch_size).enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let response = self
                .client
                .post(endpoint)
                .json(&Self::payload(event, batch))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(NotifyError::Status {
                    status: status.as_u16(),
                });
            }

            tracing::debug!(
                kind = %event.kind,
                source_group = %event.source_group,
                batch = index,
                listings = batch.len(),
                "Webhook delivered"
            );
        }

        Ok(())
    }
}

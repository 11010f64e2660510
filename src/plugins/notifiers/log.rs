use async_trait::async_trait;

use crate::models::NotificationEvent;
use crate::plugins::traits::Notifier;
use crate::utils::error::NotifyError;

/// Writes deltas to the log. Used for kinds without a configured webhook.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        for item in &event.items {
            tracing::info!(
                kind = %event.kind,
                source_group = %event.source_group,
                listing_id = %item.listing.id,
                title = %item.listing.title,
                price = %item.listing.price_raw,
                old_price = ?item.old_price,
                "Listing changed"
            );
        }
        Ok(())
    }
}

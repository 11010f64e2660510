use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::models::NotificationEvent;
use crate::utils::error::NotifyError;

/// Delivers classified deltas. Batching and rate limiting are up to the implementation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError>;

    async fn shutdown(&self) -> Result<(), NotifyError> {
        Ok(())
    }
}

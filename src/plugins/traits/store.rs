use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::models::Snapshot;
use crate::utils::error::StoreError;

/// Persists the last known-good snapshot of every source group.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns an empty snapshot when nothing was stored for the group yet.
    async fn load(&self, source_group: &str) -> Result<Snapshot, StoreError>;

    /// Replaces the stored snapshot of the group as a whole.
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

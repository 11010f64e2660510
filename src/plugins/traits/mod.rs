pub mod fetcher;
pub mod notifier;
pub mod store;

pub use fetcher::{DetailEvidence, DetailFetcher, Fetcher};
pub use notifier::Notifier;
pub use store::SnapshotStore;

#[cfg(test)]
pub use fetcher::{MockDetailFetcher, MockFetcher};
#[cfg(test)]
pub use notifier::MockNotifier;
#[cfg(test)]
pub use store::MockSnapshotStore;

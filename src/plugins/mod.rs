pub mod fetchers;
pub mod manager;
pub mod notifiers;
pub mod stores;
pub mod traits;

pub use manager::{Collaborators, PluginManager};
pub use traits::{DetailFetcher, Fetcher, Notifier, SnapshotStore};

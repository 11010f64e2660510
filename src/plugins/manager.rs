use config::ConfigError;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::fetchers::{ChromeDetailFetcher, HttpCatalogFetcher};
use super::notifiers::WebhookNotifier;
use super::stores::{JsonFileSnapshotStore, SqliteSnapshotStore};
use super::traits::{DetailFetcher, Fetcher, Notifier, SnapshotStore};
use crate::config::{AppConfig, StorageBackend};
use crate::utils::error::AppError;

/// The full set of collaborators a pipeline needs.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub detail_fetcher: Arc<dyn DetailFetcher>,
    pub store: Arc<dyn SnapshotStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// Registry of the four collaborator slots. `build` refuses to hand out an
/// incomplete set.
#[derive(Clone, Default)]
pub struct PluginManager {
    fetcher: Arc<RwLock<Option<Arc<dyn Fetcher>>>>,
    detail_fetcher: Arc<RwLock<Option<Arc<dyn DetailFetcher>>>>,
    store: Arc<RwLock<Option<Arc<dyn SnapshotStore>>>>,
    notifier: Arc<RwLock<Option<Arc<dyn Notifier>>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the collaborators described by the configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let manager = Self::new();

        let fetcher = HttpCatalogFetcher::new(
            &config.sources,
            &config.browser.user_agent,
            config.verification.request_timeout(),
        )?;
        manager.register_fetcher(Arc::new(fetcher)).await;

        let detail_fetcher = ChromeDetailFetcher::new(&config.browser, config.verification.request_timeout());
        manager.register_detail_fetcher(Arc::new(detail_fetcher)).await;

        let store: Arc<dyn SnapshotStore> = match config.storage.backend {
            StorageBackend::Json => {
                let path = config.storage.path.as_deref().ok_or_else(|| {
                    ConfigError::Message("Storage path is required for the json backend".into())
                })?;
                Arc::new(JsonFileSnapshotStore::new(path))
            }
            StorageBackend::Sqlite => {
                let url = config.storage.database_url.as_deref().ok_or_else(|| {
                    ConfigError::Message("Storage database_url is required for the sqlite backend".into())
                })?;
                Arc::new(SqliteSnapshotStore::connect(url).await?)
            }
        };
        manager.register_store(store).await;

        let notifier = WebhookNotifier::new(&config.notifications)?;
        manager.register_notifier(Arc::new(notifier)).await;

        Ok(manager)
    }

    pub async fn register_fetcher(&self, fetcher: Arc<dyn Fetcher>) {
        tracing::info!(plugin = fetcher.name(), "Registered catalog fetcher");
        *self.fetcher.write().await = Some(fetcher);
    }

    pub async fn register_detail_fetcher(&self, detail_fetcher: Arc<dyn DetailFetcher>) {
        tracing::info!(plugin = detail_fetcher.name(), "Registered detail fetcher");
        *self.detail_fetcher.write().await = Some(detail_fetcher);
    }

    pub async fn register_store(&self, store: Arc<dyn SnapshotStore>) {
        tracing::info!(plugin = store.name(), "Registered snapshot store");
        *self.store.write().await = Some(store);
    }

    pub async fn register_notifier(&self, notifier: Arc<dyn Notifier>) {
        tracing::info!(plugin = notifier.name(), "Registered notifier");
        *self.notifier.write().await = Some(notifier);
    }

    /// Names of the registered collaborators, in slot order.
    pub async fn registered(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if let Some(fetcher) = self.fetcher.read().await.as_ref() {
            names.push(fetcher.name());
        }
        if let Some(detail_fetcher) = self.detail_fetcher.read().await.as_ref() {
            names.push(detail_fetcher.name());
        }
        if let Some(store) = self.store.read().await.as_ref() {
            names.push(store.name());
        }
        if let Some(notifier) = self.notifier.read().await.as_ref() {
            names.push(notifier.name());
        }
        names
    }

    /// A missing collaborator is the one configuration error that aborts startup.
    pub async fn build(&self) -> Result<Collaborators, AppError> {
        Ok(Collaborators {
            fetcher: self
                .fetcher
                .read()
                .await
                .clone()
                .ok_or(AppError::MissingCollaborator("fetcher"))?,
            detail_fetcher: self
                .detail_fetcher
                .read()
                .await
                .clone()
                .ok_or(AppError::MissingCollaborator("detail fetcher"))?,
            store: self
                .store
                .read()
                .await
                .clone()
                .ok_or(AppError::MissingCollaborator("snapshot store"))?,
            notifier: self
                .notifier
                .read()
                .await
                .clone()
                .ok_or(AppError::MissingCollaborator("notifier"))?,
        })
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::core::evidence::{DEFAULT_IN_STOCK_PHRASES, DEFAULT_SOLD_OUT_PHRASES};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub verification: VerificationConfig,
    pub browser: BrowserConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationsConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub full_scan_interval_secs: u64,
    pub stock_check_interval_secs: u64,
    /// Non-priority listings are re-checked on every Nth stock-check tick.
    pub regular_check_every_ticks: u64,
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub concurrency: usize,
    pub retry_attempts: u32,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    pub request_timeout_secs: u64,
    pub verify_on_full_scan: bool,
    pub sold_out_phrases: Vec<String>,
    pub in_stock_phrases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub chrome_path: Option<String>,
    pub user_agent: String,
    pub headless: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory holding one JSON file per source group.
    pub path: Option<String>,
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub webhook_added: Option<String>,
    pub webhook_price_drop: Option<String>,
    pub webhook_restock: Option<String>,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: Option<String>,
    pub file_prefix: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub group: String,
    pub catalog_url: String,
    #[serde(default)]
    pub include_keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    /// Listing titles containing one of these are sold out without a detail fetch.
    #[serde(default)]
    pub title_sold_out_markers: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            full_scan_interval_secs: 6 * 60 * 60,
            stock_check_interval_secs: 30,
            regular_check_every_ticks: 20,
            shutdown_grace_secs: 30,
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            retry_attempts: 1,
            backoff_min_ms: 300,
            backoff_max_ms: 800,
            request_timeout_secs: 45,
            verify_on_full_scan: true,
            sold_out_phrases: DEFAULT_SOLD_OUT_PHRASES.iter().map(|p| p.to_string()).collect(),
            in_stock_phrases: DEFAULT_IN_STOCK_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
            headless: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            path: Some("data/snapshots".to_string()),
            database_url: None,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_added: None,
            webhook_price_drop: None,
            webhook_restock: None,
            batch_size: 10,
            batch_delay_ms: 700,
            request_timeout_secs: 15,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9001,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: "restock-watcher.log".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn full_scan_interval(&self) -> Duration {
        Duration::from_secs(self.full_scan_interval_secs)
    }

    pub fn stock_check_interval(&self) -> Duration {
        Duration::from_secs(self.stock_check_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl VerificationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    pub fn load(config_dir: &Path, run_mode: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default")).required(false))
            // Add environment-specific config
            .add_source(File::from(config_dir.join(run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::from(config_dir.join("local")).required(false))
            // Add environment variables with prefix "RESTOCK__"
            .add_source(Environment::with_prefix("RESTOCK").prefix_separator("__").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate scheduler configuration
        if self.scheduler.full_scan_interval_secs == 0 || self.scheduler.stock_check_interval_secs == 0 {
            return Err(ConfigError::Message("Scheduler intervals must be greater than 0".into()));
        }

        if self.scheduler.regular_check_every_ticks == 0 {
            return Err(ConfigError::Message("Scheduler regular_check_every_ticks must be greater than 0".into()));
        }

        // Validate verification configuration
        if self.verification.concurrency == 0 {
            return Err(ConfigError::Message("Verification concurrency must be greater than 0".into()));
        }

        if self.verification.backoff_min_ms > self.verification.backoff_max_ms {
            return Err(ConfigError::Message("Verification backoff_min_ms cannot exceed backoff_max_ms".into()));
        }

        if self.verification.request_timeout_secs == 0 {
            return Err(ConfigError::Message("Verification request_timeout_secs must be greater than 0".into()));
        }

        // Validate storage configuration
        match self.storage.backend {
            StorageBackend::Json if self.storage.path.as_deref().is_none_or(str::is_empty) => {
                return Err(ConfigError::Message("Storage path is required for the json backend".into()));
            }
            StorageBackend::Sqlite if self.storage.database_url.as_deref().is_none_or(str::is_empty) => {
                return Err(ConfigError::Message("Storage database_url is required for the sqlite backend".into()));
            }
            _ => {}
        }

        // Validate notification configuration
        if self.notifications.batch_size == 0 {
            return Err(ConfigError::Message("Notification batch_size must be greater than 0".into()));
        }

        for webhook in [
            &self.notifications.webhook_added,
            &self.notifications.webhook_price_drop,
            &self.notifications.webhook_restock,
        ]
        .into_iter()
        .flatten()
        {
            if Url::parse(webhook).is_err() {
                return Err(ConfigError::Message(format!("Invalid webhook URL: {}", webhook)));
            }
        }

        // Validate metrics configuration
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        // Validate sources
        if self.sources.is_empty() {
            return Err(ConfigError::Message("At least one source must be configured".into()));
        }

        let mut groups = HashSet::new();
        for source in &self.sources {
            if source.group.trim().is_empty() {
                return Err(ConfigError::Message("Source group name cannot be empty".into()));
            }
            if !groups.insert(source.group.as_str()) {
                return Err(ConfigError::Message(format!("Duplicate source group: {}", source.group)));
            }
            if Url::parse(&source.catalog_url).is_err() {
                return Err(ConfigError::Message(format!(
                    "Invalid catalog URL for source group {}",
                    source.group
                )));
            }
        }

        Ok(())
    }
}

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use scraper::{Html, Selector};
use std::ffi::OsStr;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::BrowserConfig;
use crate::plugins::traits::{DetailEvidence, DetailFetcher};
use crate::utils::error::FetchError;

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Debug, Clone)]
struct ChromeOptions {
    chrome_path: Option<String>,
    user_agent: String,
    headless: bool,
    timeout: Duration,
}

/// Closes the tab when dropped, whatever happened to the page load.
struct TabGuard(Arc<Tab>);

impl Deref for TabGuard {
    type Target = Tab;

    fn deref(&self) -> &Tab {
        &self.0
    }
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.close(true) {
            tracing::debug!(error = %e, "Failed to close browser tab");
        }
    }
}

/// Detail fetcher backed by one long-lived headless Chrome session.
///
/// The browser is launched on first use and shared by all concurrent calls;
/// every call works in its own tab.
pub struct ChromeDetailFetcher {
    options: ChromeOptions,
    session: RwLock<Option<Arc<Browser>>>,
    closed: AtomicBool,
}

impl ChromeDetailFetcher {
    pub fn new(config: &BrowserConfig, timeout: Duration) -> Self {
        Self {
            options: ChromeOptions {
                chrome_path: config.chrome_path.clone(),
                user_agent: config.user_agent.clone(),
                headless: config.headless,
                timeout,
            },
            session: RwLock::new(None),
            closed: AtomicBool::new(false),
        }
    }

    async fn session(&self) -> Result<Arc<Browser>, FetchError> {
        if let Some(browser) = self.session.read().await.as_ref() {
            return Ok(Arc::clone(browser));
        }

        let mut session = self.session.write().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(FetchError::SessionClosed);
        }
        if let Some(browser) = session.as_ref() {
            return Ok(Arc::clone(browser));
        }

        let options = self.options.clone();
        let browser = tokio::task::spawn_blocking(move || launch(&options))
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))??;

        tracing::info!(headless = self.options.headless, "Launched browser session");
        let browser = Arc::new(browser);
        *session = Some(Arc::clone(&browser));
        Ok(browser)
    }

    /// Forgets a session that can no longer open tabs so the next call relaunches.
    async fn reset_session(&self) {
        if self.session.write().await.take().is_some() {
            tracing::warn!("Browser session stopped responding, it will be relaunched");
        }
    }
}

#[async_trait]
impl DetailFetcher for ChromeDetailFetcher {
    fn name(&self) -> &'static str {
        "chrome"
    }

    async fn fetch_detail_status(&self, url: &str) -> Result<DetailEvidence, FetchError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FetchError::SessionClosed);
        }

        let browser = self.session().await?;
        let tab = match tokio::task::spawn_blocking(move || browser.new_tab()).await {
            Ok(Ok(tab)) => TabGuard(tab),
            Ok(Err(e)) => {
                self.reset_session().await;
                return Err(FetchError::Browser(format!("Failed to open tab: {}", e)));
            }
            Err(e) => return Err(FetchError::Browser(e.to_string())),
        };

        let url = url.to_string();
        let user_agent = self.options.user_agent.clone();
        let timeout = self.options.timeout;
        let page = tokio::task::spawn_blocking(move || load_page(tab, &url, &user_agent, timeout));

        // The tab is closed by the blocking task even when we stop waiting for it
        match tokio::time::timeout(timeout, page).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(FetchError::Browser(e.to_string())),
            Err(_) => Err(FetchError::Timeout),
        }
    }

    async fn shutdown(&self) -> Result<(), FetchError> {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(browser) = self.session.write().await.take() {
            // The Chrome process exits once the last handle is dropped
            drop(browser);
            tracing::info!("Browser session closed");
        }
        Ok(())
    }
}

fn launch(options: &ChromeOptions) -> Result<Browser, FetchError> {
    let mut launch_options = LaunchOptions::default_builder()
        .headless(options.headless)
        .sandbox(false) // Often needed in containerized environments
        .idle_browser_timeout(Duration::from_secs(60 * 60))
        .args(vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-extensions"),
            OsStr::new("--disable-background-timer-throttling"),
            OsStr::new("--disable-backgrounding-occluded-windows"),
            OsStr::new("--disable-renderer-backgrounding"),
        ])
        .build()
        .map_err(|e| FetchError::Browser(format!("Failed to create launch options: {}", e)))?;

    if let Some(chrome_path) = &options.chrome_path {
        launch_options.path = Some(PathBuf::from(chrome_path));
    }

    Browser::new(launch_options).map_err(|e| FetchError::Browser(format!("Failed to launch browser: {}", e)))
}

fn load_page(tab: TabGuard, url: &str, user_agent: &str, timeout: Duration) -> Result<DetailEvidence, FetchError> {
    tab.set_default_timeout(timeout);
    tab.set_user_agent(user_agent, None, None)
        .map_err(|e| FetchError::Browser(format!("Failed to set user agent: {}", e)))?;

    tab.navigate_to(url)
        .map_err(|e| FetchError::Browser(format!("Navigation failed: {}", e)))?;
    tab.wait_until_navigated()
        .map_err(|e| FetchError::Browser(format!("Page load failed: {}", e)))?;

    let html = tab
        .get_content()
        .map_err(|e| FetchError::Browser(format!("Failed to get page content: {}", e)))?;

    let final_url = tab.get_url();
    Ok(DetailEvidence {
        body_text: body_text(&html),
        final_url: (!final_url.is_empty()).then_some(final_url),
    })
}

/// Visible text of the page body, whitespace collapsed. Script and style
/// contents are left out so phrase matching only sees what a shopper sees.
pub fn body_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = match Selector::parse("body") {
        Ok(selector) => document.select(&selector).next(),
        Err(_) => None,
    }
    .unwrap_or_else(|| document.root_element());

    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| SKIPPED_ELEMENTS.contains(&element.name()))
        });

        if !hidden {
            parts.push(text);
        }
    }

    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

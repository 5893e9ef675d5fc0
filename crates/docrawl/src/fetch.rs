use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetCacheDisabledParams;
use futures::StreamExt;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::CrawlError;

/// User-agent sent by every fetcher and by the robots.txt cache.
pub const USER_AGENT: &str = concat!("docrawl/", env!("CARGO_PKG_VERSION"));

/// A shared crawling session.
///
/// One session is opened per run and shared by every concurrent fetch unit,
/// so cookies and connection state persist across URLs. `start` and `close`
/// are each called exactly once by the dispatcher, never by individual units.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Opens the session. Called once before the first fetch.
    async fn start(&self) -> Result<(), CrawlError>;

    /// Fetches a single page and returns its rendered HTML.
    async fn fetch(&self, url: &Url) -> Result<String, CrawlError>;

    /// Releases the session. Called once after the last unit finishes.
    async fn close(&self) -> Result<(), CrawlError>;
}

/// Plain HTTP session backed by a pooled reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn start(&self) -> Result<(), CrawlError> {
        Ok(())
    }

    async fn fetch(&self, url: &Url) -> Result<String, CrawlError> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(CrawlError::Status {
                url: url.clone(),
                status: response.status(),
            });
        }
        Ok(response.text().await?)
    }

    async fn close(&self) -> Result<(), CrawlError> {
        Ok(())
    }
}

/// Headless-Chromium session.
///
/// All pages are opened in one browser instance, so cookies and storage are
/// shared across fetches within a run. The page cache is disabled so every
/// fetch hits the network.
pub struct BrowserFetcher {
    state: tokio::sync::Mutex<Option<BrowserState>>,
}

struct BrowserState {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserFetcher {
    pub fn new() -> Self {
        Self {
            state: tokio::sync::Mutex::new(None),
        }
    }
}

impl Default for BrowserFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn start(&self) -> Result<(), CrawlError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Err(CrawlError::Session(
                "browser session already started".to_string(),
            ));
        }

        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(CrawlError::Session)?;
        let (browser, mut handler) = Browser::launch(config).await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::info!("Headless browser session started");
        *state = Some(BrowserState {
            browser,
            handler_task,
        });
        Ok(())
    }

    async fn fetch(&self, url: &Url) -> Result<String, CrawlError> {
        // Opening the page is a single CDP round trip; navigation and
        // content extraction run without holding the lock so fetches
        // overlap.
        let page = {
            let state = self.state.lock().await;
            let state = state
                .as_ref()
                .ok_or_else(|| CrawlError::Session("browser session not started".to_string()))?;
            state.browser.new_page("about:blank").await?
        };

        page.execute(SetCacheDisabledParams::new(true)).await?;
        page.goto(url.as_str()).await?;
        let html = page.content().await?;
        let _ = page.close().await;
        Ok(html)
    }

    async fn close(&self) -> Result<(), CrawlError> {
        let mut state = self.state.lock().await;
        if let Some(BrowserState {
            mut browser,
            handler_task,
        }) = state.take()
        {
            browser.close().await?;
            let _ = browser.wait().await;
            handler_task.abort();
            tracing::info!("Headless browser session closed");
        }
        Ok(())
    }
}
